//! Store directory conventions and discovery.
//!
//! A bare store name (no path separator) always resolves into one
//! process-wide `stores` directory under the user's profile, so two pieces
//! of code naming the same store open the same file no matter which
//! directory they run from. A name containing a separator opts out and is
//! used as a literal path.
//!
//! The base directory is an explicit parameter everywhere; `None` selects
//! the profile-derived default. There is no hidden global.

use crate::db;
use crate::error::KvError;
use directories::ProjectDirs;
use rusqlite::OptionalExtension;
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::time::Duration;

/// Lock-wait bound for discovery opens. Short on purpose: enumeration
/// should report contention quickly rather than stall a listing.
const DISCOVERY_BUSY_TIMEOUT: Duration = Duration::from_secs(1);

/// Profile-derived default base directory (e.g. `~/.local/share/lexkv`
/// on Linux). Stores live in its `stores` subdirectory.
pub fn default_base_dir() -> Result<PathBuf, KvError> {
    let dirs = ProjectDirs::from("", "", "lexkv").ok_or_else(|| {
        KvError::Config("cannot determine a profile directory for the stores base".to_string())
    })?;
    Ok(dirs.data_dir().to_path_buf())
}

/// Map a store name to the file it denotes.
///
/// Bare names go to `<base>/stores/<name>`; names containing a path
/// separator are used as-is.
pub fn resolve_store_path(name: &str, base: Option<&Path>) -> Result<PathBuf, KvError> {
    if name.is_empty() {
        return Err(KvError::Config("store name is empty".to_string()));
    }
    if name.contains(MAIN_SEPARATOR) || name.contains('/') {
        return Ok(PathBuf::from(name));
    }
    let base = match base {
        Some(b) => b.to_path_buf(),
        None => default_base_dir()?,
    };
    Ok(base.join("stores").join(name))
}

/// What discovery knows about one store file.
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Present only when counting was requested (requires opening the file).
    pub item_count: Option<u64>,
    /// The store's `description` meta entry, when the file was opened.
    pub description: Option<String>,
}

/// Enumerate store files in the conventional directory.
///
/// Filters on the engine's header signature without opening anything.
/// `check_schema` additionally verifies the `kv` table; `count_items`
/// computes Record counts and reads descriptions. Both are opt-in because
/// they open (and may briefly lock) each file.
pub fn list_stores(
    base: Option<&Path>,
    check_schema: bool,
    count_items: bool,
) -> Result<Vec<StoreInfo>, KvError> {
    let base = match base {
        Some(b) => b.to_path_buf(),
        None => default_base_dir()?,
    };
    let dir = base.join("stores");
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut infos = Vec::new();
    let mut entries: Vec<PathBuf> = fs::read_dir(&dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if !path.is_file() || is_engine_sidecar(&path) {
            continue;
        }
        if !is_store_file(&path, check_schema)? {
            continue;
        }
        let size_bytes = fs::metadata(&path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (item_count, description) = if count_items {
            let conn = db::connect(&path, true, DISCOVERY_BUSY_TIMEOUT)?;
            let item_count = if db::has_kv_table(&conn)? {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
                Some(n as u64)
            } else {
                None
            };
            let description = if db::table_exists(&conn, "meta")? {
                conn.query_row(
                    "SELECT value FROM meta WHERE key = 'description'",
                    [],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
            } else {
                None
            };
            (item_count, description)
        } else {
            (None, None)
        };

        infos.push(StoreInfo {
            name,
            path,
            size_bytes,
            item_count,
            description,
        });
    }
    Ok(infos)
}

/// WAL and shared-memory files the engine parks next to a store.
fn is_engine_sidecar(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with("-wal") || n.ends_with("-shm"))
}

/// Whether `path` is a store file, per the default engine signature.
///
/// The header check reads 16 bytes and takes no lock. The schema check
/// opens the file read-only and can contend with a concurrent writer.
pub fn is_store_file(path: &Path, check_schema: bool) -> Result<bool, KvError> {
    is_store_file_with(path, check_schema, db::sqlite_signature)
}

/// Signature-pluggable variant of [`is_store_file`], for callers swapping
/// the backing engine.
pub fn is_store_file_with(
    path: &Path,
    check_schema: bool,
    signature: impl Fn(&[u8]) -> bool,
) -> Result<bool, KvError> {
    let mut header = [0u8; 16];
    let mut file = fs::File::open(path)?;
    let read = file.read(&mut header)?;
    if !signature(&header[..read]) {
        return Ok(false);
    }
    if !check_schema {
        return Ok(true);
    }
    let conn = db::connect(path, true, DISCOVERY_BUSY_TIMEOUT)?;
    db::has_kv_table(&conn)
}
