//! SQLite connection plumbing shared by the store and discovery layers.
//!
//! One store is one SQLite file holding two tables:
//! - `kv`: the Record table. Columns carry no affinity so the typed layer
//!   above decides what goes in them.
//! - `meta`: text-to-text sidecar for store-level annotations.

use crate::error::KvError;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

/// First 16 bytes of every SQLite database file.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

pub(crate) const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS kv (
        key   NOT NULL UNIQUE,
        value
    );
    CREATE TABLE IF NOT EXISTS meta (
        key   TEXT NOT NULL UNIQUE,
        value TEXT
    );
";

/// Default header predicate for "is this file a store".
pub fn sqlite_signature(header: &[u8]) -> bool {
    header.len() >= SQLITE_HEADER.len() && &header[..SQLITE_HEADER.len()] == SQLITE_HEADER
}

/// Open a connection to a store file, applying the standard pragmas.
///
/// Read-write connections use WAL so readers are not blocked by a writer.
/// Read-only connections additionally set `query_only` so a stray write is
/// rejected by the engine even if the wrapper check is bypassed.
pub(crate) fn connect(
    path: &Path,
    read_only: bool,
    busy_timeout: Duration,
) -> Result<Connection, KvError> {
    let conn = if read_only {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            KvError::Config(format!(
                "cannot open '{}' read-only: {}",
                path.display(),
                e
            ))
        })?
    } else {
        Connection::open(path)?
    };

    conn.busy_timeout(busy_timeout)?;
    if read_only {
        conn.execute_batch("PRAGMA query_only=ON;")?;
    } else {
        conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
    }
    Ok(conn)
}

pub(crate) fn connect_in_memory() -> Result<Connection, KvError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

pub(crate) fn ensure_schema(conn: &Connection) -> Result<(), KvError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool, KvError> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

/// Whether the connected database carries a `kv` table with at least a
/// `key` and a `value` column. Used by discovery's opt-in schema check and
/// by read-only opens, which must not create the schema themselves.
pub(crate) fn has_kv_table(conn: &Connection) -> Result<bool, KvError> {
    let mut stmt = conn.prepare("PRAGMA table_info(kv)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(columns.iter().any(|c| c == "key") && columns.iter().any(|c| c == "value"))
}
