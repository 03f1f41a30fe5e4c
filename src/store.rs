//! Typed key-value store over a single SQLite file.
//!
//! A [`LocalKv`] fixes a key kind and a value kind at open time and checks
//! every operation against that pair. Writes default to immediate durable
//! commits; callers doing bulk loads opt into batching with `commit=false`
//! and must end the batch with [`LocalKv::commit`] themselves. An open batch
//! holds the writer lock, so batches should be short-lived.
//!
//! Multiple handles (including handles in other processes) may open the same
//! path. SQLite arbitrates: many readers, one writer, and a blocked open or
//! write fails with [`KvError::LockTimeout`] once the bounded busy timeout
//! runs out rather than hanging.

use crate::db;
use crate::discover;
use crate::error::KvError;
use crate::value::{Kind, Value};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on how long a blocked open or statement waits for the
/// writer lock before failing with `LockTimeout`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Rows fetched per page during iteration.
const ITER_PAGE: usize = 1024;

/// Options for [`LocalKv::open_with`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Reject writes in the wrapper and open the engine read-only.
    pub read_only: bool,
    /// Lock-wait bound for open and statements.
    pub busy_timeout: Duration,
    /// Base directory for bare-name resolution; `None` uses the
    /// profile-derived default (see [`discover::default_base_dir`]).
    pub base_dir: Option<PathBuf>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            base_dir: None,
        }
    }
}

/// A typed key-value store backed by one SQLite file (or memory).
#[derive(Debug)]
pub struct LocalKv {
    conn: Connection,
    path: Option<PathBuf>,
    key_kind: Kind,
    value_kind: Kind,
    read_only: bool,
    in_tx: bool,
}

impl LocalKv {
    /// Open (creating if absent) the store named `name`.
    ///
    /// A bare name resolves into the conventional stores directory; a name
    /// containing a path separator is used as a literal path. The sentinel
    /// `":memory:"` opens a volatile store.
    pub fn open(name: &str, key_kind: Kind, value_kind: Kind) -> Result<Self, KvError> {
        Self::open_with(name, key_kind, value_kind, &OpenOptions::default())
    }

    pub fn open_with(
        name: &str,
        key_kind: Kind,
        value_kind: Kind,
        opts: &OpenOptions,
    ) -> Result<Self, KvError> {
        if name == ":memory:" {
            if opts.read_only {
                return Err(KvError::Config(
                    "an in-memory store cannot be opened read-only".to_string(),
                ));
            }
            return Self::open_in_memory(key_kind, value_kind);
        }

        let path = discover::resolve_store_path(name, opts.base_dir.as_deref())?;
        if !opts.read_only {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = db::connect(&path, opts.read_only, opts.busy_timeout)?;
        if opts.read_only {
            if !db::has_kv_table(&conn)? {
                return Err(KvError::Config(format!(
                    "'{}' is not a store (no kv table)",
                    path.display()
                )));
            }
        } else {
            db::ensure_schema(&conn)?;
        }

        Ok(Self {
            conn,
            path: Some(path),
            key_kind,
            value_kind,
            read_only: opts.read_only,
            in_tx: false,
        })
    }

    /// Open a volatile store that is never persisted.
    pub fn open_in_memory(key_kind: Kind, value_kind: Kind) -> Result<Self, KvError> {
        let conn = db::connect_in_memory()?;
        db::ensure_schema(&conn)?;
        Ok(Self {
            conn,
            path: None,
            key_kind,
            value_kind,
            read_only: false,
            in_tx: false,
        })
    }

    /// Backing file path; `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn key_kind(&self) -> Kind {
        self.key_kind
    }

    pub fn value_kind(&self) -> Kind {
        self.value_kind
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Whether a batched transaction is currently open on this handle.
    pub fn batch_open(&self) -> bool {
        self.in_tx
    }

    fn write_guard(&self) -> Result<(), KvError> {
        if self.read_only {
            return Err(KvError::Config(
                "store was opened read-only; writes are not allowed".to_string(),
            ));
        }
        Ok(())
    }

    fn begin_if_needed(&mut self) -> Result<(), KvError> {
        if !self.in_tx {
            self.conn.execute_batch("BEGIN")?;
            self.in_tx = true;
        }
        Ok(())
    }

    /// Look up a key. Absent keys are [`KvError::KeyNotFound`]; use
    /// [`LocalKv::get_opt`] to get `None` instead.
    pub fn get(&self, key: impl Into<Value>) -> Result<Value, KvError> {
        let key = key.into();
        match self.get_opt_value(&key)? {
            Some(v) => Ok(v),
            None => Err(KvError::KeyNotFound(display_key(&key))),
        }
    }

    /// Look up a key, treating absence as an empty result.
    pub fn get_opt(&self, key: impl Into<Value>) -> Result<Option<Value>, KvError> {
        let key = key.into();
        self.get_opt_value(&key)
    }

    fn get_opt_value(&self, key: &Value) -> Result<Option<Value>, KvError> {
        self.key_kind.check("key", key)?;
        let row = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, Value>(0)
            })
            .optional()?;
        Ok(row)
    }

    /// Insert or overwrite one Record.
    ///
    /// With `commit=true` (the usual case) the write is durable on return,
    /// including any writes batched earlier on this handle. With
    /// `commit=false` the write joins an open batch, starting one if needed.
    pub fn put(
        &mut self,
        key: impl Into<Value>,
        value: impl Into<Value>,
        commit: bool,
    ) -> Result<(), KvError> {
        let key = key.into();
        let value = value.into();
        self.write_guard()?;
        self.key_kind.check("key", &key)?;
        self.value_kind.check("value", &value)?;
        if !commit {
            self.begin_if_needed()?;
        }
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        if commit {
            self.commit()?;
        }
        Ok(())
    }

    /// Delete a Record if present. Same batching semantics as `put`.
    pub fn delete(&mut self, key: impl Into<Value>, commit: bool) -> Result<(), KvError> {
        let key = key.into();
        self.write_guard()?;
        self.key_kind.check("key", &key)?;
        if !commit {
            self.begin_if_needed()?;
        }
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        if commit {
            self.commit()?;
        }
        Ok(())
    }

    /// Durably commit the open batch. A no-op when no batch is open.
    pub fn commit(&mut self) -> Result<(), KvError> {
        if self.in_tx {
            self.conn.execute_batch("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }

    /// Discard the open batch. A no-op when no batch is open.
    pub fn rollback(&mut self) -> Result<(), KvError> {
        if self.in_tx {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_tx = false;
        }
        Ok(())
    }

    pub fn contains(&self, key: impl Into<Value>) -> Result<bool, KvError> {
        let key = key.into();
        self.key_kind.check("key", &key)?;
        let hit = self
            .conn
            .query_row("SELECT 1 FROM kv WHERE key = ?1", params![key], |_| Ok(()))
            .optional()?;
        Ok(hit.is_some())
    }

    pub fn len(&self) -> Result<u64, KvError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn is_empty(&self) -> Result<bool, KvError> {
        Ok(self.len()? == 0)
    }

    /// Iterate all Records in engine storage order. Each call starts a
    /// fresh, lazily paged pass; order carries no meaning beyond "the
    /// engine's".
    pub fn items(&self) -> Items<'_> {
        Items {
            store: self,
            last_rowid: 0,
            buf: VecDeque::new(),
            done: false,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = Result<Value, KvError>> + '_ {
        self.items().map(|r| r.map(|(k, _)| k))
    }

    pub fn values(&self) -> impl Iterator<Item = Result<Value, KvError>> + '_ {
        self.items().map(|r| r.map(|(_, v)| v))
    }

    /// Rewrite the backing file, reclaiming space from deleted Records.
    /// Any open batch is committed first (VACUUM cannot run inside one).
    pub fn vacuum(&mut self) -> Result<(), KvError> {
        self.write_guard()?;
        self.commit()?;
        self.conn.execute_batch("VACUUM")?;
        Ok(())
    }

    /// Delete every Record. Any open batch is rolled back first, so
    /// truncation never mixes with half-finished batched writes.
    pub fn truncate(&mut self, vacuum: bool) -> Result<(), KvError> {
        self.write_guard()?;
        self.rollback()?;
        self.conn.execute("DELETE FROM kv", [])?;
        if vacuum {
            self.vacuum()?;
        }
        Ok(())
    }

    /// Approximate bytes reclaimable by [`LocalKv::vacuum`].
    pub fn estimate_waste(&self) -> Result<u64, KvError> {
        let freelist: i64 = self
            .conn
            .query_row("PRAGMA freelist_count", [], |row| row.get(0))?;
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((freelist * page_size) as u64)
    }

    /// Approximate total size of the store in bytes.
    pub fn size_bytes(&self) -> Result<u64, KvError> {
        let pages: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok((pages * page_size) as u64)
    }

    // --- meta sidecar -----------------------------------------------------

    /// Read a meta entry. Meta is text-to-text regardless of the store's
    /// declared kinds.
    pub fn get_meta(&self, key: &str) -> Result<String, KvError> {
        match self.get_meta_opt(key)? {
            Some(v) => Ok(v),
            None => Err(KvError::KeyNotFound(format!("meta:{key}"))),
        }
    }

    pub fn get_meta_opt(&self, key: &str) -> Result<Option<String>, KvError> {
        let row = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(row)
    }

    /// Set a meta entry. Joins an open batch if one exists, otherwise
    /// commits immediately.
    pub fn put_meta(&mut self, key: &str, value: &str) -> Result<(), KvError> {
        self.write_guard()?;
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_meta(&mut self, key: &str) -> Result<(), KvError> {
        self.write_guard()?;
        self.conn
            .execute("DELETE FROM meta WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Release the handle. An open batch is rolled back, never silently
    /// committed; callers wanting the batch must `commit()` first. Dropping
    /// the handle without `close` has the same effect, since the engine
    /// discards an uncommitted transaction on disconnect.
    pub fn close(mut self) -> Result<(), KvError> {
        self.rollback()?;
        let LocalKv { conn, .. } = self;
        conn.close().map_err(|(_conn, e)| KvError::from(e))
    }
}

/// Lazily paged iterator over a store's Records.
///
/// Pages by rowid so the read statement is short-lived and the pass can
/// coexist with writers on other handles. Records inserted or deleted
/// mid-pass may or may not be observed.
pub struct Items<'a> {
    store: &'a LocalKv,
    last_rowid: i64,
    buf: VecDeque<(i64, Value, Value)>,
    done: bool,
}

impl Items<'_> {
    fn fill(&mut self) -> Result<(), KvError> {
        let store = self.store;
        let mut stmt = store.conn.prepare(
            "SELECT rowid, key, value FROM kv WHERE rowid > ?1 ORDER BY rowid LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![self.last_rowid, ITER_PAGE as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Value>(1)?,
                row.get::<_, Value>(2)?,
            ))
        })?;
        for row in rows {
            self.buf.push_back(row?);
        }
        if self.buf.len() < ITER_PAGE {
            self.done = true;
        }
        if let Some((rowid, _, _)) = self.buf.back() {
            self.last_rowid = *rowid;
        }
        Ok(())
    }
}

impl Iterator for Items<'_> {
    type Item = Result<(Value, Value), KvError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            if self.done {
                return None;
            }
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buf
            .pop_front()
            .map(|(_, k, v)| Ok((k, v)))
    }
}

fn display_key(key: &Value) -> String {
    match key {
        Value::Text(s) => s.clone(),
        Value::Bytes(b) => format!("<{} bytes>", b.len()),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_pages_through_more_than_one_page() {
        let mut kv = LocalKv::open_in_memory(Kind::Integer, Kind::Integer).expect("open");
        for i in 0..(ITER_PAGE as i64 + 10) {
            kv.put(i, i * 2, false).expect("put");
        }
        kv.commit().expect("commit");

        let mut seen = 0u64;
        for item in kv.items() {
            let (k, v) = item.expect("item");
            let k = k.as_integer().expect("int key");
            assert_eq!(v.as_integer(), Some(k * 2));
            seen += 1;
        }
        assert_eq!(seen, ITER_PAGE as u64 + 10);
    }

    #[test]
    fn batch_open_reflects_transaction_state() {
        let mut kv = LocalKv::open_in_memory(Kind::Text, Kind::Text).expect("open");
        assert!(!kv.batch_open());
        kv.put("a", "1", false).expect("put");
        assert!(kv.batch_open());
        kv.commit().expect("commit");
        assert!(!kv.batch_open());
    }

    #[test]
    fn meta_is_independent_of_record_kinds() {
        let mut kv = LocalKv::open_in_memory(Kind::Integer, Kind::Float).expect("open");
        kv.put_meta("description", "test store").expect("put meta");
        assert_eq!(kv.get_meta("description").expect("get meta"), "test store");
        assert_eq!(kv.len().expect("len"), 0, "meta must not create Records");
        kv.delete_meta("description").expect("delete meta");
        assert!(kv.get_meta_opt("description").expect("opt").is_none());
        assert!(matches!(
            kv.get_meta("description"),
            Err(KvError::KeyNotFound(_))
        ));
    }
}
