//! Structured-value layer over a (text, bytes) store.
//!
//! Values are arbitrary JSON trees (`serde_json::Value`), encoded to bytes
//! on write and decoded on read. A Record that exists but fails to decode
//! surfaces as [`KvError::Decode`], never as a missing key.

use crate::error::KvError;
use crate::store::{LocalKv, OpenOptions};
use crate::value::{Kind, Value};
use serde_json::Value as Json;

/// A store holding structured values under text keys.
pub struct JsonKv {
    inner: LocalKv,
}

impl JsonKv {
    pub fn open(name: &str) -> Result<Self, KvError> {
        Ok(Self {
            inner: LocalKv::open(name, Kind::Text, Kind::Bytes)?,
        })
    }

    pub fn open_with(name: &str, opts: &OpenOptions) -> Result<Self, KvError> {
        Ok(Self {
            inner: LocalKv::open_with(name, Kind::Text, Kind::Bytes, opts)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, KvError> {
        Ok(Self {
            inner: LocalKv::open_in_memory(Kind::Text, Kind::Bytes)?,
        })
    }

    pub fn get(&self, key: &str) -> Result<Json, KvError> {
        let raw = self.inner.get(key)?;
        decode(key, &raw)
    }

    pub fn get_opt(&self, key: &str) -> Result<Option<Json>, KvError> {
        match self.inner.get_opt(key)? {
            Some(raw) => Ok(Some(decode(key, &raw)?)),
            None => Ok(None),
        }
    }

    pub fn put(&mut self, key: &str, value: &Json, commit: bool) -> Result<(), KvError> {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| KvError::Decode(format!("cannot encode value for '{key}': {e}")))?;
        self.inner.put(key, bytes, commit)
    }

    pub fn delete(&mut self, key: &str, commit: bool) -> Result<(), KvError> {
        self.inner.delete(key, commit)
    }

    pub fn commit(&mut self) -> Result<(), KvError> {
        self.inner.commit()
    }

    pub fn rollback(&mut self) -> Result<(), KvError> {
        self.inner.rollback()
    }

    pub fn contains(&self, key: &str) -> Result<bool, KvError> {
        self.inner.contains(key)
    }

    pub fn len(&self) -> Result<u64, KvError> {
        self.inner.len()
    }

    pub fn is_empty(&self) -> Result<bool, KvError> {
        self.inner.is_empty()
    }

    /// Iterate all Records as (key, decoded value) pairs.
    pub fn items(&self) -> impl Iterator<Item = Result<(String, Json), KvError>> + '_ {
        self.inner.items().map(|item| {
            let (k, v) = item?;
            let key = match k {
                Value::Text(s) => s,
                other => {
                    return Err(KvError::Decode(format!(
                        "non-text key in structured store: {}",
                        other.kind_name()
                    )));
                }
            };
            let json = decode(&key, &v)?;
            Ok((key, json))
        })
    }

    /// Access the underlying typed store (meta, vacuum, introspection).
    pub fn inner(&self) -> &LocalKv {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut LocalKv {
        &mut self.inner
    }

    pub fn into_inner(self) -> LocalKv {
        self.inner
    }

    pub fn close(self) -> Result<(), KvError> {
        self.inner.close()
    }
}

fn decode(key: &str, raw: &Value) -> Result<Json, KvError> {
    let bytes = raw.as_bytes().ok_or_else(|| {
        KvError::Decode(format!(
            "record '{key}' holds {}, expected bytes",
            raw.kind_name()
        ))
    })?;
    serde_json::from_slice(bytes)
        .map_err(|e| KvError::Decode(format!("cannot decode record '{key}': {e}")))
}
