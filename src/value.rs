//! Declared store types and runtime values.
//!
//! A store fixes one [`Kind`] for keys and one for values at open time, and
//! every operation is checked structurally against that pair. The set is
//! closed on purpose: an invalid kind is unrepresentable, and the check is a
//! single match rather than a runtime duck-typing probe.

use crate::error::KvError;
use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of a store's key or value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Text,
    Bytes,
    Integer,
    Float,
    /// No constraint; any scalar is accepted.
    Any,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Text => "text",
            Kind::Bytes => "bytes",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::Any => "any",
        }
    }

    /// Whether a runtime value satisfies this declared kind.
    pub fn admits(self, value: &Value) -> bool {
        match (self, value) {
            (Kind::Any, _) => true,
            (Kind::Text, Value::Text(_)) => true,
            (Kind::Bytes, Value::Bytes(_)) => true,
            (Kind::Integer, Value::Integer(_)) => true,
            (Kind::Float, Value::Float(_)) => true,
            _ => false,
        }
    }

    /// Check a value against this kind, naming the role ("key" or "value")
    /// in the error so callers can tell which side of a put was wrong.
    pub fn check(self, role: &str, value: &Value) -> Result<(), KvError> {
        if self.admits(value) {
            return Ok(());
        }
        Err(KvError::TypeMismatch(format!(
            "{} must be {}, got {}",
            role,
            self.name(),
            value.kind_name()
        )))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Kind {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "str" => Ok(Kind::Text),
            "bytes" | "blob" => Ok(Kind::Bytes),
            "integer" | "int" => Ok(Kind::Integer),
            "float" | "real" => Ok(Kind::Float),
            "any" | "none" => Ok(Kind::Any),
            other => Err(KvError::Config(format!(
                "unknown kind '{other}' (expected text|bytes|integer|float|any)"
            ))),
        }
    }
}

/// A runtime scalar stored in or read from a store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Bytes(Vec<u8>),
    Integer(i64),
    Float(f64),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl TryFrom<Value> for String {
    type Error = KvError;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Text(s) => Ok(s),
            other => Err(KvError::TypeMismatch(format!(
                "expected text, got {}",
                other.kind_name()
            ))),
        }
    }
}

impl TryFrom<Value> for Vec<u8> {
    type Error = KvError;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Bytes(b) => Ok(b),
            other => Err(KvError::TypeMismatch(format!(
                "expected bytes, got {}",
                other.kind_name()
            ))),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = KvError;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Integer(i) => Ok(i),
            other => Err(KvError::TypeMismatch(format!(
                "expected integer, got {}",
                other.kind_name()
            ))),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = KvError;

    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Float(f) => Ok(f),
            other => Err(KvError::TypeMismatch(format!(
                "expected float, got {}",
                other.kind_name()
            ))),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(t) => std::str::from_utf8(t)
                .map(|s| Value::Text(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Blob(b) => Ok(Value::Bytes(b.to_vec())),
            ValueRef::Integer(i) => Ok(Value::Integer(i)),
            ValueRef::Real(r) => Ok(Value::Float(r)),
            ValueRef::Null => Err(FromSqlError::InvalidType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_admits_every_scalar() {
        for v in [
            Value::from("a"),
            Value::from(vec![1u8]),
            Value::from(1i64),
            Value::from(1.5f64),
        ] {
            assert!(Kind::Any.admits(&v), "{}", v.kind_name());
        }
    }

    #[test]
    fn concrete_kinds_reject_other_scalars() {
        assert!(Kind::Text.admits(&Value::from("a")));
        assert!(!Kind::Text.admits(&Value::from(1i64)));
        assert!(!Kind::Integer.admits(&Value::from(1.5f64)));
        assert!(!Kind::Bytes.admits(&Value::from("a")));
    }

    #[test]
    fn check_names_the_role() {
        let err = Kind::Integer.check("key", &Value::from("a")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("key must be integer"), "{msg}");
    }

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("int".parse::<Kind>().unwrap(), Kind::Integer);
        assert_eq!("blob".parse::<Kind>().unwrap(), Kind::Bytes);
        assert_eq!("none".parse::<Kind>().unwrap(), Kind::Any);
        assert!("map".parse::<Kind>().is_err());
    }
}
