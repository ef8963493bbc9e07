//! Schema-free experiment parameters and metrics.
//!
//! Values are a small tagged union kept typed in memory and stored as a
//! JSON object, so new keys never need a catalog migration.

use crate::core::error::DatatraceError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Key -> scalar mapping used for params and metrics. Keeps insertion order.
pub type ScalarMap = IndexMap<String, Scalar>;

impl Scalar {
    /// Parses a command-line value: bool, integer, float, else text.
    pub fn parse(raw: &str) -> Scalar {
        let raw = raw.trim();
        if let Ok(b) = raw.parse::<bool>() {
            return Scalar::Bool(b);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Scalar::Int(i);
        }
        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Scalar::Float(f),
            _ => Scalar::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

/// Builds a map from `key=value` pairs (also accepts `key:value`).
pub fn parse_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<ScalarMap, DatatraceError> {
    let mut map = ScalarMap::new();
    for pair in pairs {
        let pair = pair.as_ref();
        let (k, v) = pair
            .split_once('=')
            .or_else(|| pair.split_once(':'))
            .ok_or_else(|| {
                DatatraceError::InvalidArgument(format!("expected key=value, got '{}'", pair))
            })?;
        let k = k.trim();
        if k.is_empty() {
            return Err(DatatraceError::InvalidArgument(format!(
                "empty key in '{}'",
                pair
            )));
        }
        map.insert(k.to_string(), Scalar::parse(v));
    }
    Ok(map)
}

pub fn to_json(map: &ScalarMap) -> Result<String, DatatraceError> {
    for (k, v) in map {
        if let Scalar::Float(f) = v {
            if !f.is_finite() {
                return Err(DatatraceError::InvalidArgument(format!(
                    "value for '{}' is not a finite number",
                    k
                )));
            }
        }
    }
    Ok(serde_json::to_string(map)?)
}

pub fn from_json(raw: &str) -> Result<ScalarMap, DatatraceError> {
    if raw.trim().is_empty() {
        return Ok(ScalarMap::new());
    }
    Ok(serde_json::from_str(raw)?)
}
