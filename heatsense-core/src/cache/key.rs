//! Content-addressed cache keys
//!
//! A key is the SHA-256 digest of a canonical string built from the artifact
//! kind and a parameter map. Parameters live in a `BTreeMap`, so the
//! canonical form is independent of insertion order. Every value carries a
//! type tag, which keeps `1`, `1.0`, `"1"` and `true` apart.

use crate::cache::types::ArtifactKind;
use crate::error::{CoreError, Result};
use crate::model::{BoundingBox, DateRange};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Hex-encoded SHA-256 digest identifying one cache entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Length of the hex digest
    pub const LEN: usize = 64;

    /// Derive the key for a kind and parameter set
    pub fn derive(kind: ArtifactKind, params: &CacheParams) -> Self {
        let canonical = params.canonical_string(kind);
        let digest = Sha256::digest(canonical.as_bytes());
        CacheKey(hex::encode(digest))
    }

    /// Parse a key from its hex form, as found in file names
    pub fn from_hex(s: &str) -> Result<Self> {
        let valid = s.len() == Self::LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(CacheKey(s.to_string()))
        } else {
            Err(CoreError::Other(format!("not a cache key: {}", s)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    List(Vec<ParamValue>),
}

impl ParamValue {
    fn write_canonical(&self, out: &mut String) {
        match self {
            ParamValue::Bool(b) => {
                out.push_str("b:");
                out.push_str(if *b { "true" } else { "false" });
            }
            ParamValue::Int(i) => {
                out.push_str("i:");
                out.push_str(&i.to_string());
            }
            ParamValue::Float(f) => {
                // -0.0 == 0.0 must hash the same
                let f = if *f == 0.0 { 0.0 } else { *f };
                out.push_str("f:");
                out.push_str(&format!("{:?}", f));
            }
            ParamValue::Text(s) => {
                out.push_str("s:");
                out.push_str(&json_string(s));
            }
            ParamValue::Date(d) => {
                out.push_str("d:");
                out.push_str(&d.format("%Y-%m-%d").to_string());
            }
            ParamValue::List(items) => {
                out.push_str("l:[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
        }
    }
}

fn json_string(s: &str) -> String {
    // Escaping keeps separators inside names and values unambiguous
    serde_json::to_string(s).unwrap_or_else(|_| format!("{:?}", s))
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<u16> for ParamValue {
    fn from(v: u16) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(v: NaiveDate) -> Self {
        ParamValue::Date(v)
    }
}

impl From<BoundingBox> for ParamValue {
    fn from(b: BoundingBox) -> Self {
        ParamValue::List(b.to_array().iter().map(|v| ParamValue::Float(*v)).collect())
    }
}

impl From<DateRange> for ParamValue {
    fn from(r: DateRange) -> Self {
        ParamValue::List(vec![ParamValue::Date(r.start), ParamValue::Date(r.end)])
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Order-independent parameter mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheParams(BTreeMap<String, ParamValue>);

impl CacheParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `kind=<kind>;"name"=<tagged value>;...` with names in sorted order
    pub fn canonical_string(&self, kind: ArtifactKind) -> String {
        let mut out = String::with_capacity(32 + self.0.len() * 24);
        out.push_str("kind=");
        out.push_str(kind.dir_name());
        out.push(';');
        for (name, value) in &self.0 {
            out.push_str(&json_string(name));
            out.push('=');
            value.write_canonical(&mut out);
            out.push(';');
        }
        out
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for CacheParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = CacheParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_fixed_length_hex() {
        let key = CacheKey::derive(ArtifactKind::Grid, &CacheParams::new().with("resolution", 100.0));
        assert_eq!(key.as_str().len(), CacheKey::LEN);
        assert_eq!(key.short().len(), 12);
        assert_eq!(CacheKey::from_hex(key.as_str()).unwrap(), key);
        assert!(CacheKey::from_hex("not-a-key").is_err());
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a = CacheParams::new()
            .with("resolution", 100.0)
            .with("bbox", BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .with("cloud_threshold", 20);
        let b = CacheParams::new()
            .with("cloud_threshold", 20)
            .with("bbox", BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .with("resolution", 100.0);
        assert_eq!(
            CacheKey::derive(ArtifactKind::Grid, &a),
            CacheKey::derive(ArtifactKind::Grid, &b)
        );
    }

    #[test]
    fn test_kind_discriminates() {
        let params = CacheParams::new().with("resolution", 100.0);
        assert_ne!(
            CacheKey::derive(ArtifactKind::Grid, &params),
            CacheKey::derive(ArtifactKind::Temperature, &params)
        );
    }

    #[test]
    fn test_value_types_discriminate() {
        let keys: Vec<_> = [
            ParamValue::Int(1),
            ParamValue::Float(1.0),
            ParamValue::Text("1".to_string()),
            ParamValue::Bool(true),
        ]
        .into_iter()
        .map(|v| CacheKey::derive(ArtifactKind::Grid, &CacheParams::new().with("x", v)))
        .collect();
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                assert_ne!(keys[i], keys[j]);
            }
        }
    }

    #[test]
    fn test_negative_zero_matches_zero() {
        let a = CacheParams::new().with("x", 0.0);
        let b = CacheParams::new().with("x", -0.0);
        assert_eq!(a.canonical_string(ArtifactKind::Grid), b.canonical_string(ArtifactKind::Grid));
    }

    #[test]
    fn test_separator_in_text_is_escaped() {
        let a = CacheParams::new().with("a", "x;\"b\"=s:y");
        let b = CacheParams::new().with("a", "x").with("b", "y");
        assert_ne!(
            CacheKey::derive(ArtifactKind::Boundary, &a),
            CacheKey::derive(ArtifactKind::Boundary, &b)
        );
    }

    #[test]
    fn test_from_iterator() {
        let params: CacheParams = vec![("year", 2018), ("month", 6)].into_iter().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("year"), Some(&ParamValue::Int(2018)));
    }
}
