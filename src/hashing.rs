//! Hashing System - SHA-256 fingerprints of drawing output
//!
//! Identical template and card input yields an identical fingerprint, which
//! makes instruction lists cacheable and comparable across render passes.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

use crate::primitives::Primitive;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v = serde_json::to_value(value)?;
    to_string(&sort_value(v))
}

fn sort_value(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_value(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

/// Fingerprint of an ordered instruction list. Order matters.
pub fn fingerprint(instructions: &[Primitive]) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(&instructions)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{LineStroke, Primitive};
    use serde_json::json;

    fn line(y: f64) -> Primitive {
        Primitive::Line(LineStroke {
            start_x: 0.0,
            start_y: y,
            end_x: 10.0,
            end_y: y,
            width: 1.0,
            color: None,
        })
    }

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": {"y": 1, "b": [ {"d": 1, "c": 2} ]}});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":{"b":[{"c":2,"d":1}],"y":1},"z":1}"#);
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_stable_and_order_sensitive() {
        let a = fingerprint(&[line(1.0), line(2.0)]).unwrap();
        let b = fingerprint(&[line(1.0), line(2.0)]).unwrap();
        let reversed = fingerprint(&[line(2.0), line(1.0)]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, reversed);
    }
}
