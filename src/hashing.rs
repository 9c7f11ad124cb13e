//! Fingerprints - SHA-256 over canonical JSON
//!
//! A verification report records the fingerprint of the specification it
//! was scored against, so a stale report is detectable after edits.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::design::DesignSpecification;

/// Top-level specification fields that describe provenance, not the contract.
const PROVENANCE_FIELDS: &[&str] = &["source"];

/// Lowercase hex SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Compact JSON with object keys in lexicographic order at every depth.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&canonicalize(serde_json::to_value(value)?))
}

// Rebuilt through a BTreeMap so ordering holds whichever map type
// serde_json was compiled with.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, inner)| (key, canonicalize(inner)))
                .collect();
            Value::Object(ordered.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        scalar => scalar,
    }
}

/// Fingerprint of a specification. Provenance is excluded: the same
/// contract reached by extraction or by defaulting hashes the same.
pub fn spec_fingerprint(spec: &DesignSpecification) -> Result<String, serde_json::Error> {
    let mut contract = serde_json::to_value(spec)?;
    if let Value::Object(map) = &mut contract {
        for field in PROVENANCE_FIELDS {
            map.remove(*field);
        }
    }
    Ok(sha256_hex(canonical_json(&contract)?.as_bytes()))
}
