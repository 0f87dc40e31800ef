//! Canonical serialization for registry fingerprints.
//!
//! A fingerprint identifies the persisted content of a registry, so two
//! registries with the same fingerprint save to the same document.
//!
//! ## Determinism Guarantees
//!
//! - Codes hash in value order, the order they are saved in
//! - Struct fields serialize in declaration order
//! - Links hash in stored order, since that order is persisted too
//! - No HashMap anywhere in hashed data
//! - Unmodelled elements hash alongside the document, codeset first

use serde::Serialize;
use std::fmt;
use xxhash_rust::xxh64::xxh64;

use crate::codebase::Codebase;
use crate::store::CodesetDocument;
use crate::types::Registry;

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<u64, serde_json::Error> {
    Ok(xxh64(&to_canonical_bytes(value)?, 0))
}

/// xxh64 digest of persisted registry content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Fingerprint of one registry as it would be saved.
pub fn registry_fingerprint(registry: &Registry) -> Result<Fingerprint, serde_json::Error> {
    let document = CodesetDocument::from_registry(registry);
    let extensions: Vec<&[String]> = std::iter::once(document.extensions.as_slice())
        .chain(document.codes.iter().map(|code| code.extensions.as_slice()))
        .collect();
    canonical_hash(&(&document, extensions)).map(Fingerprint)
}

/// Fingerprint of every registry in processing order.
pub fn codebase_fingerprint(codebase: &Codebase) -> Result<Fingerprint, serde_json::Error> {
    let parts = codebase
        .registries()
        .map(|r| Ok((r.registry_type().tag(), registry_fingerprint(r)?.0)))
        .collect::<Result<Vec<_>, serde_json::Error>>()?;
    canonical_hash(&parts).map(Fingerprint)
}
