//! The `KeyValueStore` trait — the storage adapter the session persists
//! through.
//!
//! The trait is implemented by storage backends (e.g. `acad-store-sqlite`).
//! Values are opaque strings; the registry is stored as its JSON form under
//! [`SUBJECTS_KEY`].

use std::future::Future;

use crate::{Result, registry::Registry};

/// Logical key of the subject registry snapshot.
pub const SUBJECTS_KEY: &str = "academic-subjects";

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a string key-value backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait KeyValueStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The value stored under `key`, or `None` if nothing was ever written.
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  /// Store `value` under `key`, replacing any previous value.
  fn set<'a>(
    &'a self,
    key: &'a str,
    value: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Snapshot codec ──────────────────────────────────────────────────────────

/// Serialise a registry as the JSON array of its records.
pub fn encode_registry(registry: &Registry) -> Result<String> {
  Ok(serde_json::to_string(registry)?)
}

/// Parse a stored snapshot. Any shape error fails the whole snapshot.
pub fn decode_registry(raw: &str) -> Result<Registry> {
  Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seed;

  #[test]
  fn seed_snapshot_survives_codec() {
    let registry = seed::initial_registry();
    let raw = encode_registry(&registry).unwrap();
    assert_eq!(decode_registry(&raw).unwrap(), registry);
  }

  #[test]
  fn malformed_snapshot_is_an_error() {
    assert!(decode_registry("not json").is_err());
    assert!(decode_registry(r#"[{"id":"1"}]"#).is_err());
    assert!(decode_registry(r#"{"id":"1"}"#).is_err());
  }

  #[test]
  fn empty_snapshot_is_valid() {
    assert!(decode_registry("[]").unwrap().is_empty());
  }
}
