//! SQL schema for the key-value store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per logical collection (e.g. 'academic-subjects').
-- `value` is the collection's serialised snapshot, replaced wholesale.
CREATE TABLE IF NOT EXISTS kv (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL   -- RFC 3339 UTC; set on every write
);

PRAGMA user_version = 1;
";
