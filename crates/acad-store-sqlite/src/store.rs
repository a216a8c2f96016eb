//! [`SqliteStore`] — the SQLite implementation of [`KeyValueStore`].

use std::path::Path;

use acad_core::store::KeyValueStore;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use crate::{Error, Result, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A key-value store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Delete `key`. Returns whether a value was present.
  pub async fn remove(&self, key: &str) -> Result<bool> {
    let key = key.to_owned();

    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])?)
      })
      .await?;

    Ok(removed > 0)
  }

  /// When `key` was last written, or `None` if it has no value.
  pub async fn updated_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
    let key = key.to_owned();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT updated_at FROM kv WHERE key = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|s| {
        DateTime::parse_from_rfc3339(&s)
          .map(|dt| dt.with_timezone(&Utc))
          .map_err(|e| Error::DateParse(e.to_string()))
      })
      .transpose()
  }
}

// ─── KeyValueStore impl ──────────────────────────────────────────────────────

impl KeyValueStore for SqliteStore {
  type Error = Error;

  async fn get(&self, key: &str) -> Result<Option<String>> {
    let key = key.to_owned();

    let value = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM kv WHERE key = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(value)
  }

  async fn set(&self, key: &str, value: String) -> Result<()> {
    let key_str = key.to_owned();
    let at_str  = Utc::now().to_rfc3339();
    let bytes   = value.len();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(key) DO UPDATE SET
             value      = excluded.value,
             updated_at = excluded.updated_at",
          rusqlite::params![key_str, value, at_str],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(key, bytes, "snapshot written");
    Ok(())
  }
}
