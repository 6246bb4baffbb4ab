//! # Collection Store
//!
//! Durable catch records in the `caught` table. The table's primary key is
//! the only uniqueness guarantee: a catch is a conditional insert
//! (`ON CONFLICT DO NOTHING`) and zero affected rows is the conflict signal.
//! The existing record is read back in the same transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::db::DexDb;
use crate::error::{DexError, DexResult};
use crate::search::FuzzyResolver;

/// A caught entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchRecord {
    /// Canonical name
    pub name: String,
    pub caught_at: DateTime<Utc>,
}

/// Result of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    /// Canonical name the fragment resolved to
    pub name: String,
    /// Whether a record existed and was deleted
    pub removed: bool,
}

/// SQLite-backed collection store
#[derive(Clone)]
pub struct CollectionStore {
    conn: Arc<Mutex<Connection>>,
    resolver: Arc<FuzzyResolver>,
}

impl CollectionStore {
    /// Create from the shared DexDb connection
    pub fn new(db: &DexDb, resolver: Arc<FuzzyResolver>) -> Self {
        Self {
            conn: db.connection(),
            resolver,
        }
    }

    /// Resolve a fragment and record it as caught now
    pub async fn catch(&self, fragment: &str) -> DexResult<CatchRecord> {
        let name = self.resolve(fragment)?;
        self.catch_exact(name, Utc::now()).await
    }

    /// Record a canonical name as caught at the given time
    async fn catch_exact(&self, name: String, at: DateTime<Utc>) -> DexResult<CatchRecord> {
        let millis = at.timestamp_millis();
        let record = CatchRecord {
            name,
            caught_at: from_millis(millis)?,
        };

        let candidate = record.clone();
        let existing = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let inserted = tx.execute(
                    "INSERT INTO caught (name, caught_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
                    params![candidate.name, millis],
                )?;

                let existing = if inserted == 0 {
                    Some(tx.query_row(
                        "SELECT name, caught_at FROM caught WHERE name = ?1",
                        params![candidate.name],
                        row_to_record,
                    )?)
                } else {
                    None
                };

                tx.commit()?;
                Ok(existing)
            })
            .await?;

        match existing {
            Some(existing) => {
                tracing::debug!(name = %existing.name, "Catch rejected: already caught");
                Err(DexError::AlreadyCaught(existing))
            }
            None => {
                tracing::info!(name = %record.name, "Caught");
                Ok(record)
            }
        }
    }

    /// Resolve a fragment and delete its record; absence is a no-op
    pub async fn release(&self, fragment: &str) -> DexResult<ReleaseOutcome> {
        let name = self.resolve(fragment)?;

        let key = name.clone();
        let affected = self
            .with_conn(move |conn| conn.execute("DELETE FROM caught WHERE name = ?1", params![key]))
            .await?;

        tracing::info!(name = %name, removed = affected > 0, "Released");
        Ok(ReleaseOutcome {
            name,
            removed: affected > 0,
        })
    }

    /// Point lookup by canonical name (no fuzzy resolution)
    pub async fn is_caught(&self, name: &str) -> DexResult<Option<CatchRecord>> {
        let key = name.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT name, caught_at FROM caught WHERE name = ?1",
                params![key],
                row_to_record,
            )
            .optional()
        })
        .await
    }

    /// All records, oldest first
    pub async fn list_caught(&self) -> DexResult<Vec<CatchRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, caught_at FROM caught ORDER BY caught_at ASC, rowid ASC",
            )?;
            let records = stmt
                .query_map([], row_to_record)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    /// Names of every caught entry
    pub async fn caught_names(&self) -> DexResult<HashSet<String>> {
        Ok(self
            .list_caught()
            .await?
            .into_iter()
            .map(|r| r.name)
            .collect())
    }

    fn resolve(&self, fragment: &str) -> DexResult<String> {
        self.resolver
            .resolve(fragment)
            .map(|m| m.name)
            .ok_or_else(|| self.resolver.not_found(fragment))
    }

    /// Run blocking SQLite work off the async executor
    async fn with_conn<T, F>(&self, f: F) -> DexResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| DexError::StorageUnavailable(format!("Lock error: {}", e)))?;
            f(&mut conn).map_err(DexError::from)
        })
        .await
        .map_err(|e| DexError::StorageUnavailable(format!("Storage task failed: {}", e)))?;

        if let Err(e) = &result {
            tracing::error!(error = %e, "Collection store operation failed");
        }
        result
    }
}

fn from_millis(millis: i64) -> DexResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(DexError::Storage(rusqlite::Error::IntegralValueOutOfRange(1, millis)))
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<CatchRecord> {
    let millis: i64 = row.get(1)?;
    Ok(CatchRecord {
        name: row.get(0)?,
        caught_at: DateTime::from_timestamp_millis(millis)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(1, millis))?,
    })
}
