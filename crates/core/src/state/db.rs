//! # Dex Database
//!
//! Single SQLite database for collection state, stored at
//! `.dexkeeper/dexkeeper.db` by default.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Database file name inside the runtime directory
pub const DB_FILE_NAME: &str = "dexkeeper.db";

/// Shared database handle
pub struct DexDb {
    conn: Arc<Mutex<Connection>>,
}

impl DexDb {
    /// Open or create the database at `path`
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open dex database: {:?}", path.as_ref()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .context("Failed to enable WAL mode")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Get a shared connection for use by other modules
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Run schema migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .context("Failed to read schema version")?;

        if current_version < 1 {
            Self::migrate_v1(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [1],
            )?;
        }

        tracing::debug!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Dex database migrations applied"
        );

        Ok(())
    }

    /// Migration to version 1 - caught table
    fn migrate_v1(conn: &Connection) -> Result<()> {
        // One row per caught entry; the primary key is the uniqueness guarantee
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS caught (
                name TEXT PRIMARY KEY,
                caught_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_caught_at ON caught(caught_at)",
            [],
        )?;

        tracing::info!("DexDb initialized with schema version {}", SCHEMA_VERSION);

        Ok(())
    }
}
