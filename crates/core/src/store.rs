//! Relational store.
//!
//! A [`Store`] owns the SQLite connection pool. It is constructed once at process start with
//! [`Store::connect`], cloned into the services that need it, and released with
//! [`Store::close`] at shutdown.
//!
//! The schema carries the constraints the services rely on:
//!
//! - `patients.national_id` is `UNIQUE`
//! - `exams.idempotency_key` is `UNIQUE`, which makes the conditional insert in the exam
//!   ledger race-free
//! - `exams.patient_id` references `patients(id)` with `ON DELETE RESTRICT`
//!
//! Timestamps are written by the store as RFC 3339 text with millisecond precision.

use crate::config::CoreConfig;
use crate::constants::BUSY_TIMEOUT_SECS;
use crate::RecordsResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Table and index definitions, applied idempotently on connect.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY NOT NULL,
    national_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    birth_date TEXT NOT NULL,
    sex TEXT NOT NULL,
    address TEXT NOT NULL,
    phone TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_created_at ON patients(created_at);

CREATE TABLE IF NOT EXISTS exams (
    id TEXT PRIMARY KEY NOT NULL,
    modality TEXT NOT NULL
        CHECK (modality IN ('CR', 'CT', 'DX', 'MG', 'MR', 'NM', 'OT', 'PT', 'RF', 'US', 'XA')),
    exam_date TEXT NOT NULL,
    result TEXT NOT NULL,
    idempotency_key TEXT NOT NULL UNIQUE,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE RESTRICT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_exams_patient_id ON exams(patient_id);
CREATE INDEX IF NOT EXISTS idx_exams_created_at ON exams(created_at);
"#;

/// SQL expression producing the same timestamp format as the column defaults.
pub(crate) const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Handle to the relational store.
///
/// Cloning is cheap; all clones share one pool.
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens the pool described by `cfg` and applies [`SCHEMA`].
    ///
    /// Every connection enforces foreign keys and waits up to
    /// [`BUSY_TIMEOUT_SECS`] on a locked database. File databases run in WAL mode so readers
    /// do not block the single writer. An in-memory database lives only as long as its
    /// connection, so it is pinned to one connection that is never recycled.
    ///
    /// # Errors
    ///
    /// Returns `RecordsError::Store` if the URL is malformed, the database cannot be opened,
    /// or the schema cannot be applied.
    pub async fn connect(cfg: &CoreConfig) -> RecordsResult<Self> {
        let in_memory = cfg.database_url().contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(cfg.database_url())?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new();
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(cfg.max_connections())
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;

        tracing::info!(
            "store ready at {} ({} max connections)",
            cfg.database_url(),
            if in_memory { 1 } else { cfg.max_connections() }
        );
        Ok(store)
    }

    /// Applies [`SCHEMA`]. Safe to call on an already initialised database.
    pub async fn migrate(&self) -> RecordsResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Round-trips a trivial query, for health checks.
    pub async fn ping(&self) -> RecordsResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Closes every pooled connection, waiting for in-flight queries to finish.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("store closed");
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::open_test_store;
    use super::*;

    #[tokio::test]
    async fn connect_creates_schema() {
        let (_dir, store) = open_test_store().await;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(store.pool())
        .await
        .unwrap();

        assert!(tables.contains(&"patients".to_string()));
        assert!(tables.contains(&"exams".to_string()));
        store.close().await;
    }

    #[tokio::test]
    async fn migrate_is_idempotent() {
        let (_dir, store) = open_test_store().await;
        store.migrate().await.expect("second migrate should succeed");
        store.ping().await.expect("ping should succeed");
    }

    #[tokio::test]
    async fn in_memory_store_keeps_its_schema() {
        let cfg = CoreConfig::new("sqlite::memory:".into(), 5, 100).unwrap();
        let store = Store::connect(&cfg).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
