//! # Manifest Store
//!
//! SQLite-backed persistence for [`ManifestRecord`]s. This is the only shared
//! mutable state in the portal: every write goes through one of the atomic
//! operations below.
//!
//! ## Guarantees
//!
//! - **Dedup**: `source_url` carries a `UNIQUE` constraint and submissions are
//!   written with a single `INSERT .. ON CONFLICT(source_url) DO UPDATE`, so two
//!   racing submissions of one URL produce one insert and one update, never two rows.
//! - **Status is sticky**: resubmitting content never touches an existing
//!   `approved`/`rejected` status. The one configurable exception is
//!   `reopen_rejected`, which sends a rejected manifest back to `pending` when
//!   it validates again.
//! - **Cursor pagination**: listings are ordered by the AUTOINCREMENT `id` and
//!   start strictly after a caller-supplied id.
//!
//! The methods here are blocking. Async callers go through [`ManifestStore::run`],
//! which moves the work onto the blocking pool and bounds how long the caller
//! waits for it.

mod schema;

use chrono::{DateTime, Utc};
use common::model::manifest::FundingManifest;
use common::model::record::{ManifestRecord, ManifestStatus};
use common::model::validation::ValidationError;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use schema::{StoredRow, COLUMNS, CREATE_SCHEMA};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("manifest {0} not found")]
    NotFound(i64),
    #[error("manifest {id} cannot be {to}: {reason}")]
    InvalidTransition {
        id: i64,
        to: ManifestStatus,
        reason: String,
    },
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("could not encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
    #[error("store did not answer within {0:?}")]
    Busy(Duration),
    #[error("store connection lock poisoned")]
    Poisoned,
    #[error("store task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Bound on how long a caller waits for the database (lock contention included).
    pub wait: Duration,
    pub reopen_rejected: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(3),
            reopen_rejected: false,
        }
    }
}

/// The content half of a pipeline run, ready to be written.
///
/// Built through [`ManifestSubmission::valid`] or [`ManifestSubmission::invalid`]
/// so that parsed content and violations can never both be present.
#[derive(Debug, Clone)]
pub struct ManifestSubmission {
    source_url: String,
    raw_content: Vec<u8>,
    parsed_content: Option<FundingManifest>,
    validation_errors: Vec<ValidationError>,
    fetched_at: DateTime<Utc>,
}

impl ManifestSubmission {
    pub fn valid(
        source_url: impl Into<String>,
        raw_content: Vec<u8>,
        manifest: FundingManifest,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            raw_content,
            parsed_content: Some(manifest),
            validation_errors: Vec::new(),
            fetched_at,
        }
    }

    pub fn invalid(
        source_url: impl Into<String>,
        raw_content: Vec<u8>,
        errors: Vec<ValidationError>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            raw_content,
            parsed_content: None,
            validation_errors: errors,
            fetched_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub record: ManifestRecord,
    /// `true` when this call inserted the row.
    pub created: bool,
    /// `false` when the stored payload was byte-identical to the new one.
    pub content_changed: bool,
}

#[derive(Clone)]
pub struct ManifestStore {
    conn: Arc<Mutex<Connection>>,
    options: StoreOptions,
}

pub fn content_md5(raw: &[u8]) -> String {
    format!("{:x}", md5::compute(raw))
}

impl ManifestStore {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        Self::init(conn, options)
    }

    pub fn open_in_memory(options: StoreOptions) -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, options)
    }

    fn init(conn: Connection, options: StoreOptions) -> Result<Self, StoreError> {
        conn.busy_timeout(options.wait)?;
        conn.execute_batch(CREATE_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            options,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    /// Runs `f` on the blocking thread pool, giving up after the configured wait.
    ///
    /// On timeout the caller gets [`StoreError::Busy`]; the blocking call itself
    /// still runs to completion (SQLite has no way to interrupt it), so the write
    /// may or may not have landed. Either way it landed atomically.
    pub async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ManifestStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        let wait = self.options.wait;
        let task = tokio::task::spawn_blocking(move || f(&store));
        match tokio::time::timeout(wait, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(StoreError::Task(join_err.to_string())),
            Err(_) => Err(StoreError::Busy(wait)),
        }
    }

    /// Inserts or updates the record for `submission.source_url` in one statement.
    ///
    /// A new row starts as `pending` when the content is valid and without a
    /// status otherwise. An existing row keeps its status, except that a row
    /// with no status yet becomes `pending` on its first valid content, and a
    /// `rejected` row is reopened when `reopen_rejected` is set.
    pub fn upsert(&self, submission: &ManifestSubmission) -> Result<UpsertOutcome, StoreError> {
        let parsed = submission
            .parsed_content
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let errors = serde_json::to_string(&submission.validation_errors)?;
        let md5 = content_md5(&submission.raw_content);
        let initial_status = parsed.as_ref().map(|_| ManifestStatus::Pending.as_str());
        let now = Utc::now();

        let sql = format!(
            "INSERT INTO manifests (source_url, raw_content, content_md5, parsed_content, \
                 validation_errors, status, fetched_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) \
             ON CONFLICT(source_url) DO UPDATE SET \
                 raw_content = excluded.raw_content, \
                 content_md5 = excluded.content_md5, \
                 parsed_content = excluded.parsed_content, \
                 validation_errors = excluded.validation_errors, \
                 fetched_at = excluded.fetched_at, \
                 updated_at = excluded.updated_at, \
                 status = CASE \
                     WHEN excluded.parsed_content IS NULL THEN manifests.status \
                     WHEN manifests.status IS NULL THEN 'pending' \
                     WHEN manifests.status = 'rejected' AND ?9 THEN 'pending' \
                     ELSE manifests.status \
                 END \
             RETURNING {}",
            COLUMNS
        );

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let previous_md5: Option<String> = tx
            .query_row(
                "SELECT content_md5 FROM manifests WHERE source_url = ?1",
                params![submission.source_url],
                |row| row.get(0),
            )
            .optional()?;
        let row = tx.query_row(
            &sql,
            params![
                submission.source_url,
                submission.raw_content,
                md5,
                parsed,
                errors,
                initial_status,
                submission.fetched_at,
                now,
                self.options.reopen_rejected,
            ],
            StoredRow::read,
        )?;
        tx.commit()?;
        drop(conn);

        Ok(UpsertOutcome {
            created: previous_md5.is_none(),
            content_changed: previous_md5.as_deref() != Some(md5.as_str()),
            record: row.into_record()?,
        })
    }

    /// Records a failed validation against an already stored manifest.
    ///
    /// Content and violations are replaced and the parsed content cleared;
    /// status is left alone. Returns `None` without writing anything when no
    /// record exists for the URL.
    pub fn record_invalid(
        &self,
        submission: &ManifestSubmission,
    ) -> Result<Option<ManifestRecord>, StoreError> {
        let errors = serde_json::to_string(&submission.validation_errors)?;
        let sql = format!(
            "UPDATE manifests SET raw_content = ?2, content_md5 = ?3, parsed_content = NULL, \
                 validation_errors = ?4, fetched_at = ?5, updated_at = ?6 \
             WHERE source_url = ?1 RETURNING {}",
            COLUMNS
        );

        let conn = self.lock()?;
        let row = conn
            .query_row(
                &sql,
                params![
                    submission.source_url,
                    submission.raw_content,
                    content_md5(&submission.raw_content),
                    errors,
                    submission.fetched_at,
                    Utc::now(),
                ],
                StoredRow::read,
            )
            .optional()?;
        drop(conn);

        row.map(StoredRow::into_record).transpose()
    }

    pub fn get(&self, id: i64) -> Result<Option<ManifestRecord>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM manifests WHERE id = ?1", COLUMNS),
                params![id],
                StoredRow::read,
            )
            .optional()?;
        drop(conn);

        row.map(StoredRow::into_record).transpose()
    }

    /// Up to `page_size` moderated records with `id > from`, ascending.
    /// `status = None` lists every moderation status; records that never
    /// validated have no status and are never listed.
    pub fn list(
        &self,
        from: i64,
        page_size: i64,
        status: Option<ManifestStatus>,
    ) -> Result<Vec<ManifestRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM manifests \
             WHERE id > ?1 AND status IS NOT NULL AND (?2 IS NULL OR status = ?2) \
             ORDER BY id ASC LIMIT ?3",
            COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![from, status.map(|s| s.as_str()), page_size],
                StoredRow::read,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(StoredRow::into_record).collect()
    }

    /// The cursor that lists the page preceding the one that starts after `from`.
    ///
    /// That page is made of the `page_size` matching records with `id <= from`;
    /// its cursor is the id just before them, or zero when they reach the start.
    pub fn previous_cursor(
        &self,
        from: i64,
        page_size: i64,
        status: Option<ManifestStatus>,
    ) -> Result<i64, StoreError> {
        if from <= 0 || page_size <= 0 {
            return Ok(0);
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id FROM manifests \
             WHERE id <= ?1 AND status IS NOT NULL AND (?2 IS NULL OR status = ?2) \
             ORDER BY id DESC LIMIT ?3",
        )?;
        let ids = stmt
            .query_map(
                params![from, status.map(|s| s.as_str()), page_size + 1],
                |row| row.get::<_, i64>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids.get(page_size as usize).copied().unwrap_or(0))
    }

    /// Moves a record to `approved` or `rejected`.
    ///
    /// The check and the update run in one immediate transaction, so concurrent
    /// transitions of the same record serialize and the last one wins.
    pub fn transition(&self, id: i64, to: ManifestStatus) -> Result<ManifestRecord, StoreError> {
        if to == ManifestStatus::Pending {
            return Err(StoreError::InvalidTransition {
                id,
                to,
                reason: "a manifest can only be approved or rejected".to_string(),
            });
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current: Option<Option<String>> = tx
            .query_row(
                "SELECT status FROM manifests WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match current {
            None => return Err(StoreError::NotFound(id)),
            Some(None) => {
                return Err(StoreError::InvalidTransition {
                    id,
                    to,
                    reason: "it has never passed validation".to_string(),
                })
            }
            Some(Some(_)) => {}
        }

        let row = tx.query_row(
            &format!(
                "UPDATE manifests SET status = ?2, updated_at = ?3 WHERE id = ?1 RETURNING {}",
                COLUMNS
            ),
            params![id, to.as_str(), Utc::now()],
            StoredRow::read,
        )?;
        tx.commit()?;
        drop(conn);

        row.into_record()
    }
}
