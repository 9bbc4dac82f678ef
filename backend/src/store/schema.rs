//! Table layout and row mapping for the `manifests` table.

use super::StoreError;
use chrono::{DateTime, Utc};
use common::model::manifest::FundingManifest;
use common::model::record::{ManifestRecord, ManifestStatus};
use common::model::validation::ValidationError;
use rusqlite::Row;

/// `id` is AUTOINCREMENT so identifiers are never reused, which keeps
/// id-cursors valid even if rows are ever deleted by hand.
pub(super) const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS manifests (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    source_url        TEXT NOT NULL UNIQUE,
    raw_content       BLOB NOT NULL,
    content_md5       TEXT NOT NULL,
    parsed_content    TEXT,
    validation_errors TEXT NOT NULL DEFAULT '[]',
    status            TEXT CHECK (status IN ('pending', 'approved', 'rejected')),
    fetched_at        TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_manifests_status ON manifests (status, id);
";

pub(super) const COLUMNS: &str = "id, source_url, raw_content, content_md5, parsed_content, \
     validation_errors, status, fetched_at, created_at, updated_at";

/// A row as SQLite hands it back, before the JSON columns are decoded.
pub(super) struct StoredRow {
    id: i64,
    source_url: String,
    raw_content: Vec<u8>,
    content_md5: String,
    parsed_content: Option<String>,
    validation_errors: String,
    status: Option<String>,
    fetched_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredRow {
    /// Column order must match [`COLUMNS`].
    pub(super) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_url: row.get(1)?,
            raw_content: row.get(2)?,
            content_md5: row.get(3)?,
            parsed_content: row.get(4)?,
            validation_errors: row.get(5)?,
            status: row.get(6)?,
            fetched_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    pub(super) fn into_record(self) -> Result<ManifestRecord, StoreError> {
        let id = self.id;
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            StoreError::Corrupt(format!("manifest {}: bad {}: {}", id, what, e))
        };

        let parsed_content = match &self.parsed_content {
            Some(text) => Some(
                serde_json::from_str::<FundingManifest>(text)
                    .map_err(|e| corrupt("parsed_content", &e))?,
            ),
            None => None,
        };
        let validation_errors: Vec<ValidationError> = serde_json::from_str(&self.validation_errors)
            .map_err(|e| corrupt("validation_errors", &e))?;
        let status = match &self.status {
            Some(text) => Some(
                text.parse::<ManifestStatus>()
                    .map_err(|e| corrupt("status", &e))?,
            ),
            None => None,
        };

        Ok(ManifestRecord {
            id: self.id,
            source_url: self.source_url,
            raw_content: self.raw_content,
            content_md5: self.content_md5,
            parsed_content,
            status,
            validation_errors,
            fetched_at: self.fetched_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
