use crate::model::manifest::FundingManifest;
use crate::model::validation::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Moderation lifecycle of a stored manifest.
///
/// A record only gets a status once its content has validated at least once;
/// until then it sits outside the moderation queue entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    Pending,
    Approved,
    Rejected,
}

impl ManifestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestStatus::Pending => "pending",
            ManifestStatus::Approved => "approved",
            ManifestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown manifest status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ManifestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ManifestStatus::Pending),
            "approved" => Ok(ManifestStatus::Approved),
            "rejected" => Ok(ManifestStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The persisted unit: one manifest per canonical source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub id: i64,
    pub source_url: String,
    /// Last fetched payload. Serialized as (lossy) UTF-8 text for display.
    #[serde(serialize_with = "raw_as_text", deserialize_with = "raw_from_text")]
    pub raw_content: Vec<u8>,
    pub content_md5: String,
    pub parsed_content: Option<FundingManifest>,
    pub status: Option<ManifestStatus>,
    pub validation_errors: Vec<ValidationError>,
    pub fetched_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ManifestRecord {
    /// Public visitors only ever see approved manifests.
    pub fn is_public(&self) -> bool {
        self.status == Some(ManifestStatus::Approved)
    }
}

fn raw_as_text<S: Serializer>(raw: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(raw))
}

fn raw_from_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    String::deserialize(deserializer).map(String::into_bytes)
}

/// One page of the moderation queue.
///
/// `last_id` is the cursor for the next page; `prev_id` the cursor that lists
/// the page before this one (zero when already at the start).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestPage {
    pub manifests: Vec<ManifestRecord>,
    /// On an empty page this is the requested `from`, not 0, so polling the
    /// same cursor picks up records added later.
    pub last_id: i64,
    pub prev_id: i64,
}
