use crate::model::record::ManifestStatus;
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};

/// Request payload for the manifest submission endpoint.
/// Accepted either as JSON or as a `url` form field.
#[derive(Deserialize)]
pub struct SubmitManifestRequest {
    pub url: String,
}

/// Query string of the admin listing endpoint.
///
/// Both fields are kept as raw text: a `from` that isn't an integer falls back
/// to the start of the queue instead of failing the request.
#[derive(Deserialize, Default)]
pub struct ListManifestsQuery {
    pub from: Option<String>,
    pub status: Option<String>,
}

/// Body returned by a successful submission.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SubmitManifestResponse {
    pub id: i64,
    pub status: Option<ManifestStatus>,
}

/// Body returned when a fetched manifest fails validation.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ValidationFailure {
    pub message: String,
    pub errors: Vec<ValidationError>,
}
