//! The manifest ingestion pipeline: accept → fetch → validate → store.
//!
//! Each submission runs the stages in order and stops at the first failure.
//! Nothing is written before the last stage, so a submission abandoned
//! midway leaves no trace. The single exception to fail-fast is a validation
//! failure for a URL that is already stored: the failed attempt is recorded
//! against the existing record (status untouched) so moderators can see that
//! the published document stopped validating.

pub mod accept;
pub mod fetch;
pub mod validate;

use crate::config::PortalConfig;
use crate::store::{ManifestStore, ManifestSubmission, StoreError};
use accept::{accept, AcceptError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::Utc;
use common::model::record::ManifestRecord;
use common::model::validation::ValidationError;
use common::requests::ValidationFailure;
use fetch::{FetchError, ManifestFetcher};
use log::{error, info, warn};
use std::sync::Arc;
use thiserror::Error;
use validate::{ManifestValidator, Validation};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Accept(#[from] AcceptError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("manifest has {} validation error(s)", .0.len())]
    Invalid(Vec<ValidationError>),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Shown instead of the underlying store fault, which is only logged.
pub const STORE_RETRY_MESSAGE: &str = "error saving manifest to database. Retry later.";

impl ResponseError for SubmitError {
    fn status_code(&self) -> StatusCode {
        match self {
            SubmitError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            SubmitError::Invalid(errors) => HttpResponse::BadRequest().json(ValidationFailure {
                message: self.to_string(),
                errors: errors.clone(),
            }),
            SubmitError::Store(_) => HttpResponse::ServiceUnavailable().body(STORE_RETRY_MESSAGE),
            other => HttpResponse::BadRequest().body(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineInitError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("could not compile validation rules: {0}")]
    Rules(#[from] regex::Error),
}

/// Everything one submission needs. Cheap to clone and shared by all workers.
#[derive(Clone)]
pub struct Pipeline {
    max_url_len: usize,
    manifest_uri: String,
    fetcher: ManifestFetcher,
    validator: Arc<ManifestValidator>,
    store: ManifestStore,
}

impl Pipeline {
    pub fn new(config: &PortalConfig, store: ManifestStore) -> Result<Self, PipelineInitError> {
        Ok(Self {
            max_url_len: config.max_url_len,
            manifest_uri: config.manifest_uri.clone(),
            fetcher: ManifestFetcher::new(&config.fetch)?,
            validator: Arc::new(ManifestValidator::new()?),
            store,
        })
    }

    pub async fn submit(&self, raw_url: &str) -> Result<ManifestRecord, SubmitError> {
        let url = accept(raw_url, self.max_url_len, &self.manifest_uri).map_err(|e| {
            warn!("Rejected submission {:?}: {}", raw_url, e);
            e
        })?;

        let raw_content = self.fetcher.fetch(&url).await.map_err(|e| {
            warn!("Fetch failed for {}: {}", url, e);
            e
        })?;
        let fetched_at = Utc::now();

        match self.validator.validate(&raw_content) {
            Validation::Valid(manifest) => {
                let submission =
                    ManifestSubmission::valid(url.as_str(), raw_content, manifest, fetched_at);
                let outcome = self
                    .store
                    .run(move |store| store.upsert(&submission))
                    .await
                    .map_err(|e| {
                        error!("Could not save manifest {}: {}", url, e);
                        e
                    })?;

                if outcome.created {
                    info!("Manifest {} stored as #{} (pending)", url, outcome.record.id);
                } else if outcome.content_changed {
                    info!("Manifest #{} updated from {}", outcome.record.id, url);
                } else {
                    info!("Manifest #{} resubmitted unchanged", outcome.record.id);
                }
                Ok(outcome.record)
            }
            Validation::Invalid(errors) => {
                warn!("Manifest at {} failed validation with {} error(s)", url, errors.len());
                let submission = ManifestSubmission::invalid(
                    url.as_str(),
                    raw_content,
                    errors.clone(),
                    fetched_at,
                );
                match self.store.run(move |store| store.record_invalid(&submission)).await {
                    Ok(Some(record)) => {
                        info!("Recorded failed validation against manifest #{}", record.id)
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Could not record failed validation for {}: {}", url, e);
                        return Err(e.into());
                    }
                }
                Err(SubmitError::Invalid(errors))
            }
        }
    }
}
