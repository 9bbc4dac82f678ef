//! # Manifest Submission Service
//!
//! Backs `POST /api/manifests/submit`. The body carries the URL of a
//! `funding.json` either as JSON (`{ "url": ".." }`) or as a `url` form field,
//! so both API clients and a plain HTML form can submit.
//!
//! The handler only unwraps the request; accepting, fetching, validating and
//! storing the manifest happen in [`Pipeline::submit`]. Failures are rendered
//! by [`SubmitError`]'s `ResponseError` impl:
//! - `400 Bad Request` with the reason for a rejected URL or a failed fetch.
//! - `400 Bad Request` with the list of violations for an invalid manifest.
//! - `503 Service Unavailable` with a retry message when the database fails.

use crate::pipeline::{Pipeline, SubmitError};
use actix_web::web::{self, Either};
use actix_web::HttpResponse;
use common::requests::{SubmitManifestRequest, SubmitManifestResponse};

/// Actix web handler for `POST /api/manifests/submit`.
///
/// # Returns
/// - `200 OK` with the id and moderation status of the stored record.
pub async fn process(
    pipeline: web::Data<Pipeline>,
    payload: Either<web::Json<SubmitManifestRequest>, web::Form<SubmitManifestRequest>>,
) -> Result<HttpResponse, SubmitError> {
    let request = match payload {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    };

    let record = pipeline.submit(&request.url).await?;
    Ok(HttpResponse::Ok().json(SubmitManifestResponse {
        id: record.id,
        status: record.status,
    }))
}
