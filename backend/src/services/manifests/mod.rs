//! # Manifest Service Module
//!
//! Public endpoints under `/api/manifests`: submitting a `funding.json` URL for
//! ingestion and reading back a stored manifest.
//!
//! ## Sub-modules:
//! - `submit`: Runs a submitted URL through the ingestion pipeline.
//! - `get`: Returns one stored manifest, subject to the caller's capability.

mod get;
mod submit;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

/// The base path for all public manifest endpoints.
const API_PATH: &str = "/api/manifests";

/// Configures and returns the Actix `Scope` for the public manifest routes.
///
/// # Registered Routes:
///
/// *   **`POST /submit`**: `submit::process`. Accepts `{ "url": ".." }` or a
///     `url` form field and answers with the stored record's id and status.
///
/// *   **`GET /{id}`**: `get::process`. The full record as JSON. Only approved
///     manifests are visible without the admin token.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/submit", post().to(submit::process))
        .route("/{id}", get().to(get::process))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::ADMIN_TOKEN_HEADER;
    use crate::pipeline::STORE_RETRY_MESSAGE;
    use crate::test_support::{
        portal, spawn_manifest_host, ADMIN_TOKEN, INVALID_MANIFEST, VALID_MANIFEST,
    };
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use common::model::record::{ManifestRecord, ManifestStatus};
    use common::model::validation::ViolationKind;
    use common::requests::{SubmitManifestResponse, ValidationFailure};

    #[actix_web::test]
    async fn submit_json_stores_pending_manifest() {
        let host = spawn_manifest_host(VALID_MANIFEST).await;
        let portal = portal();
        let app = test::init_service(
            App::new()
                .app_data(portal.pipeline.clone())
                .app_data(portal.queue.clone())
                .app_data(portal.token.clone())
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/manifests/submit")
            .set_json(serde_json::json!({ "url": host.url("/funding.json") }))
            .to_request();
        let body: SubmitManifestResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            body,
            SubmitManifestResponse {
                id: 1,
                status: Some(ManifestStatus::Pending)
            }
        );
    }

    #[actix_web::test]
    async fn submit_form_with_wrong_path_is_rejected() {
        let portal = portal();
        let app = test::init_service(
            App::new()
                .app_data(portal.pipeline.clone())
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/manifests/submit")
            .set_form([("url", "https://example.org/notes.txt")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = test::read_body(resp).await;
        assert_eq!(body, "URI doesn't end in /funding.json");
        assert!(portal.store.get(1).unwrap().is_none());
    }

    #[actix_web::test]
    async fn submit_reports_every_violation() {
        let host = spawn_manifest_host(INVALID_MANIFEST).await;
        let portal = portal();
        let app = test::init_service(
            App::new()
                .app_data(portal.pipeline.clone())
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/manifests/submit")
            .set_json(serde_json::json!({ "url": host.url("/funding.json") }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ValidationFailure = test::read_body_json(resp).await;
        assert_eq!(body.errors.len(), 5);
        assert!(body.errors.iter().any(|e| e.kind == ViolationKind::Reference));
    }

    #[actix_web::test]
    async fn database_failure_answers_with_a_generic_retry() {
        let host = spawn_manifest_host(VALID_MANIFEST).await;
        let portal = portal();
        portal.store.execute_batch("DROP TABLE manifests").unwrap();
        let app = test::init_service(
            App::new()
                .app_data(portal.pipeline.clone())
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/manifests/submit")
            .set_json(serde_json::json!({ "url": host.url("/funding.json") }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = test::read_body(resp).await;
        assert_eq!(body, STORE_RETRY_MESSAGE);
    }

    #[actix_web::test]
    async fn unreachable_source_is_a_client_error() {
        let portal = portal();
        let app = test::init_service(
            App::new()
                .app_data(portal.pipeline.clone())
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/manifests/submit")
            .set_json(serde_json::json!({ "url": "http://127.0.0.1:9/funding.json" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn get_hides_unapproved_manifests_from_the_public() {
        let host = spawn_manifest_host(VALID_MANIFEST).await;
        let portal = portal();
        let id = portal.pipeline.submit(&host.url("/funding.json")).await.unwrap().id;
        let app = test::init_service(
            App::new()
                .app_data(portal.queue.clone())
                .app_data(portal.token.clone())
                .service(configure_routes()),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/manifests/{}", id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri(&format!("/api/manifests/{}", id))
            .insert_header((ADMIN_TOKEN_HEADER, ADMIN_TOKEN))
            .to_request();
        let record: ManifestRecord = test::call_and_read_body_json(&app, req).await;
        assert_eq!(record.id, id);
        assert_eq!(record.raw_content, VALID_MANIFEST.as_bytes());

        portal.store.transition(id, ManifestStatus::Approved).unwrap();
        let req = test::TestRequest::get()
            .uri(&format!("/api/manifests/{}", id))
            .to_request();
        let record: ManifestRecord = test::call_and_read_body_json(&app, req).await;
        assert_eq!(record.status, Some(ManifestStatus::Approved));
    }
}
