//! # Moderation Service Module
//!
//! Administrator endpoints under `/api/admin/manifests`. Every route needs the
//! `X-Admin-Token` header to match the configured token and answers
//! `403 Forbidden` otherwise.
//!
//! ## Sub-modules:
//! - `list`: Cursor-paged listing of the moderation queue.
//! - `moderate`: Approves or rejects a single manifest.

mod list;
mod moderate;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/admin/manifests";

/// Configures and returns the Actix `Scope` for the moderation routes.
///
/// # Registered Routes:
///
/// *   **`GET ?from=&status=`**: `list::process`. Returns a `ManifestPage` with
///     the records after `from` and the `last_id`/`prev_id` cursors.
///
/// *   **`POST /{id}/{decision}`**: `moderate::process`. `decision` is
///     `approve` or `reject`; answers with the updated record.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(list::process))
        .route("/{id}/{decision}", post().to(moderate::process))
}
