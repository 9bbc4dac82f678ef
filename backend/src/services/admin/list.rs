//! # Moderation Listing Service
//!
//! Backs `GET /api/admin/manifests?from=&status=`. Pages forward through the
//! moderation queue by record id: `from` is the `last_id` of the previous page
//! (anything that isn't an integer starts from the beginning), and `status`
//! optionally narrows the page to `pending`, `approved` or `rejected`.

use crate::access::Capability;
use crate::queue::{ModerationQueue, QueueError};
use actix_web::{web, HttpResponse};
use common::model::record::ManifestStatus;
use common::requests::ListManifestsQuery;

/// Actix web handler for `GET /api/admin/manifests`.
///
/// # Returns
/// - `200 OK` with a `ManifestPage`.
/// - `400 Bad Request` for an unknown `status`.
/// - `403 Forbidden` without the admin token.
pub async fn process(
    queue: web::Data<ModerationQueue>,
    capability: Capability,
    query: web::Query<ListManifestsQuery>,
) -> Result<HttpResponse, QueueError> {
    if !capability.is_admin() {
        return Err(QueueError::Forbidden);
    }
    let query = query.into_inner();
    let from = parse_cursor(query.from.as_deref());
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(text) => Some(text.parse::<ManifestStatus>()?),
    };

    let page = queue.list_pending(capability, from, status).await?;
    Ok(HttpResponse::Ok().json(page))
}

fn parse_cursor(raw: Option<&str>) -> i64 {
    raw.and_then(|text| text.trim().parse::<i64>().ok())
        .filter(|from| *from >= 0)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::parse_cursor;

    #[test]
    fn cursor_falls_back_to_start() {
        assert_eq!(parse_cursor(None), 0);
        assert_eq!(parse_cursor(Some("abc")), 0);
        assert_eq!(parse_cursor(Some("-3")), 0);
        assert_eq!(parse_cursor(Some(" 12 ")), 12);
    }
}
