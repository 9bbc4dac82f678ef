use crate::access::Capability;
use crate::queue::{ModerationQueue, QueueError};
use actix_web::{web, HttpResponse};

/// Actix web handler for `GET /api/manifests/{id}`.
///
/// Administrators can read any record. Everyone else gets `404 Not Found`
/// unless the manifest has been approved.
pub async fn process(
    queue: web::Data<ModerationQueue>,
    capability: Capability,
    id: web::Path<i64>,
) -> Result<HttpResponse, QueueError> {
    let record = queue.get_manifest(capability, id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}
