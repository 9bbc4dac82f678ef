use crate::access::Capability;
use crate::queue::{Decision, ModerationQueue, QueueError};
use actix_web::{web, HttpResponse};

/// Actix web handler for `POST /api/admin/manifests/{id}/{decision}`.
///
/// `decision` is `approve` or `reject`. Answers with the updated record, or
/// `404` for an unknown id and `400` for a record that never validated.
pub async fn process(
    queue: web::Data<ModerationQueue>,
    capability: Capability,
    path: web::Path<(i64, String)>,
) -> Result<HttpResponse, QueueError> {
    if !capability.is_admin() {
        return Err(QueueError::Forbidden);
    }
    let (id, decision) = path.into_inner();
    let decision: Decision = decision.parse()?;

    let record = queue.moderate(capability, id, decision).await?;
    Ok(HttpResponse::Ok().json(record))
}
