//! The moderation queue: paging through stored manifests and deciding on them.
//!
//! Every operation takes the caller's [`Capability`] explicitly. Listing and
//! moderating need [`Capability::Admin`]; reading a single manifest is open to
//! everyone but public callers only ever see approved records.

use crate::access::Capability;
use crate::pipeline::STORE_RETRY_MESSAGE;
use crate::store::{ManifestStore, StoreError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use common::model::record::{ManifestPage, ManifestRecord, ManifestStatus, UnknownStatus};
use log::{error, info};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    fn target(self) -> ManifestStatus {
        match self {
            Decision::Approve => ManifestStatus::Approved,
            Decision::Reject => ManifestStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Decision::Approve),
            "reject" => Ok(Decision::Reject),
            other => Err(QueueError::UnknownDecision(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("admin capability required")]
    Forbidden,
    #[error("unknown decision '{0}', expected 'approve' or 'reject'")]
    UnknownDecision(String),
    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatus),
    #[error("manifest {0} not found")]
    NotFound(i64),
    #[error("manifest {id} cannot become {to}: {reason}")]
    InvalidTransition {
        id: i64,
        to: ManifestStatus,
        reason: String,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for QueueError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => QueueError::NotFound(id),
            StoreError::InvalidTransition { id, to, reason } => {
                QueueError::InvalidTransition { id, to, reason }
            }
            other => QueueError::Store(other),
        }
    }
}

impl ResponseError for QueueError {
    fn status_code(&self) -> StatusCode {
        match self {
            QueueError::Forbidden => StatusCode::FORBIDDEN,
            QueueError::NotFound(_) => StatusCode::NOT_FOUND,
            QueueError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            QueueError::UnknownDecision(_)
            | QueueError::UnknownStatus(_)
            | QueueError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            QueueError::Store(e) => {
                error!("Moderation store failure: {}", e);
                STORE_RETRY_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).body(body)
    }
}

#[derive(Clone)]
pub struct ModerationQueue {
    store: ManifestStore,
    page_size: i64,
}

impl ModerationQueue {
    pub fn new(store: ManifestStore, page_size: i64) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// One page of moderated records with `id > from`, optionally filtered by status.
    pub async fn list_pending(
        &self,
        capability: Capability,
        from: i64,
        status: Option<ManifestStatus>,
    ) -> Result<ManifestPage, QueueError> {
        if !capability.is_admin() {
            return Err(QueueError::Forbidden);
        }
        let from = from.max(0);
        let page_size = self.page_size;

        let page = self
            .store
            .run(move |store| {
                let manifests = store.list(from, page_size, status)?;
                let prev_id = store.previous_cursor(from, page_size, status)?;
                let last_id = manifests.last().map_or(from, |record| record.id);
                Ok(ManifestPage {
                    manifests,
                    last_id,
                    prev_id,
                })
            })
            .await?;
        Ok(page)
    }

    pub async fn moderate(
        &self,
        capability: Capability,
        id: i64,
        decision: Decision,
    ) -> Result<ManifestRecord, QueueError> {
        if !capability.is_admin() {
            return Err(QueueError::Forbidden);
        }
        let to = decision.target();
        let record = self.store.run(move |store| store.transition(id, to)).await?;
        info!("Manifest #{} is now {}", id, to);
        Ok(record)
    }

    /// A single record. Anything not approved is reported as missing to public callers.
    pub async fn get_manifest(
        &self,
        capability: Capability,
        id: i64,
    ) -> Result<ManifestRecord, QueueError> {
        match self.store.run(move |store| store.get(id)).await? {
            Some(record) if capability.is_admin() || record.is_public() => Ok(record),
            _ => Err(QueueError::NotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ManifestSubmission, StoreOptions};
    use crate::test_support::VALID_MANIFEST;
    use chrono::Utc;
    use common::model::manifest::FundingManifest;
    use common::model::validation::{ValidationError, ViolationKind};

    fn queue() -> (ModerationQueue, ManifestStore) {
        let store = ManifestStore::open_in_memory(StoreOptions::default()).unwrap();
        (ModerationQueue::new(store.clone(), 2), store)
    }

    fn seed(store: &ManifestStore, n: usize) -> Vec<i64> {
        let manifest: FundingManifest = serde_json::from_str(VALID_MANIFEST).unwrap();
        (0..n)
            .map(|i| {
                let submission = ManifestSubmission::valid(
                    format!("https://site{}.example.org/funding.json", i),
                    VALID_MANIFEST.as_bytes().to_vec(),
                    manifest.clone(),
                    Utc::now(),
                );
                store.upsert(&submission).unwrap().record.id
            })
            .collect()
    }

    #[test]
    fn decisions_parse() {
        assert_eq!("approve".parse::<Decision>().unwrap(), Decision::Approve);
        assert_eq!("reject".parse::<Decision>().unwrap(), Decision::Reject);
        assert!(matches!(
            "delete".parse::<Decision>(),
            Err(QueueError::UnknownDecision(d)) if d == "delete"
        ));
    }

    #[actix_web::test]
    async fn public_callers_cannot_list_or_moderate() {
        let (queue, store) = queue();
        let ids = seed(&store, 1);

        assert!(matches!(
            queue.list_pending(Capability::Public, 0, None).await,
            Err(QueueError::Forbidden)
        ));
        assert!(matches!(
            queue.moderate(Capability::Public, ids[0], Decision::Approve).await,
            Err(QueueError::Forbidden)
        ));
        assert_eq!(store.get(ids[0]).unwrap().unwrap().status, Some(ManifestStatus::Pending));
    }

    #[actix_web::test]
    async fn pages_walk_forward_and_back() {
        let (queue, store) = queue();
        seed(&store, 5);

        let first = queue.list_pending(Capability::Admin, 0, None).await.unwrap();
        let ids: Vec<i64> = first.manifests.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!((first.last_id, first.prev_id), (2, 0));

        let second = queue.list_pending(Capability::Admin, first.last_id, None).await.unwrap();
        assert_eq!(second.manifests.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!((second.last_id, second.prev_id), (4, 0));

        let third = queue.list_pending(Capability::Admin, second.last_id, None).await.unwrap();
        assert_eq!(third.manifests.iter().map(|r| r.id).collect::<Vec<_>>(), vec![5]);
        assert_eq!((third.last_id, third.prev_id), (5, 2));

        let past_end = queue.list_pending(Capability::Admin, third.last_id, None).await.unwrap();
        assert!(past_end.manifests.is_empty());
        assert_eq!(past_end.last_id, 5);
    }

    #[actix_web::test]
    async fn status_filter_skips_decided_records() {
        let (queue, store) = queue();
        let ids = seed(&store, 4);
        queue.moderate(Capability::Admin, ids[1], Decision::Approve).await.unwrap();
        queue.moderate(Capability::Admin, ids[2], Decision::Reject).await.unwrap();

        let pending = queue
            .list_pending(Capability::Admin, 0, Some(ManifestStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.manifests.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 4]);

        let approved = queue
            .list_pending(Capability::Admin, 0, Some(ManifestStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved.manifests.len(), 1);
        assert_eq!(approved.manifests[0].id, ids[1]);
    }

    #[actix_web::test]
    async fn moderation_outcomes() {
        let (queue, store) = queue();
        let ids = seed(&store, 2);

        let record = queue.moderate(Capability::Admin, ids[0], Decision::Approve).await.unwrap();
        assert_eq!(record.status, Some(ManifestStatus::Approved));

        // An administrator can change their mind.
        let record = queue.moderate(Capability::Admin, ids[0], Decision::Reject).await.unwrap();
        assert_eq!(record.status, Some(ManifestStatus::Rejected));
        assert!(matches!(
            queue.moderate(Capability::Admin, 99, Decision::Approve).await,
            Err(QueueError::NotFound(99))
        ));
    }

    #[actix_web::test]
    async fn never_validated_record_cannot_be_approved() {
        let (queue, store) = queue();
        let submission = ManifestSubmission::invalid(
            "https://broken.example.org/funding.json",
            b"{".to_vec(),
            vec![ValidationError::new(ViolationKind::Malformed, "", "truncated")],
            Utc::now(),
        );
        let id = store.upsert(&submission).unwrap().record.id;

        assert!(matches!(
            queue.moderate(Capability::Admin, id, Decision::Approve).await,
            Err(QueueError::InvalidTransition { .. })
        ));
        let page = queue.list_pending(Capability::Admin, 0, None).await.unwrap();
        assert!(page.manifests.is_empty());
    }

    #[actix_web::test]
    async fn public_view_only_shows_approved() {
        let (queue, store) = queue();
        let ids = seed(&store, 1);

        assert!(matches!(
            queue.get_manifest(Capability::Public, ids[0]).await,
            Err(QueueError::NotFound(_))
        ));
        assert_eq!(queue.get_manifest(Capability::Admin, ids[0]).await.unwrap().id, ids[0]);

        queue.moderate(Capability::Admin, ids[0], Decision::Approve).await.unwrap();
        assert!(queue.get_manifest(Capability::Public, ids[0]).await.unwrap().is_public());
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(QueueError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(QueueError::NotFound(1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            QueueError::from(StoreError::Busy(std::time::Duration::from_secs(1))).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            QueueError::UnknownDecision("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
