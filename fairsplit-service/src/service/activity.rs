use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use fairsplit_common::db::Repository;
use fairsplit_common::models::activity_entry::{ActivityEntry, NewActivityEntry};
use fairsplit_common::request_io::{OutputPage, Pagination};

use crate::auth::AuthenticatedUser;
use crate::error::{db_error, ServiceError};

/// Best-effort append of audit records. A failed write is logged and never
/// fails the operation that produced it.
#[derive(Clone)]
pub struct ActivityRecorder {
    repo: Arc<dyn Repository>,
}

impl ActivityRecorder {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub fn record(
        &self,
        actor: &AuthenticatedUser,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        budget_id: Option<Uuid>,
        payload: serde_json::Value,
    ) {
        let payload = payload.to_string();

        let entry = NewActivityEntry {
            id: Uuid::now_v7(),
            user_id: actor.user_id,
            budget_id,
            action,
            entity_type,
            entity_id,
            payload: &payload,
            created_at: SystemTime::now(),
        };

        if let Err(e) = self.repo.record_activity(&entry) {
            log::error!("{e}");
        }
    }
}

pub struct ActivityService {
    repo: Arc<dyn Repository>,
}

impl ActivityService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// The caller's own activity, newest first.
    pub fn list(
        &self,
        caller: &AuthenticatedUser,
        pagination: Pagination,
    ) -> Result<OutputPage<ActivityEntry>, ServiceError> {
        let page = pagination.page.max(1);

        let (entries, total) = self
            .repo
            .list_activity_for_user(caller.user_id, page, pagination.page_size)
            .map_err(|e| db_error(e, "activity"))?;

        Ok(OutputPage {
            items: entries,
            total,
            page,
            page_size: pagination.page_size,
        })
    }
}
