use diesel::{Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::models::budget::Budget;
use crate::schema::invites;

/// A token-addressed offer of membership. An invite with a non-null
/// `accepted_at` is terminal; it can never be re-accepted.
#[derive(
    Clone, Debug, Serialize, Deserialize, Associations, Identifiable, Queryable, QueryableByName,
)]
#[diesel(belongs_to(Budget, foreign_key = budget_id))]
#[diesel(table_name = invites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Invite {
    pub id: Uuid,
    pub budget_id: Uuid,
    pub inviter_user_id: Uuid,

    pub email: String,
    pub token: String,

    pub accepted_at: Option<SystemTime>,
    pub accepted_user_id: Option<Uuid>,

    pub created_at: SystemTime,
}

impl Invite {
    pub fn is_accepted(&self) -> bool {
        self.accepted_at.is_some()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = invites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewInvite<'a> {
    pub id: Uuid,
    pub budget_id: Uuid,
    pub inviter_user_id: Uuid,

    pub email: &'a str,
    pub token: &'a str,

    pub accepted_at: Option<SystemTime>,
    pub accepted_user_id: Option<Uuid>,

    pub created_at: SystemTime,
}
