use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::schema::activity_entries;

/// Immutable audit record of a mutating action, keyed by the acting user.
#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Queryable)]
#[diesel(table_name = activity_entries)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub budget_id: Option<Uuid>,

    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub payload: String,

    pub created_at: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = activity_entries)]
pub struct NewActivityEntry<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub budget_id: Option<Uuid>,

    pub action: &'a str,
    pub entity_type: &'a str,
    pub entity_id: Option<Uuid>,
    pub payload: &'a str,

    pub created_at: SystemTime,
}
