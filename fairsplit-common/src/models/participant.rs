use diesel::{Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::budget::Budget;
use crate::schema::participants;

/// A cost-bearing member of a budget. Distinct from authorization membership:
/// a participant may exist before the person behind its email registers, in
/// which case `user_id` is null until the accounts are unified by email.
#[derive(
    Clone, Debug, PartialEq, Serialize, Deserialize, Associations, Identifiable, Queryable,
    QueryableByName,
)]
#[diesel(belongs_to(Budget, foreign_key = budget_id))]
#[diesel(table_name = participants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Participant {
    pub id: Uuid,
    pub budget_id: Uuid,
    pub user_id: Option<Uuid>,
    pub income: f64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = participants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewParticipant<'a> {
    pub id: Uuid,
    pub budget_id: Uuid,
    pub user_id: Option<Uuid>,
    pub income: f64,
    pub name: &'a str,
    pub email: &'a str,
}
