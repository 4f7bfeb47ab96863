use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::models::budget::Budget;
use crate::models::user::User;
use crate::schema::budget_members;

/// A caller's privilege within a budget. The owner is tracked on the budget
/// row itself and never appears as a `BudgetMember` record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetRole {
    Owner,
    Member,
}

impl BudgetRole {
    pub fn as_i16(self) -> i16 {
        match self {
            BudgetRole::Owner => 0,
            BudgetRole::Member => 1,
        }
    }
}

impl TryFrom<i16> for BudgetRole {
    type Error = i16;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(BudgetRole::Owner),
            1 => Ok(BudgetRole::Member),
            other => Err(other),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Identifiable, Associations, Queryable)]
#[diesel(belongs_to(User, foreign_key = user_id))]
#[diesel(belongs_to(Budget, foreign_key = budget_id))]
#[diesel(table_name = budget_members, primary_key(budget_id, user_id))]
pub struct BudgetMember {
    pub budget_id: Uuid,
    pub user_id: Uuid,
    pub role: i16,
    pub created_at: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = budget_members, primary_key(budget_id, user_id))]
pub struct NewBudgetMember {
    pub budget_id: Uuid,
    pub user_id: Uuid,
    pub role: i16,
    pub created_at: SystemTime,
}
