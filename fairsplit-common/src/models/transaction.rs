use diesel::{AsChangeset, Insertable, Queryable, QueryableByName};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::models::budget::Budget;
use crate::schema::transactions;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Expense,
    Income,
    Transfer,
}

impl TransactionType {
    pub fn as_i16(self) -> i16 {
        match self {
            TransactionType::Expense => 0,
            TransactionType::Income => 1,
            TransactionType::Transfer => 2,
        }
    }
}

impl TryFrom<i16> for TransactionType {
    type Error = i16;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TransactionType::Expense),
            1 => Ok(TransactionType::Income),
            2 => Ok(TransactionType::Transfer),
            other => Err(other),
        }
    }
}

#[derive(
    Clone, Debug, PartialEq, Serialize, Deserialize, Associations, Identifiable, Queryable,
    QueryableByName,
)]
#[diesel(belongs_to(Budget, foreign_key = budget_id))]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Transaction {
    pub id: Uuid,
    pub budget_id: Uuid,

    pub name: String,
    pub total: f64,

    pub owner_user_id: Uuid,
    pub type_code: i16,
    pub paid: bool,

    pub created_at: SystemTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewTransaction<'a> {
    pub id: Uuid,
    pub budget_id: Uuid,

    pub name: &'a str,
    pub total: f64,

    pub owner_user_id: Uuid,
    pub type_code: i16,
    pub paid: bool,

    pub created_at: SystemTime,
}

// None fields are left untouched by the update
#[derive(Clone, Debug, Default, AsChangeset)]
#[diesel(table_name = transactions)]
pub struct EditTransaction {
    pub name: Option<String>,
    pub total: Option<f64>,
    pub type_code: Option<i16>,
    pub paid: Option<bool>,
}

impl EditTransaction {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.total.is_none() && self.type_code.is_none() && self.paid.is_none()
    }
}
