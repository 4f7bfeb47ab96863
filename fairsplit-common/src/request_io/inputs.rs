use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::models::transaction::TransactionType;
use crate::validators;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputUser {
    pub email: String,
    pub name: String,
    pub credential: String,
    pub default_income: f64,
}

impl InputUser {
    pub fn validate_email_address(&self) -> validators::Validity {
        validators::validate_email_address(&self.email)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputEditUser {
    pub name: String,
    pub default_income: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputBudget {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputInvitations {
    pub emails: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputParticipant {
    pub name: String,
    pub email: String,
    pub income: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputEditParticipant {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputIncomeChange {
    pub income: f64,
    pub effective_from: Option<SystemTime>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct InputTransaction {
    pub name: String,
    pub total: f64,
    pub transaction_type: TransactionType,
    pub paid: bool,
    // Backdates the transaction when given; allocation follows this date
    pub date: Option<SystemTime>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct InputEditTransaction {
    pub name: Option<String>,
    pub total: Option<f64>,
    pub transaction_type: Option<TransactionType>,
    pub paid: Option<bool>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}
