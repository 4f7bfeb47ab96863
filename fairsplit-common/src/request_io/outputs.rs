use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;
use uuid::Uuid;

use crate::models::budget::Budget;
use crate::models::budget_member::BudgetRole;
use crate::models::transaction::Transaction;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputBudgetSummary {
    pub id: Uuid,
    pub name: String,
    pub owner_user_id: Uuid,
    pub created_at: SystemTime,
    pub role: BudgetRole,
}

impl OutputBudgetSummary {
    pub fn from_budget(budget: Budget, role: BudgetRole) -> Self {
        Self {
            id: budget.id,
            name: budget.name,
            owner_user_id: budget.owner_user_id,
            created_at: budget.created_at,
            role,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputBudgetMember {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: BudgetRole,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputPage<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputTransactionWithAllocations {
    pub transaction: Transaction,
    /// Unrounded share of the total per participant id, split by income as
    /// of the transaction date.
    pub allocations: HashMap<Uuid, f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputBudgetStatistics {
    pub transactions: Vec<OutputTransactionWithAllocations>,
    pub totals_per_participant: HashMap<Uuid, f64>,
    pub total_spent: f64,
}
