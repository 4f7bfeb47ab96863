use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::models::activity_entry::ActivityEntry;
use crate::models::budget::Budget;
use crate::models::budget_member::BudgetMember;
use crate::models::income_history_entry::IncomeHistoryEntry;
use crate::models::invite::Invite;
use crate::models::participant::Participant;
use crate::models::transaction::Transaction;
use crate::models::user::User;

mod activity;
mod budget;
mod transaction;
mod user;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    budgets: HashMap<Uuid, Budget>,
    budget_members: Vec<BudgetMember>,
    invites: HashMap<Uuid, Invite>,
    participants: HashMap<Uuid, Participant>,
    income_history: Vec<IncomeHistoryEntry>,
    transactions: HashMap<Uuid, Transaction>,
    activity_entries: Vec<ActivityEntry>,
}

/// Process-local backend with the same observable semantics as the relational
/// one. Multi-step operations hold the write lock for their whole duration,
/// which is what makes them atomic here.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all stored records. Intended for tests that share a repository.
    pub fn reset(&self) {
        *self.write_state() = MemoryState::default();
    }

    fn read_state(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}
