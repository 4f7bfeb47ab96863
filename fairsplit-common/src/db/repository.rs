use std::time::SystemTime;
use uuid::Uuid;

use crate::db::DaoError;
use crate::models::activity_entry::{ActivityEntry, NewActivityEntry};
use crate::models::budget::{Budget, NewBudget};
use crate::models::budget_member::{BudgetMember, BudgetRole, NewBudgetMember};
use crate::models::income_history_entry::IncomeHistoryEntry;
use crate::models::invite::{Invite, NewInvite};
use crate::models::participant::{NewParticipant, Participant};
use crate::models::transaction::{EditTransaction, NewTransaction, Transaction};
use crate::models::user::{NewUser, User};

pub trait UserStore {
    /// Fails with `DaoError::AlreadyExists` when another user holds the email
    /// (compared case-insensitively).
    fn create_user(&self, user: &NewUser) -> Result<(), DaoError>;
    fn get_user_by_id(&self, user_id: Uuid) -> Result<User, DaoError>;
    fn get_user_by_email(&self, email: &str) -> Result<User, DaoError>;
    fn update_user_profile(
        &self,
        user_id: Uuid,
        name: &str,
        default_income: f64,
    ) -> Result<(), DaoError>;
}

pub trait BudgetStore {
    fn create_budget(&self, budget: &NewBudget) -> Result<(), DaoError>;
    fn get_budget(&self, budget_id: Uuid) -> Result<Budget, DaoError>;
    fn rename_budget(&self, budget_id: Uuid, name: &str) -> Result<(), DaoError>;
    /// Cascades to members, invites, participants, income history, and
    /// transactions.
    fn delete_budget(&self, budget_id: Uuid) -> Result<(), DaoError>;
    /// Budgets the user owns, unioned with budgets they hold a member row in.
    fn get_budgets_for_user(&self, user_id: Uuid) -> Result<Vec<(Budget, BudgetRole)>, DaoError>;

    fn add_budget_member(&self, member: &NewBudgetMember) -> Result<(), DaoError>;
    /// Deletes the member row and the member's participant record (with its
    /// income history) in one atomic unit.
    fn remove_member(&self, budget_id: Uuid, user_id: Uuid) -> Result<(), DaoError>;
    fn is_budget_member(&self, budget_id: Uuid, user_id: Uuid) -> Result<bool, DaoError>;
    fn list_budget_members(&self, budget_id: Uuid) -> Result<Vec<BudgetMember>, DaoError>;

    fn create_invites(&self, invites_to_create: &[NewInvite]) -> Result<(), DaoError>;
    fn get_invite(&self, invite_id: Uuid) -> Result<Invite, DaoError>;
    fn get_invite_by_token(&self, token: &str) -> Result<Invite, DaoError>;
    fn list_invites_for_budget(&self, budget_id: Uuid) -> Result<Vec<Invite>, DaoError>;
    fn list_pending_invites_for_email(&self, email: &str) -> Result<Vec<Invite>, DaoError>;
    fn delete_invite(&self, invite_id: Uuid) -> Result<(), DaoError>;
    fn refresh_invite_timestamp(
        &self,
        invite_id: Uuid,
        refreshed_at: SystemTime,
    ) -> Result<(), DaoError>;
    /// Single atomic unit: check-and-set `accepted_at` (failing with
    /// `AlreadyExists` when the invite was already accepted), insert the
    /// member row, then link the participant matching the invite email to
    /// `accepted_user_id` or insert `participant_if_absent` when none exists.
    fn accept_invite(
        &self,
        invite_id: Uuid,
        accepted_user_id: Uuid,
        participant_if_absent: &NewParticipant,
        accepted_at: SystemTime,
    ) -> Result<(), DaoError>;

    /// Fails with `AlreadyExists` when the budget already has a participant
    /// with this email (case-insensitive) or the same non-null user id.
    fn create_participant(&self, participant: &NewParticipant) -> Result<(), DaoError>;
    fn get_participant(&self, participant_id: Uuid) -> Result<Participant, DaoError>;
    fn get_participant_by_email(
        &self,
        budget_id: Uuid,
        email: &str,
    ) -> Result<Participant, DaoError>;
    fn list_participants(&self, budget_id: Uuid) -> Result<Vec<Participant>, DaoError>;
    fn update_participant(
        &self,
        participant_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<(), DaoError>;
    /// Updates the participant's current income AND appends the history
    /// entry in one atomic unit. Income mutations must always go through
    /// this operation so history and current income cannot diverge.
    fn set_participant_income(
        &self,
        participant_id: Uuid,
        income: f64,
        effective_from: SystemTime,
    ) -> Result<(), DaoError>;
    fn delete_participant(&self, participant_id: Uuid) -> Result<(), DaoError>;

    fn income_at(&self, participant_id: Uuid, at: SystemTime) -> Result<f64, DaoError>;
    fn list_income_history_for_budget(
        &self,
        budget_id: Uuid,
    ) -> Result<Vec<IncomeHistoryEntry>, DaoError>;
}

pub trait TransactionStore {
    fn create_transaction(&self, transaction: &NewTransaction) -> Result<(), DaoError>;
    fn get_transaction(&self, transaction_id: Uuid) -> Result<Transaction, DaoError>;
    /// Unfiltered, ordered by `created_at`; pagination is the consuming
    /// layer's concern.
    fn list_transactions(&self, budget_id: Uuid) -> Result<Vec<Transaction>, DaoError>;
    fn update_transaction(
        &self,
        transaction_id: Uuid,
        edits: &EditTransaction,
    ) -> Result<(), DaoError>;
    fn delete_transaction(&self, transaction_id: Uuid) -> Result<(), DaoError>;
}

pub trait ActivityStore {
    fn record_activity(&self, entry: &NewActivityEntry) -> Result<(), DaoError>;
    /// Newest first. `page` is 1-indexed; the second tuple element is the
    /// total row count for the user.
    fn list_activity_for_user(
        &self,
        user_id: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<ActivityEntry>, usize), DaoError>;
}

/// The single storage capability interface. One implementation is selected
/// at process startup (see `db::init_repository`); nothing else dispatches
/// on the backend.
pub trait Repository:
    UserStore + BudgetStore + TransactionStore + ActivityStore + Send + Sync
{
}

impl<T> Repository for T where
    T: UserStore + BudgetStore + TransactionStore + ActivityStore + Send + Sync
{
}
