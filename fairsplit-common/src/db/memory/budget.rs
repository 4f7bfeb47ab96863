use std::time::SystemTime;
use uuid::Uuid;

use crate::db::memory::MemoryRepository;
use crate::db::repository::BudgetStore;
use crate::db::DaoError;
use crate::models::budget::{Budget, NewBudget};
use crate::models::budget_member::{BudgetMember, BudgetRole, NewBudgetMember};
use crate::models::income_history_entry::{self, IncomeHistoryEntry};
use crate::models::invite::{Invite, NewInvite};
use crate::models::participant::{NewParticipant, Participant};

fn owned_participant(participant: &NewParticipant) -> Participant {
    Participant {
        id: participant.id,
        budget_id: participant.budget_id,
        user_id: participant.user_id,
        income: participant.income,
        name: participant.name.to_owned(),
        email: participant.email.to_owned(),
    }
}

impl BudgetStore for MemoryRepository {
    fn create_budget(&self, budget: &NewBudget) -> Result<(), DaoError> {
        self.write_state().budgets.insert(
            budget.id,
            Budget {
                id: budget.id,
                name: budget.name.to_owned(),
                owner_user_id: budget.owner_user_id,
                created_at: budget.created_at,
            },
        );

        Ok(())
    }

    fn get_budget(&self, budget_id: Uuid) -> Result<Budget, DaoError> {
        self.read_state()
            .budgets
            .get(&budget_id)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    fn rename_budget(&self, budget_id: Uuid, name: &str) -> Result<(), DaoError> {
        let mut state = self.write_state();

        let budget = state.budgets.get_mut(&budget_id).ok_or(DaoError::NotFound)?;
        budget.name = name.to_owned();

        Ok(())
    }

    fn delete_budget(&self, budget_id: Uuid) -> Result<(), DaoError> {
        let mut state = self.write_state();

        if state.budgets.remove(&budget_id).is_none() {
            return Err(DaoError::NotFound);
        }

        let removed_participant_ids: Vec<Uuid> = state
            .participants
            .values()
            .filter(|p| p.budget_id == budget_id)
            .map(|p| p.id)
            .collect();

        state
            .income_history
            .retain(|h| !removed_participant_ids.contains(&h.participant_id));
        state.participants.retain(|_, p| p.budget_id != budget_id);
        state.invites.retain(|_, i| i.budget_id != budget_id);
        state.budget_members.retain(|m| m.budget_id != budget_id);
        state.transactions.retain(|_, t| t.budget_id != budget_id);

        Ok(())
    }

    fn get_budgets_for_user(&self, user_id: Uuid) -> Result<Vec<(Budget, BudgetRole)>, DaoError> {
        let state = self.read_state();

        let mut owned: Vec<Budget> = state
            .budgets
            .values()
            .filter(|b| b.owner_user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by_key(|b| b.created_at);

        let mut member_of: Vec<Budget> = state
            .budget_members
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| state.budgets.get(&m.budget_id).cloned())
            .collect();
        member_of.sort_by_key(|b| b.created_at);

        let mut budgets_with_roles = Vec::with_capacity(owned.len() + member_of.len());

        for budget in owned {
            budgets_with_roles.push((budget, BudgetRole::Owner));
        }

        for budget in member_of {
            budgets_with_roles.push((budget, BudgetRole::Member));
        }

        Ok(budgets_with_roles)
    }

    fn add_budget_member(&self, member: &NewBudgetMember) -> Result<(), DaoError> {
        let mut state = self.write_state();

        if state
            .budget_members
            .iter()
            .any(|m| m.budget_id == member.budget_id && m.user_id == member.user_id)
        {
            return Err(DaoError::AlreadyExists);
        }

        state.budget_members.push(BudgetMember {
            budget_id: member.budget_id,
            user_id: member.user_id,
            role: member.role,
            created_at: member.created_at,
        });

        Ok(())
    }

    fn remove_member(&self, budget_id: Uuid, user_id: Uuid) -> Result<(), DaoError> {
        let mut state = self.write_state();

        let member_count_before = state.budget_members.len();
        state
            .budget_members
            .retain(|m| !(m.budget_id == budget_id && m.user_id == user_id));

        if state.budget_members.len() == member_count_before {
            return Err(DaoError::NotFound);
        }

        let removed_participant_ids: Vec<Uuid> = state
            .participants
            .values()
            .filter(|p| p.budget_id == budget_id && p.user_id == Some(user_id))
            .map(|p| p.id)
            .collect();

        state
            .income_history
            .retain(|h| !removed_participant_ids.contains(&h.participant_id));
        state
            .participants
            .retain(|id, _| !removed_participant_ids.contains(id));

        Ok(())
    }

    fn is_budget_member(&self, budget_id: Uuid, user_id: Uuid) -> Result<bool, DaoError> {
        Ok(self
            .read_state()
            .budget_members
            .iter()
            .any(|m| m.budget_id == budget_id && m.user_id == user_id))
    }

    fn list_budget_members(&self, budget_id: Uuid) -> Result<Vec<BudgetMember>, DaoError> {
        let mut members: Vec<BudgetMember> = self
            .read_state()
            .budget_members
            .iter()
            .filter(|m| m.budget_id == budget_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.created_at);

        Ok(members)
    }

    fn create_invites(&self, invites_to_create: &[NewInvite]) -> Result<(), DaoError> {
        let mut state = self.write_state();

        for invite in invites_to_create {
            state.invites.insert(
                invite.id,
                Invite {
                    id: invite.id,
                    budget_id: invite.budget_id,
                    inviter_user_id: invite.inviter_user_id,
                    email: invite.email.to_owned(),
                    token: invite.token.to_owned(),
                    accepted_at: invite.accepted_at,
                    accepted_user_id: invite.accepted_user_id,
                    created_at: invite.created_at,
                },
            );
        }

        Ok(())
    }

    fn get_invite(&self, invite_id: Uuid) -> Result<Invite, DaoError> {
        self.read_state()
            .invites
            .get(&invite_id)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    fn get_invite_by_token(&self, token: &str) -> Result<Invite, DaoError> {
        self.read_state()
            .invites
            .values()
            .find(|i| i.token == token)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    fn list_invites_for_budget(&self, budget_id: Uuid) -> Result<Vec<Invite>, DaoError> {
        let mut budget_invites: Vec<Invite> = self
            .read_state()
            .invites
            .values()
            .filter(|i| i.budget_id == budget_id)
            .cloned()
            .collect();
        budget_invites.sort_by_key(|i| i.created_at);

        Ok(budget_invites)
    }

    fn list_pending_invites_for_email(&self, email: &str) -> Result<Vec<Invite>, DaoError> {
        let email_lower = email.to_lowercase();

        let mut pending: Vec<Invite> = self
            .read_state()
            .invites
            .values()
            .filter(|i| !i.is_accepted() && i.email.to_lowercase() == email_lower)
            .cloned()
            .collect();
        pending.sort_by_key(|i| i.created_at);

        Ok(pending)
    }

    fn delete_invite(&self, invite_id: Uuid) -> Result<(), DaoError> {
        if self.write_state().invites.remove(&invite_id).is_none() {
            return Err(DaoError::NotFound);
        }

        Ok(())
    }

    fn refresh_invite_timestamp(
        &self,
        invite_id: Uuid,
        refreshed_at: SystemTime,
    ) -> Result<(), DaoError> {
        let mut state = self.write_state();

        let invite = state.invites.get_mut(&invite_id).ok_or(DaoError::NotFound)?;
        invite.created_at = refreshed_at;

        Ok(())
    }

    fn accept_invite(
        &self,
        invite_id: Uuid,
        accepted_user_id: Uuid,
        participant_if_absent: &NewParticipant,
        accepted_at: SystemTime,
    ) -> Result<(), DaoError> {
        let mut state = self.write_state();

        let invite = state.invites.get_mut(&invite_id).ok_or(DaoError::NotFound)?;

        if invite.is_accepted() {
            return Err(DaoError::AlreadyExists);
        }

        invite.accepted_at = Some(accepted_at);
        invite.accepted_user_id = Some(accepted_user_id);

        let budget_id = invite.budget_id;
        let invite_email_lower = invite.email.to_lowercase();

        if !state
            .budget_members
            .iter()
            .any(|m| m.budget_id == budget_id && m.user_id == accepted_user_id)
        {
            state.budget_members.push(BudgetMember {
                budget_id,
                user_id: accepted_user_id,
                role: BudgetRole::Member.as_i16(),
                created_at: accepted_at,
            });
        }

        let existing_participant_id = state
            .participants
            .values()
            .find(|p| p.budget_id == budget_id && p.email.to_lowercase() == invite_email_lower)
            .map(|p| p.id);

        match existing_participant_id {
            Some(participant_id) => {
                if let Some(participant) = state.participants.get_mut(&participant_id) {
                    participant.user_id = Some(accepted_user_id);
                }
            }
            None => {
                state.participants.insert(
                    participant_if_absent.id,
                    owned_participant(participant_if_absent),
                );
            }
        }

        Ok(())
    }

    fn create_participant(&self, participant: &NewParticipant) -> Result<(), DaoError> {
        let mut state = self.write_state();

        let email_lower = participant.email.to_lowercase();

        let email_taken = state.participants.values().any(|p| {
            p.budget_id == participant.budget_id && p.email.to_lowercase() == email_lower
        });

        if email_taken {
            return Err(DaoError::AlreadyExists);
        }

        if participant.user_id.is_some() {
            let user_represented = state.participants.values().any(|p| {
                p.budget_id == participant.budget_id && p.user_id == participant.user_id
            });

            if user_represented {
                return Err(DaoError::AlreadyExists);
            }
        }

        state
            .participants
            .insert(participant.id, owned_participant(participant));

        Ok(())
    }

    fn get_participant(&self, participant_id: Uuid) -> Result<Participant, DaoError> {
        self.read_state()
            .participants
            .get(&participant_id)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    fn get_participant_by_email(
        &self,
        budget_id: Uuid,
        email: &str,
    ) -> Result<Participant, DaoError> {
        let email_lower = email.to_lowercase();

        self.read_state()
            .participants
            .values()
            .find(|p| p.budget_id == budget_id && p.email.to_lowercase() == email_lower)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    fn list_participants(&self, budget_id: Uuid) -> Result<Vec<Participant>, DaoError> {
        let mut budget_participants: Vec<Participant> = self
            .read_state()
            .participants
            .values()
            .filter(|p| p.budget_id == budget_id)
            .cloned()
            .collect();
        budget_participants.sort_by_key(|p| p.id);

        Ok(budget_participants)
    }

    fn update_participant(
        &self,
        participant_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<(), DaoError> {
        let mut state = self.write_state();

        let budget_id = state
            .participants
            .get(&participant_id)
            .ok_or(DaoError::NotFound)?
            .budget_id;

        let email_lower = email.to_lowercase();
        let email_taken = state.participants.values().any(|p| {
            p.budget_id == budget_id
                && p.id != participant_id
                && p.email.to_lowercase() == email_lower
        });

        if email_taken {
            return Err(DaoError::AlreadyExists);
        }

        let participant = state
            .participants
            .get_mut(&participant_id)
            .ok_or(DaoError::NotFound)?;
        participant.name = name.to_owned();
        participant.email = email.to_owned();

        Ok(())
    }

    fn set_participant_income(
        &self,
        participant_id: Uuid,
        income: f64,
        effective_from: SystemTime,
    ) -> Result<(), DaoError> {
        let mut state = self.write_state();

        let participant = state
            .participants
            .get_mut(&participant_id)
            .ok_or(DaoError::NotFound)?;
        participant.income = income;

        state.income_history.push(IncomeHistoryEntry {
            id: Uuid::now_v7(),
            participant_id,
            income,
            effective_from,
        });

        Ok(())
    }

    fn delete_participant(&self, participant_id: Uuid) -> Result<(), DaoError> {
        let mut state = self.write_state();

        if state.participants.remove(&participant_id).is_none() {
            return Err(DaoError::NotFound);
        }

        state
            .income_history
            .retain(|h| h.participant_id != participant_id);

        Ok(())
    }

    fn income_at(&self, participant_id: Uuid, at: SystemTime) -> Result<f64, DaoError> {
        let state = self.read_state();

        let participant = state
            .participants
            .get(&participant_id)
            .ok_or(DaoError::NotFound)?;

        let participant_history = state
            .income_history
            .iter()
            .filter(|h| h.participant_id == participant_id);

        Ok(income_history_entry::income_at(
            participant_history,
            participant.income,
            at,
        ))
    }

    fn list_income_history_for_budget(
        &self,
        budget_id: Uuid,
    ) -> Result<Vec<IncomeHistoryEntry>, DaoError> {
        let state = self.read_state();

        let mut history: Vec<IncomeHistoryEntry> = state
            .income_history
            .iter()
            .filter(|h| {
                state
                    .participants
                    .get(&h.participant_id)
                    .is_some_and(|p| p.budget_id == budget_id)
            })
            .cloned()
            .collect();
        history.sort_by_key(|h| h.effective_from);

        Ok(history)
    }
}
