use diesel::{
    dsl, sql_query, sql_types, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl,
};
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::postgres::{lower, PostgresRepository};
use crate::db::repository::BudgetStore;
use crate::db::DaoError;
use crate::models::budget::{Budget, NewBudget};
use crate::models::budget_member::{BudgetMember, BudgetRole, NewBudgetMember};
use crate::models::income_history_entry::{IncomeHistoryEntry, NewIncomeHistoryEntry};
use crate::models::invite::{Invite, NewInvite};
use crate::models::participant::{NewParticipant, Participant};
use crate::schema::budget_members as member_fields;
use crate::schema::budget_members::dsl::budget_members;
use crate::schema::budgets as budget_fields;
use crate::schema::budgets::dsl::budgets;
use crate::schema::income_history_entries as history_fields;
use crate::schema::income_history_entries::dsl::income_history_entries;
use crate::schema::invites as invite_fields;
use crate::schema::invites::dsl::invites;
use crate::schema::participants as participant_fields;
use crate::schema::participants::dsl::participants;
use crate::schema::transactions as transaction_fields;
use crate::schema::transactions::dsl::transactions;

impl BudgetStore for PostgresRepository {
    fn create_budget(&self, budget: &NewBudget) -> Result<(), DaoError> {
        dsl::insert_into(budgets)
            .values(budget)
            .execute(&mut self.db_thread_pool.get()?)?;

        Ok(())
    }

    fn get_budget(&self, budget_id: Uuid) -> Result<Budget, DaoError> {
        Ok(budgets
            .find(budget_id)
            .get_result::<Budget>(&mut self.db_thread_pool.get()?)?)
    }

    fn rename_budget(&self, budget_id: Uuid, name: &str) -> Result<(), DaoError> {
        let affected_row_count = diesel::update(budgets.find(budget_id))
            .set(budget_fields::name.eq(name))
            .execute(&mut self.db_thread_pool.get()?)?;

        if affected_row_count == 0 {
            return Err(DaoError::NotFound);
        }

        Ok(())
    }

    fn delete_budget(&self, budget_id: Uuid) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let budget_participant_ids = participants
                    .filter(participant_fields::budget_id.eq(budget_id))
                    .select(participant_fields::id);

                diesel::delete(
                    income_history_entries
                        .filter(history_fields::participant_id.eq_any(budget_participant_ids)),
                )
                .execute(conn)?;

                diesel::delete(participants.filter(participant_fields::budget_id.eq(budget_id)))
                    .execute(conn)?;
                diesel::delete(invites.filter(invite_fields::budget_id.eq(budget_id)))
                    .execute(conn)?;
                diesel::delete(budget_members.filter(member_fields::budget_id.eq(budget_id)))
                    .execute(conn)?;
                diesel::delete(transactions.filter(transaction_fields::budget_id.eq(budget_id)))
                    .execute(conn)?;

                let affected_row_count =
                    diesel::delete(budgets.find(budget_id)).execute(conn)?;

                if affected_row_count == 0 {
                    return Err(DaoError::NotFound);
                }

                Ok(())
            })
    }

    fn get_budgets_for_user(&self, user_id: Uuid) -> Result<Vec<(Budget, BudgetRole)>, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let owned = budgets
                    .filter(budget_fields::owner_user_id.eq(user_id))
                    .order(budget_fields::created_at.asc())
                    .load::<Budget>(conn)?;

                let query = "SELECT budgets.* FROM budget_members, budgets \
                             WHERE budget_members.user_id = $1 \
                             AND budget_members.budget_id = budgets.id \
                             ORDER BY budgets.created_at";

                let member_of = sql_query(query)
                    .bind::<sql_types::Uuid, _>(user_id)
                    .load::<Budget>(conn)?;

                let mut budgets_with_roles = Vec::with_capacity(owned.len() + member_of.len());

                for budget in owned {
                    budgets_with_roles.push((budget, BudgetRole::Owner));
                }

                for budget in member_of {
                    budgets_with_roles.push((budget, BudgetRole::Member));
                }

                Ok(budgets_with_roles)
            })
    }

    fn add_budget_member(&self, member: &NewBudgetMember) -> Result<(), DaoError> {
        dsl::insert_into(budget_members)
            .values(member)
            .execute(&mut self.db_thread_pool.get()?)?;

        Ok(())
    }

    fn remove_member(&self, budget_id: Uuid, user_id: Uuid) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let affected_row_count = diesel::delete(
                    budget_members
                        .filter(member_fields::budget_id.eq(budget_id))
                        .filter(member_fields::user_id.eq(user_id)),
                )
                .execute(conn)?;

                if affected_row_count == 0 {
                    return Err(DaoError::NotFound);
                }

                let member_participant_ids = participants
                    .filter(participant_fields::budget_id.eq(budget_id))
                    .filter(participant_fields::user_id.eq(user_id))
                    .select(participant_fields::id)
                    .load::<Uuid>(conn)?;

                diesel::delete(
                    income_history_entries
                        .filter(history_fields::participant_id.eq_any(&member_participant_ids)),
                )
                .execute(conn)?;

                diesel::delete(
                    participants.filter(participant_fields::id.eq_any(&member_participant_ids)),
                )
                .execute(conn)?;

                Ok(())
            })
    }

    fn is_budget_member(&self, budget_id: Uuid, user_id: Uuid) -> Result<bool, DaoError> {
        let member_count: i64 = budget_members
            .filter(member_fields::budget_id.eq(budget_id))
            .filter(member_fields::user_id.eq(user_id))
            .count()
            .get_result(&mut self.db_thread_pool.get()?)?;

        Ok(member_count > 0)
    }

    fn list_budget_members(&self, budget_id: Uuid) -> Result<Vec<BudgetMember>, DaoError> {
        Ok(budget_members
            .filter(member_fields::budget_id.eq(budget_id))
            .order(member_fields::created_at.asc())
            .load::<BudgetMember>(&mut self.db_thread_pool.get()?)?)
    }

    fn create_invites(&self, invites_to_create: &[NewInvite]) -> Result<(), DaoError> {
        dsl::insert_into(invites)
            .values(invites_to_create)
            .execute(&mut self.db_thread_pool.get()?)?;

        Ok(())
    }

    fn get_invite(&self, invite_id: Uuid) -> Result<Invite, DaoError> {
        Ok(invites
            .find(invite_id)
            .get_result::<Invite>(&mut self.db_thread_pool.get()?)?)
    }

    fn get_invite_by_token(&self, token: &str) -> Result<Invite, DaoError> {
        Ok(invites
            .filter(invite_fields::token.eq(token))
            .first::<Invite>(&mut self.db_thread_pool.get()?)?)
    }

    fn list_invites_for_budget(&self, budget_id: Uuid) -> Result<Vec<Invite>, DaoError> {
        Ok(invites
            .filter(invite_fields::budget_id.eq(budget_id))
            .order(invite_fields::created_at.asc())
            .load::<Invite>(&mut self.db_thread_pool.get()?)?)
    }

    fn list_pending_invites_for_email(&self, email: &str) -> Result<Vec<Invite>, DaoError> {
        Ok(invites
            .filter(lower(invite_fields::email).eq(email.to_lowercase()))
            .filter(invite_fields::accepted_at.is_null())
            .order(invite_fields::created_at.asc())
            .load::<Invite>(&mut self.db_thread_pool.get()?)?)
    }

    fn delete_invite(&self, invite_id: Uuid) -> Result<(), DaoError> {
        let affected_row_count = diesel::delete(invites.find(invite_id))
            .execute(&mut self.db_thread_pool.get()?)?;

        if affected_row_count == 0 {
            return Err(DaoError::NotFound);
        }

        Ok(())
    }

    fn refresh_invite_timestamp(
        &self,
        invite_id: Uuid,
        refreshed_at: SystemTime,
    ) -> Result<(), DaoError> {
        let affected_row_count = diesel::update(invites.find(invite_id))
            .set(invite_fields::created_at.eq(refreshed_at))
            .execute(&mut self.db_thread_pool.get()?)?;

        if affected_row_count == 0 {
            return Err(DaoError::NotFound);
        }

        Ok(())
    }

    fn accept_invite(
        &self,
        invite_id: Uuid,
        accepted_user_id: Uuid,
        participant_if_absent: &NewParticipant,
        accepted_at: SystemTime,
    ) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                // Single-statement check-and-set; a concurrent double-accept
                // loses this race and sees zero affected rows
                let affected_row_count = diesel::update(
                    invites
                        .filter(invite_fields::id.eq(invite_id))
                        .filter(invite_fields::accepted_at.is_null()),
                )
                .set((
                    invite_fields::accepted_at.eq(accepted_at),
                    invite_fields::accepted_user_id.eq(accepted_user_id),
                ))
                .execute(conn)?;

                if affected_row_count == 0 {
                    let invite_count: i64 = invites.find(invite_id).count().get_result(conn)?;

                    return Err(if invite_count == 0 {
                        DaoError::NotFound
                    } else {
                        DaoError::AlreadyExists
                    });
                }

                let invite = invites.find(invite_id).get_result::<Invite>(conn)?;

                let new_member = NewBudgetMember {
                    budget_id: invite.budget_id,
                    user_id: accepted_user_id,
                    role: BudgetRole::Member.as_i16(),
                    created_at: accepted_at,
                };

                dsl::insert_into(budget_members)
                    .values(&new_member)
                    .on_conflict_do_nothing()
                    .execute(conn)?;

                let existing_participant = participants
                    .filter(participant_fields::budget_id.eq(invite.budget_id))
                    .filter(lower(participant_fields::email).eq(invite.email.to_lowercase()))
                    .first::<Participant>(conn)
                    .optional()?;

                match existing_participant {
                    Some(participant) => {
                        diesel::update(participants.find(participant.id))
                            .set(participant_fields::user_id.eq(accepted_user_id))
                            .execute(conn)?;
                    }
                    None => {
                        dsl::insert_into(participants)
                            .values(participant_if_absent)
                            .execute(conn)?;
                    }
                }

                Ok(())
            })
    }

    fn create_participant(&self, participant: &NewParticipant) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let email_taken = participants
                    .filter(participant_fields::budget_id.eq(participant.budget_id))
                    .filter(lower(participant_fields::email).eq(participant.email.to_lowercase()))
                    .count()
                    .get_result::<i64>(conn)?;

                if email_taken > 0 {
                    return Err(DaoError::AlreadyExists);
                }

                if let Some(user_id) = participant.user_id {
                    let user_represented = participants
                        .filter(participant_fields::budget_id.eq(participant.budget_id))
                        .filter(participant_fields::user_id.eq(user_id))
                        .count()
                        .get_result::<i64>(conn)?;

                    if user_represented > 0 {
                        return Err(DaoError::AlreadyExists);
                    }
                }

                dsl::insert_into(participants)
                    .values(participant)
                    .execute(conn)?;

                Ok(())
            })
    }

    fn get_participant(&self, participant_id: Uuid) -> Result<Participant, DaoError> {
        Ok(participants
            .find(participant_id)
            .get_result::<Participant>(&mut self.db_thread_pool.get()?)?)
    }

    fn get_participant_by_email(
        &self,
        budget_id: Uuid,
        email: &str,
    ) -> Result<Participant, DaoError> {
        Ok(participants
            .filter(participant_fields::budget_id.eq(budget_id))
            .filter(lower(participant_fields::email).eq(email.to_lowercase()))
            .first::<Participant>(&mut self.db_thread_pool.get()?)?)
    }

    fn list_participants(&self, budget_id: Uuid) -> Result<Vec<Participant>, DaoError> {
        Ok(participants
            .filter(participant_fields::budget_id.eq(budget_id))
            .order(participant_fields::id.asc())
            .load::<Participant>(&mut self.db_thread_pool.get()?)?)
    }

    fn update_participant(
        &self,
        participant_id: Uuid,
        name: &str,
        email: &str,
    ) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let participant = participants
                    .find(participant_id)
                    .get_result::<Participant>(conn)?;

                let email_taken = participants
                    .filter(participant_fields::budget_id.eq(participant.budget_id))
                    .filter(participant_fields::id.ne(participant_id))
                    .filter(lower(participant_fields::email).eq(email.to_lowercase()))
                    .count()
                    .get_result::<i64>(conn)?;

                if email_taken > 0 {
                    return Err(DaoError::AlreadyExists);
                }

                diesel::update(participants.find(participant_id))
                    .set((
                        participant_fields::name.eq(name),
                        participant_fields::email.eq(email),
                    ))
                    .execute(conn)?;

                Ok(())
            })
    }

    fn set_participant_income(
        &self,
        participant_id: Uuid,
        income: f64,
        effective_from: SystemTime,
    ) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                let affected_row_count = diesel::update(participants.find(participant_id))
                    .set(participant_fields::income.eq(income))
                    .execute(conn)?;

                if affected_row_count == 0 {
                    return Err(DaoError::NotFound);
                }

                let history_entry = NewIncomeHistoryEntry {
                    id: Uuid::now_v7(),
                    participant_id,
                    income,
                    effective_from,
                };

                dsl::insert_into(income_history_entries)
                    .values(&history_entry)
                    .execute(conn)?;

                Ok(())
            })
    }

    fn delete_participant(&self, participant_id: Uuid) -> Result<(), DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        db_connection
            .build_transaction()
            .run::<_, DaoError, _>(|conn| {
                diesel::delete(
                    income_history_entries
                        .filter(history_fields::participant_id.eq(participant_id)),
                )
                .execute(conn)?;

                let affected_row_count =
                    diesel::delete(participants.find(participant_id)).execute(conn)?;

                if affected_row_count == 0 {
                    return Err(DaoError::NotFound);
                }

                Ok(())
            })
    }

    fn income_at(&self, participant_id: Uuid, at: SystemTime) -> Result<f64, DaoError> {
        let mut db_connection = self.db_thread_pool.get()?;

        let participant = participants
            .find(participant_id)
            .get_result::<Participant>(&mut db_connection)?;

        let latest_applicable_entry = income_history_entries
            .filter(history_fields::participant_id.eq(participant_id))
            .filter(history_fields::effective_from.le(at))
            .order(history_fields::effective_from.desc())
            .first::<IncomeHistoryEntry>(&mut db_connection)
            .optional()?;

        Ok(latest_applicable_entry.map_or(participant.income, |e| e.income))
    }

    fn list_income_history_for_budget(
        &self,
        budget_id: Uuid,
    ) -> Result<Vec<IncomeHistoryEntry>, DaoError> {
        let budget_participant_ids = participants
            .filter(participant_fields::budget_id.eq(budget_id))
            .select(participant_fields::id);

        Ok(income_history_entries
            .filter(history_fields::participant_id.eq_any(budget_participant_ids))
            .order(history_fields::effective_from.asc())
            .load::<IncomeHistoryEntry>(&mut self.db_thread_pool.get()?)?)
    }
}
