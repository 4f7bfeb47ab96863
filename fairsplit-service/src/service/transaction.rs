use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use fairsplit_common::allocation::{split_by_income, ParticipantIncome};
use fairsplit_common::db::Repository;
use fairsplit_common::models::income_history_entry::{income_at, IncomeHistoryEntry};
use fairsplit_common::models::participant::{NewParticipant, Participant};
use fairsplit_common::models::transaction::{EditTransaction, NewTransaction, Transaction};
use fairsplit_common::request_io::{
    InputEditTransaction, InputTransaction, OutputBudgetStatistics, OutputPage,
    OutputTransactionWithAllocations, Pagination,
};
use fairsplit_common::validators;

use crate::access::require_access;
use crate::auth::AuthenticatedUser;
use crate::error::{db_error, ServiceError};
use crate::service::activity::ActivityRecorder;
use crate::service::paginate;

pub struct TransactionService {
    repo: Arc<dyn Repository>,
    activity: ActivityRecorder,
}

impl TransactionService {
    pub fn new(repo: Arc<dyn Repository>, activity: ActivityRecorder) -> Self {
        Self { repo, activity }
    }

    /// Records a transaction. When the budget has no participants at all,
    /// the caller is enrolled as one first (seeded from their profile), so
    /// the new cost always has someone to fall on.
    pub fn add_transaction(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        input: &InputTransaction,
    ) -> Result<Transaction, ServiceError> {
        require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        if let Some(message) = validators::validate_name(&input.name).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        if let Some(message) = validators::validate_amount(input.total).into_message() {
            return Err(ServiceError::ValidationError(message));
        }

        let participants = self
            .repo
            .list_participants(budget_id)
            .map_err(|e| db_error(e, "participants"))?;

        if participants.is_empty() {
            let user = self
                .repo
                .get_user_by_id(caller.user_id)
                .map_err(|e| db_error(e, "user"))?;

            let seeded = NewParticipant {
                id: Uuid::now_v7(),
                budget_id,
                user_id: Some(caller.user_id),
                income: user.default_income,
                name: &user.name,
                email: &user.email,
            };

            self.repo
                .create_participant(&seeded)
                .map_err(|e| db_error(e, "participant"))?;
        }

        let new_transaction = NewTransaction {
            id: Uuid::now_v7(),
            budget_id,
            name: &input.name,
            total: input.total,
            owner_user_id: caller.user_id,
            type_code: input.transaction_type.as_i16(),
            paid: input.paid,
            created_at: input.date.unwrap_or_else(SystemTime::now),
        };

        self.repo
            .create_transaction(&new_transaction)
            .map_err(|e| db_error(e, "transaction"))?;

        self.activity.record(
            caller,
            "transaction.add",
            "transaction",
            Some(new_transaction.id),
            Some(budget_id),
            serde_json::json!({ "name": input.name, "total": input.total }),
        );

        self.repo
            .get_transaction(new_transaction.id)
            .map_err(|e| db_error(e, "transaction"))
    }

    /// All of a budget's transactions ordered by date, optionally paginated
    /// over the full set.
    pub fn list_transactions(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        pagination: Option<Pagination>,
    ) -> Result<OutputPage<Transaction>, ServiceError> {
        require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        let transactions = self
            .repo
            .list_transactions(budget_id)
            .map_err(|e| db_error(e, "transactions"))?;

        Ok(match pagination {
            Some(p) => paginate(transactions, p),
            None => {
                let total = transactions.len();

                OutputPage {
                    items: transactions,
                    total,
                    page: 1,
                    page_size: total as u32,
                }
            }
        })
    }

    /// Edits are shared: any user with access to the budget may update any
    /// of its transactions.
    pub fn update_transaction(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        transaction_id: Uuid,
        input: &InputEditTransaction,
    ) -> Result<(), ServiceError> {
        require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        self.transaction_in_budget(budget_id, transaction_id)?;

        if let Some(name) = &input.name {
            if let Some(message) = validators::validate_name(name).into_message() {
                return Err(ServiceError::ValidationError(message));
            }
        }

        if let Some(total) = input.total {
            if let Some(message) = validators::validate_amount(total).into_message() {
                return Err(ServiceError::ValidationError(message));
            }
        }

        let edits = EditTransaction {
            name: input.name.clone(),
            total: input.total,
            type_code: input.transaction_type.map(|t| t.as_i16()),
            paid: input.paid,
        };

        if edits.is_empty() {
            return Err(ServiceError::ValidationError(String::from(
                "No fields to update",
            )));
        }

        self.repo
            .update_transaction(transaction_id, &edits)
            .map_err(|e| db_error(e, "transaction"))?;

        self.activity.record(
            caller,
            "transaction.update",
            "transaction",
            Some(transaction_id),
            Some(budget_id),
            serde_json::json!({}),
        );

        Ok(())
    }

    /// Deletion is stricter than editing: only the user who recorded the
    /// transaction or the budget owner may delete it.
    pub fn delete_transaction(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<(), ServiceError> {
        let budget = require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        let transaction = self.transaction_in_budget(budget_id, transaction_id)?;

        if transaction.owner_user_id != caller.user_id && budget.owner_user_id != caller.user_id {
            return Err(ServiceError::Forbidden(String::from(
                "Only the transaction's creator or the budget owner may delete it",
            )));
        }

        self.repo
            .delete_transaction(transaction_id)
            .map_err(|e| db_error(e, "transaction"))?;

        self.activity.record(
            caller,
            "transaction.delete",
            "transaction",
            Some(transaction_id),
            Some(budget_id),
            serde_json::json!({}),
        );

        Ok(())
    }

    /// Splits every transaction by the participants' incomes as they were
    /// on the transaction's date. A later income change never reshapes the
    /// allocation of an earlier transaction.
    pub fn get_statistics(
        &self,
        caller: &AuthenticatedUser,
        budget_id: Uuid,
    ) -> Result<OutputBudgetStatistics, ServiceError> {
        require_access(self.repo.as_ref(), budget_id, caller.user_id)?;

        let participants = self
            .repo
            .list_participants(budget_id)
            .map_err(|e| db_error(e, "participants"))?;

        let transactions = self
            .repo
            .list_transactions(budget_id)
            .map_err(|e| db_error(e, "transactions"))?;

        let mut history_by_participant: HashMap<Uuid, Vec<IncomeHistoryEntry>> = HashMap::new();
        for entry in self
            .repo
            .list_income_history_for_budget(budget_id)
            .map_err(|e| db_error(e, "income history"))?
        {
            history_by_participant
                .entry(entry.participant_id)
                .or_default()
                .push(entry);
        }

        let mut totals_per_participant: HashMap<Uuid, f64> =
            participants.iter().map(|p| (p.id, 0.0)).collect();
        let mut total_spent = 0.0;
        let mut transactions_with_allocations = Vec::with_capacity(transactions.len());

        for transaction in transactions {
            let snapshot = income_snapshot(
                &participants,
                &history_by_participant,
                transaction.created_at,
            );
            let allocations = split_by_income(transaction.total, &snapshot);

            for (participant_id, share) in &allocations {
                *totals_per_participant.entry(*participant_id).or_default() += share;
            }

            total_spent += transaction.total;
            transactions_with_allocations.push(OutputTransactionWithAllocations {
                transaction,
                allocations,
            });
        }

        Ok(OutputBudgetStatistics {
            transactions: transactions_with_allocations,
            totals_per_participant,
            total_spent,
        })
    }

    fn transaction_in_budget(
        &self,
        budget_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<Transaction, ServiceError> {
        let transaction = self
            .repo
            .get_transaction(transaction_id)
            .map_err(|e| db_error(e, "transaction"))?;

        if transaction.budget_id != budget_id {
            return Err(ServiceError::NotFound(String::from("transaction")));
        }

        Ok(transaction)
    }
}

/// Each participant's income as it was at `at`, from their recorded history
/// (falling back to their current income when no entry applies).
fn income_snapshot(
    participants: &[Participant],
    history_by_participant: &HashMap<Uuid, Vec<IncomeHistoryEntry>>,
    at: SystemTime,
) -> Vec<ParticipantIncome> {
    participants
        .iter()
        .map(|p| ParticipantIncome {
            participant_id: p.id,
            income: match history_by_participant.get(&p.id) {
                Some(entries) => income_at(entries, p.income, at),
                None => p.income,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use fairsplit_common::models::budget::Budget;
    use fairsplit_common::models::transaction::TransactionType;
    use fairsplit_common::models::user::User;
    use fairsplit_common::request_io::{
        InputBudget, InputIncomeChange, InputInvitations, InputParticipant,
    };

    use crate::service::test_utils::{caller_for, random_email, TestContext};

    fn create_budget(ctx: &TestContext, owner: &User, name: &str) -> Budget {
        ctx.budgets
            .create_budget(
                &caller_for(owner),
                &InputBudget {
                    name: name.to_owned(),
                },
            )
            .unwrap()
    }

    fn join_budget(ctx: &TestContext, owner: &User, budget_id: Uuid, member: &User) {
        let sent_invite = ctx
            .budgets
            .invite_users(
                &caller_for(owner),
                budget_id,
                &InputInvitations {
                    emails: vec![member.email.clone()],
                },
            )
            .unwrap()
            .remove(0);

        ctx.budgets
            .accept_invite(&caller_for(member), sent_invite.id)
            .unwrap();
    }

    fn add_participant(ctx: &TestContext, owner: &User, budget_id: Uuid, income: f64) -> Uuid {
        ctx.budgets
            .add_participant(
                &caller_for(owner),
                budget_id,
                &InputParticipant {
                    name: String::from("Participant"),
                    email: random_email(),
                    income,
                },
            )
            .unwrap()
            .id
    }

    fn expense(name: &str, total: f64, date: Option<SystemTime>) -> InputTransaction {
        InputTransaction {
            name: name.to_owned(),
            total,
            transaction_type: TransactionType::Expense,
            paid: false,
            date,
        }
    }

    #[test]
    fn test_first_transaction_enrolls_the_caller_as_participant() {
        let ctx = TestContext::new();
        let owner = ctx.register_user(&random_email(), 2500.0);
        let budget = create_budget(&ctx, &owner, "Solo");
        let caller = caller_for(&owner);

        let transaction = ctx
            .transactions
            .add_transaction(&caller, budget.id, &expense("Groceries", 80.0, None))
            .unwrap();
        assert_eq!(transaction.owner_user_id, owner.id);

        let participants = ctx.budgets.list_participants(&caller, budget.id).unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].user_id, Some(owner.id));
        assert_eq!(participants[0].income, 2500.0);

        // Only the very first transaction repairs the empty-participant case
        ctx.transactions
            .add_transaction(&caller, budget.id, &expense("Fuel", 40.0, None))
            .unwrap();
        assert_eq!(
            ctx.budgets.list_participants(&caller, budget.id).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_shared_edit_restricted_delete() {
        let ctx = TestContext::new();
        let owner = ctx.register_user(&random_email(), 2000.0);
        let member = ctx.register_user(&random_email(), 1000.0);
        let budget = create_budget(&ctx, &owner, "Dinner club");
        join_budget(&ctx, &owner, budget.id, &member);

        let dinner = ctx
            .transactions
            .add_transaction(
                &caller_for(&owner),
                budget.id,
                &expense("Dinner", 100.0, None),
            )
            .unwrap();

        ctx.transactions
            .update_transaction(
                &caller_for(&owner),
                budget.id,
                dinner.id,
                &InputEditTransaction {
                    total: Some(120.0),
                    ..Default::default()
                },
            )
            .unwrap();

        // Any member may edit
        ctx.transactions
            .update_transaction(
                &caller_for(&member),
                budget.id,
                dinner.id,
                &InputEditTransaction {
                    name: Some(String::from("Dinner out")),
                    ..Default::default()
                },
            )
            .unwrap();

        let listed = ctx
            .transactions
            .list_transactions(&caller_for(&member), budget.id, None)
            .unwrap();
        assert_eq!(listed.items.len(), 1);
        assert_eq!(listed.items[0].name, "Dinner out");
        assert_eq!(listed.items[0].total, 120.0);

        // But not delete someone else's transaction
        let member_delete =
            ctx.transactions
                .delete_transaction(&caller_for(&member), budget.id, dinner.id);
        assert!(matches!(member_delete, Err(ServiceError::Forbidden(_))));

        ctx.transactions
            .delete_transaction(&caller_for(&owner), budget.id, dinner.id)
            .unwrap();
        assert!(ctx
            .transactions
            .list_transactions(&caller_for(&owner), budget.id, None)
            .unwrap()
            .items
            .is_empty());
    }

    #[test]
    fn test_creator_and_budget_owner_can_both_delete() {
        let ctx = TestContext::new();
        let owner = ctx.register_user(&random_email(), 2000.0);
        let member = ctx.register_user(&random_email(), 1000.0);
        let budget = create_budget(&ctx, &owner, "Trip");
        join_budget(&ctx, &owner, budget.id, &member);

        let first = ctx
            .transactions
            .add_transaction(
                &caller_for(&member),
                budget.id,
                &expense("Tickets", 60.0, None),
            )
            .unwrap();
        let second = ctx
            .transactions
            .add_transaction(
                &caller_for(&member),
                budget.id,
                &expense("Snacks", 15.0, None),
            )
            .unwrap();

        // The member created these, so the member may delete
        ctx.transactions
            .delete_transaction(&caller_for(&member), budget.id, first.id)
            .unwrap();

        // The budget owner may delete any transaction
        ctx.transactions
            .delete_transaction(&caller_for(&owner), budget.id, second.id)
            .unwrap();
    }

    #[test]
    fn test_statistics_split_proportionally() {
        let ctx = TestContext::new();
        let owner = ctx.register_user(&random_email(), 2000.0);
        let budget = create_budget(&ctx, &owner, "Flat");
        let caller = caller_for(&owner);

        let p1 = add_participant(&ctx, &owner, budget.id, 2000.0);
        let p2 = add_participant(&ctx, &owner, budget.id, 1000.0);

        ctx.transactions
            .add_transaction(&caller, budget.id, &expense("Rent", 300.0, None))
            .unwrap();

        let stats = ctx.transactions.get_statistics(&caller, budget.id).unwrap();
        assert_eq!(stats.total_spent, 300.0);
        assert!((stats.totals_per_participant[&p1] - 200.0).abs() < 1e-9);
        assert!((stats.totals_per_participant[&p2] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_statistics_conserve_transaction_sum() {
        let ctx = TestContext::new();
        let owner = ctx.register_user(&random_email(), 2000.0);
        let budget = create_budget(&ctx, &owner, "Flat");
        let caller = caller_for(&owner);

        add_participant(&ctx, &owner, budget.id, 2357.13);
        add_participant(&ctx, &owner, budget.id, 1843.99);
        add_participant(&ctx, &owner, budget.id, 997.45);

        let totals = [173.84, 19.99, 1204.5, 3.37, 88.8];
        for (i, total) in totals.iter().enumerate() {
            ctx.transactions
                .add_transaction(&caller, budget.id, &expense(&format!("t{i}"), *total, None))
                .unwrap();
        }

        let stats = ctx.transactions.get_statistics(&caller, budget.id).unwrap();

        let expected_sum: f64 = totals.iter().sum();
        let allocated_sum: f64 = stats.totals_per_participant.values().sum();
        assert!((allocated_sum - expected_sum).abs() < 1e-3);
        assert!((stats.total_spent - expected_sum).abs() < 1e-9);
    }

    #[test]
    fn test_allocation_keys_on_transaction_date_not_query_time() {
        let ctx = TestContext::new();
        let owner = ctx.register_user(&random_email(), 2000.0);
        let budget = create_budget(&ctx, &owner, "Flat");
        let caller = caller_for(&owner);

        let jan = SystemTime::UNIX_EPOCH + Duration::from_secs(1_704_067_200);
        let mar = jan + Duration::from_secs(60 * 86_400);
        let jun = jan + Duration::from_secs(152 * 86_400);
        let jul = jan + Duration::from_secs(182 * 86_400);

        let a = add_participant(&ctx, &owner, budget.id, 1000.0);
        let b = add_participant(&ctx, &owner, budget.id, 1000.0);

        // A's income: 1000 effective January, 2000 effective June
        ctx.budgets
            .set_participant_income(
                &caller,
                budget.id,
                a,
                &InputIncomeChange {
                    income: 1000.0,
                    effective_from: Some(jan),
                },
            )
            .unwrap();
        ctx.budgets
            .set_participant_income(
                &caller,
                budget.id,
                a,
                &InputIncomeChange {
                    income: 2000.0,
                    effective_from: Some(jun),
                },
            )
            .unwrap();

        ctx.transactions
            .add_transaction(&caller, budget.id, &expense("March", 100.0, Some(mar)))
            .unwrap();
        ctx.transactions
            .add_transaction(&caller, budget.id, &expense("July", 100.0, Some(jul)))
            .unwrap();

        let stats = ctx.transactions.get_statistics(&caller, budget.id).unwrap();

        let march = stats
            .transactions
            .iter()
            .find(|t| t.transaction.name == "March")
            .unwrap();
        let july = stats
            .transactions
            .iter()
            .find(|t| t.transaction.name == "July")
            .unwrap();

        // Pre-raise transaction splits evenly; the June raise does not
        // retroactively reshape it, even though both are queried now
        assert!((march.allocations[&a] - 50.0).abs() < 1e-9);
        assert!((march.allocations[&b] - 50.0).abs() < 1e-9);

        assert!((july.allocations[&a] - 100.0 * 2000.0 / 3000.0).abs() < 1e-9);
        assert!((july.allocations[&b] - 100.0 * 1000.0 / 3000.0).abs() < 1e-9);
    }

    #[test]
    fn test_update_rejects_empty_edit_and_cross_budget_ids() {
        let ctx = TestContext::new();
        let owner = ctx.register_user(&random_email(), 2000.0);
        let budget = create_budget(&ctx, &owner, "Flat");
        let other_budget = create_budget(&ctx, &owner, "Other");
        let caller = caller_for(&owner);

        let transaction = ctx
            .transactions
            .add_transaction(&caller, budget.id, &expense("Rent", 300.0, None))
            .unwrap();

        let empty = ctx.transactions.update_transaction(
            &caller,
            budget.id,
            transaction.id,
            &InputEditTransaction::default(),
        );
        assert!(matches!(empty, Err(ServiceError::ValidationError(_))));

        let wrong_budget = ctx.transactions.update_transaction(
            &caller,
            other_budget.id,
            transaction.id,
            &InputEditTransaction {
                total: Some(100.0),
                ..Default::default()
            },
        );
        assert!(matches!(wrong_budget, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn test_list_transactions_pagination() {
        let ctx = TestContext::new();
        let owner = ctx.register_user(&random_email(), 2000.0);
        let budget = create_budget(&ctx, &owner, "Flat");
        let caller = caller_for(&owner);

        let base = SystemTime::now();
        for i in 0..5u64 {
            ctx.transactions
                .add_transaction(
                    &caller,
                    budget.id,
                    &expense(
                        &format!("t{i}"),
                        10.0,
                        Some(base + Duration::from_secs(i)),
                    ),
                )
                .unwrap();
        }

        let page = ctx
            .transactions
            .list_transactions(
                &caller,
                budget.id,
                Some(Pagination {
                    page: 2,
                    page_size: 2,
                }),
            )
            .unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "t2");
        assert_eq!(page.items[1].name, "t3");
    }

    #[test]
    fn test_outsider_cannot_touch_the_ledger() {
        let ctx = TestContext::new();
        let owner = ctx.register_user(&random_email(), 2000.0);
        let outsider = ctx.register_user(&random_email(), 1000.0);
        let budget = create_budget(&ctx, &owner, "Private");

        let add = ctx.transactions.add_transaction(
            &caller_for(&outsider),
            budget.id,
            &expense("Sneaky", 10.0, None),
        );
        assert!(matches!(add, Err(ServiceError::Forbidden(_))));

        let list = ctx
            .transactions
            .list_transactions(&caller_for(&outsider), budget.id, None);
        assert!(matches!(list, Err(ServiceError::Forbidden(_))));

        let stats = ctx
            .transactions
            .get_statistics(&caller_for(&outsider), budget.id);
        assert!(matches!(stats, Err(ServiceError::Forbidden(_))));
    }
}
