use uuid::Uuid;

use crate::db::memory::MemoryRepository;
use crate::db::repository::TransactionStore;
use crate::db::DaoError;
use crate::models::transaction::{EditTransaction, NewTransaction, Transaction};

impl TransactionStore for MemoryRepository {
    fn create_transaction(&self, transaction: &NewTransaction) -> Result<(), DaoError> {
        self.write_state().transactions.insert(
            transaction.id,
            Transaction {
                id: transaction.id,
                budget_id: transaction.budget_id,
                name: transaction.name.to_owned(),
                total: transaction.total,
                owner_user_id: transaction.owner_user_id,
                type_code: transaction.type_code,
                paid: transaction.paid,
                created_at: transaction.created_at,
            },
        );

        Ok(())
    }

    fn get_transaction(&self, transaction_id: Uuid) -> Result<Transaction, DaoError> {
        self.read_state()
            .transactions
            .get(&transaction_id)
            .cloned()
            .ok_or(DaoError::NotFound)
    }

    fn list_transactions(&self, budget_id: Uuid) -> Result<Vec<Transaction>, DaoError> {
        let mut budget_transactions: Vec<Transaction> = self
            .read_state()
            .transactions
            .values()
            .filter(|t| t.budget_id == budget_id)
            .cloned()
            .collect();
        budget_transactions.sort_by_key(|t| t.created_at);

        Ok(budget_transactions)
    }

    fn update_transaction(
        &self,
        transaction_id: Uuid,
        edits: &EditTransaction,
    ) -> Result<(), DaoError> {
        let mut state = self.write_state();

        let transaction = state
            .transactions
            .get_mut(&transaction_id)
            .ok_or(DaoError::NotFound)?;

        if let Some(name) = &edits.name {
            transaction.name = name.clone();
        }

        if let Some(total) = edits.total {
            transaction.total = total;
        }

        if let Some(type_code) = edits.type_code {
            transaction.type_code = type_code;
        }

        if let Some(paid) = edits.paid {
            transaction.paid = paid;
        }

        Ok(())
    }

    fn delete_transaction(&self, transaction_id: Uuid) -> Result<(), DaoError> {
        if self
            .write_state()
            .transactions
            .remove(&transaction_id)
            .is_none()
        {
            return Err(DaoError::NotFound);
        }

        Ok(())
    }
}
