use diesel::{dsl, ExpressionMethods, QueryDsl, RunQueryDsl};
use uuid::Uuid;

use crate::db::postgres::PostgresRepository;
use crate::db::repository::TransactionStore;
use crate::db::DaoError;
use crate::models::transaction::{EditTransaction, NewTransaction, Transaction};
use crate::schema::transactions as transaction_fields;
use crate::schema::transactions::dsl::transactions;

impl TransactionStore for PostgresRepository {
    fn create_transaction(&self, transaction: &NewTransaction) -> Result<(), DaoError> {
        dsl::insert_into(transactions)
            .values(transaction)
            .execute(&mut self.db_thread_pool.get()?)?;

        Ok(())
    }

    fn get_transaction(&self, transaction_id: Uuid) -> Result<Transaction, DaoError> {
        Ok(transactions
            .find(transaction_id)
            .get_result::<Transaction>(&mut self.db_thread_pool.get()?)?)
    }

    fn list_transactions(&self, budget_id: Uuid) -> Result<Vec<Transaction>, DaoError> {
        Ok(transactions
            .filter(transaction_fields::budget_id.eq(budget_id))
            .order(transaction_fields::created_at.asc())
            .load::<Transaction>(&mut self.db_thread_pool.get()?)?)
    }

    fn update_transaction(
        &self,
        transaction_id: Uuid,
        edits: &EditTransaction,
    ) -> Result<(), DaoError> {
        let affected_row_count = diesel::update(transactions.find(transaction_id))
            .set(edits.clone())
            .execute(&mut self.db_thread_pool.get()?)?;

        if affected_row_count == 0 {
            return Err(DaoError::NotFound);
        }

        Ok(())
    }

    fn delete_transaction(&self, transaction_id: Uuid) -> Result<(), DaoError> {
        let affected_row_count = diesel::delete(transactions.find(transaction_id))
            .execute(&mut self.db_thread_pool.get()?)?;

        if affected_row_count == 0 {
            return Err(DaoError::NotFound);
        }

        Ok(())
    }
}
