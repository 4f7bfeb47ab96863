use crate::db::DbThreadPool;

mod activity;
mod budget;
mod transaction;
mod user;

diesel::define_sql_function! {
    fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

/// Relational backend. Uniqueness of user emails and of participant
/// (budget_id, user_id) pairs is additionally enforced by unique indexes in
/// the database; the queries here treat a unique violation as
/// `DaoError::AlreadyExists`.
pub struct PostgresRepository {
    db_thread_pool: DbThreadPool,
}

impl PostgresRepository {
    pub fn new(db_thread_pool: &DbThreadPool) -> Self {
        Self {
            db_thread_pool: db_thread_pool.clone(),
        }
    }
}
