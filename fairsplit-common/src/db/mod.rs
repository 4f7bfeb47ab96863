use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, PooledConnection};
use std::fmt;
use std::sync::Arc;

pub mod memory;
pub mod postgres;
pub mod repository;

pub use repository::{ActivityStore, BudgetStore, Repository, TransactionStore, UserStore};

pub type DbThreadPool = diesel::r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub fn create_db_thread_pool(database_uri: &str, max_db_connections: Option<u32>) -> DbThreadPool {
    let connection_manager = ConnectionManager::<PgConnection>::new(database_uri);

    diesel::r2d2::Pool::builder()
        .max_size(max_db_connections.unwrap_or_else(|| (num_cpus::get() * 2).try_into().unwrap_or(u32::MAX)))
        .build(connection_manager)
        .expect("Failed to create DB thread pool")
}

/// Storage backend chosen once at process startup.
pub enum StoreBackend {
    Postgres {
        database_uri: String,
        max_db_connections: Option<u32>,
    },
    Memory,
}

pub fn init_repository(backend: StoreBackend) -> Arc<dyn Repository> {
    match backend {
        StoreBackend::Postgres {
            database_uri,
            max_db_connections,
        } => {
            let db_thread_pool = create_db_thread_pool(&database_uri, max_db_connections);
            Arc::new(postgres::PostgresRepository::new(&db_thread_pool))
        }
        StoreBackend::Memory => Arc::new(memory::MemoryRepository::new()),
    }
}

#[derive(Debug)]
pub enum DaoError {
    NotFound,
    AlreadyExists,
    PoolFailure(r2d2::Error),
    QueryFailure(diesel::result::Error),
}

impl std::error::Error for DaoError {}

impl fmt::Display for DaoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaoError::NotFound => {
                write!(f, "DaoError: Record not found")
            }
            DaoError::AlreadyExists => {
                write!(f, "DaoError: Record violates a uniqueness constraint")
            }
            DaoError::PoolFailure(e) => {
                write!(f, "DaoError: Failed to obtain DB connection: {e}")
            }
            DaoError::QueryFailure(e) => {
                write!(f, "DaoError: Query failed: {e}")
            }
        }
    }
}

impl From<r2d2::Error> for DaoError {
    fn from(error: r2d2::Error) -> Self {
        DaoError::PoolFailure(error)
    }
}

impl From<diesel::result::Error> for DaoError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => DaoError::NotFound,
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => DaoError::AlreadyExists,
            other => DaoError::QueryFailure(other),
        }
    }
}
