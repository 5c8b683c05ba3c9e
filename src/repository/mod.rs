use sqlx::{
    Sqlite, SqlitePool, Transaction,
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc, time::Duration};

pub mod activity;
pub mod employees;
pub mod feature_requests;
pub mod questions;
pub mod roles;
pub mod users;

pub use activity::ActivityRepository;
pub use employees::EmployeeRepository;
pub use feature_requests::FeatureRequestRepository;
pub use questions::{QuestionFilter, QuestionRepository};
pub use roles::{RoleDeletion, RoleRepository};
pub use users::UserRepository;

/// Result type for every persistence call. Handlers convert it into `AppError` with `?`.
pub type DbResult<T> = Result<T, sqlx::Error>;

/// Repository
///
/// The full persistence contract, assembled from one trait per resource so each file
/// owns its SQL. Handlers only ever see `Arc<dyn Repository>`, which keeps the data
/// layer swappable (SQLite in production and tests, anything else behind the traits).
pub trait Repository:
    UserRepository
    + RoleRepository
    + EmployeeRepository
    + QuestionRepository
    + FeatureRequestRepository
    + ActivityRepository
    + Send
    + Sync
{
}

impl<T> Repository for T where
    T: UserRepository
        + RoleRepository
        + EmployeeRepository
        + QuestionRepository
        + FeatureRequestRepository
        + ActivityRepository
        + Send
        + Sync
{
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// SqliteRepository
///
/// The concrete implementation of every repository trait, backed by a SQLite pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a transaction that holds the write lock from its first statement.
    ///
    /// A deferred transaction that reads before writing cannot wait for the lock when
    /// it upgrades, so concurrent writers would fail with `database is locked`.
    pub(crate) async fn begin_write(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool.begin_with("BEGIN IMMEDIATE").await
    }
}

/// connect
///
/// Opens the SQLite pool, creating the database file if needed. Foreign keys are
/// enforced on every connection. An in-memory database lives and dies with its
/// connection, so it is pinned to a single connection that is never recycled.
/// File databases run in WAL mode so readers do not block the writer.
pub async fn connect(db_url: &str) -> DbResult<SqlitePool> {
    let in_memory = db_url.contains(":memory:") || db_url.contains("mode=memory");

    let mut options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    pool_options.connect_with(options).await
}

/// Applies the embedded migrations under `./migrations`.
pub async fn migrate(pool: &SqlitePool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
