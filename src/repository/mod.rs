//! Repository layer for database operations

pub mod books;
pub mod borrowers;
pub mod loans;
pub mod unit_of_work;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    migrate::MigrateError,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous},
};

use crate::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
};

pub use books::{BookFilter, BookStore};
pub use borrowers::{BorrowerFilter, BorrowerStore};
pub use loans::{LoanFilter, LoanStore};
pub use unit_of_work::{TxMode, UnitOfWork};

/// Per-kind storage contract shared by the book, borrower and loan stores.
///
/// Every write is staged in the owning [`UnitOfWork`] and only becomes
/// durable when it commits. Lookups go through a closed set of named filters
/// rather than arbitrary predicates.
#[async_trait]
pub trait EntityStore: Send + Sync {
    type Entity: Send;
    type New: Send + Sync;
    type Filter: Send + Sync;

    /// Every record, in insertion order
    async fn get_all(&self) -> AppResult<Vec<Self::Entity>>;

    /// The record with this id, `None` when absent
    async fn get_by_id(&self, id: i64) -> AppResult<Option<Self::Entity>>;

    /// Stage an insert and return the record with its assigned id
    async fn add(&self, new: &Self::New) -> AppResult<Self::Entity>;

    /// Stage a full overwrite keyed by id. Returns `false` when no such record exists.
    async fn update(&self, entity: &Self::Entity) -> AppResult<bool>;

    /// Stage a removal. Returns `false` when no such record exists.
    async fn delete(&self, id: i64) -> AppResult<bool>;

    async fn find(&self, filter: &Self::Filter) -> AppResult<Vec<Self::Entity>>;

    async fn exists(&self, filter: &Self::Filter) -> AppResult<bool>;
}

/// Map a unique-constraint failure to a field conflict, anything else to a database error
pub(crate) fn unique_violation(err: sqlx::Error, field: &'static str, value: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict {
            field,
            value: value.to_string(),
        },
        _ => AppError::Database(err),
    }
}

/// Entry point to storage: hands out one [`UnitOfWork`] per operation
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the connection pool described by `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Apply the embedded schema
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a read-only unit of work (deferred transaction)
    pub async fn begin(&self) -> AppResult<UnitOfWork> {
        self.begin_with(TxMode::Deferred).await
    }

    /// Start a unit of work that writes. The write lock is taken up front so
    /// concurrent writers wait for each other instead of failing mid-operation.
    pub async fn begin_write(&self) -> AppResult<UnitOfWork> {
        self.begin_with(TxMode::Immediate).await
    }

    pub async fn begin_with(&self, mode: TxMode) -> AppResult<UnitOfWork> {
        let conn = self.pool.acquire().await?;
        let uow = UnitOfWork::begin(conn, mode).await?;
        tracing::debug!(?mode, "Unit of work started");
        Ok(uow)
    }

    /// Round-trip to the database, used by the readiness check
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
