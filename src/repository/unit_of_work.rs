//! Unit of Work: one transaction shared by every entity store of an operation

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use sqlx::{pool::PoolConnection, Sqlite, SqliteConnection};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use super::{books::BookStore, borrowers::BorrowerStore, loans::LoanStore};
use crate::error::{AppError, AppResult};

/// How the transaction takes its locks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// Plain `BEGIN`: locks are taken lazily, suited to read-only work
    Deferred,
    /// `BEGIN IMMEDIATE`: the write lock is held from the first statement,
    /// so concurrent writers queue on the busy timeout instead of failing
    /// when they upgrade a stale read snapshot
    Immediate,
}

impl TxMode {
    fn begin_sql(self) -> &'static str {
        match self {
            TxMode::Deferred => "BEGIN",
            TxMode::Immediate => "BEGIN IMMEDIATE",
        }
    }
}

/// Connection holding the open transaction plus the running count of rows
/// touched by staged writes. `None` once committed or rolled back.
pub(crate) struct TxContext {
    conn: Mutex<Option<PoolConnection<Sqlite>>>,
    affected: AtomicU64,
}

/// Locked access to the shared transaction
pub(crate) struct TxGuard<'a>(MappedMutexGuard<'a, PoolConnection<Sqlite>>);

impl TxGuard<'_> {
    pub(crate) fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.0
    }
}

impl TxContext {
    pub(crate) async fn lock(&self) -> AppResult<TxGuard<'_>> {
        MutexGuard::try_map(self.conn.lock().await, Option::as_mut)
            .map(TxGuard)
            .map_err(|_| AppError::Internal("unit of work already finished".to_string()))
    }

    pub(crate) fn record(&self, rows: u64) {
        self.affected.fetch_add(rows, Ordering::Relaxed);
    }
}

impl Drop for TxContext {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.get_mut().take() {
            discard(conn);
        }
    }
}

/// Roll back an abandoned transaction before its connection goes back to the pool.
/// Without a runtime to run the rollback on, the connection is closed instead,
/// which makes SQLite discard the transaction.
fn discard(mut conn: PoolConnection<Sqlite>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                match sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    Ok(_) => tracing::debug!("Abandoned unit of work rolled back"),
                    Err(error) => {
                        tracing::warn!(%error, "Rollback of abandoned unit of work failed");
                        drop(conn.detach());
                    }
                }
            });
        }
        Err(_) => drop(conn.detach()),
    }
}

/// Transactional scope of a single logical operation.
///
/// Writes made through the stores are staged inside one database transaction
/// and become visible to other operations only once [`UnitOfWork::commit`]
/// succeeds. Dropping a unit of work without committing rolls everything back.
pub struct UnitOfWork {
    ctx: Arc<TxContext>,
    books: BookStore,
    borrowers: BorrowerStore,
    loans: LoanStore,
}

impl UnitOfWork {
    /// Open a transaction on `conn`. On failure the connection is left
    /// outside any transaction and simply returns to the pool.
    pub(crate) async fn begin(mut conn: PoolConnection<Sqlite>, mode: TxMode) -> AppResult<Self> {
        sqlx::query(mode.begin_sql()).execute(&mut *conn).await?;

        let ctx = Arc::new(TxContext {
            conn: Mutex::new(Some(conn)),
            affected: AtomicU64::new(0),
        });

        Ok(Self {
            books: BookStore::new(ctx.clone()),
            borrowers: BorrowerStore::new(ctx.clone()),
            loans: LoanStore::new(ctx.clone()),
            ctx,
        })
    }

    pub fn books(&self) -> &BookStore {
        &self.books
    }

    pub fn borrowers(&self) -> &BorrowerStore {
        &self.borrowers
    }

    pub fn loans(&self) -> &LoanStore {
        &self.loans
    }

    /// Rows touched by the writes staged so far
    pub fn staged_rows(&self) -> u64 {
        self.ctx.affected.load(Ordering::Relaxed)
    }

    /// Apply every staged change atomically, returning the number of affected rows
    pub async fn commit(self) -> AppResult<u64> {
        let (mut conn, affected) = self.finish()?;
        if let Err(err) = sqlx::query("COMMIT").execute(&mut *conn).await {
            // A failed COMMIT can leave the transaction open
            discard(conn);
            return Err(err.into());
        }
        tracing::debug!(affected, "Unit of work committed");
        Ok(affected)
    }

    /// Discard every staged change
    pub async fn rollback(self) -> AppResult<()> {
        let (mut conn, discarded) = self.finish()?;
        if let Err(err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            drop(conn.detach());
            return Err(err.into());
        }
        tracing::debug!(discarded, "Unit of work rolled back");
        Ok(())
    }

    fn finish(self) -> AppResult<(PoolConnection<Sqlite>, u64)> {
        let UnitOfWork {
            ctx,
            books,
            borrowers,
            loans,
        } = self;
        drop((books, borrowers, loans));

        let mut ctx = Arc::try_unwrap(ctx)
            .map_err(|_| AppError::Internal("unit of work still in use at commit".to_string()))?;
        let conn = ctx
            .conn
            .get_mut()
            .take()
            .ok_or_else(|| AppError::Internal("unit of work already finished".to_string()))?;
        Ok((conn, ctx.affected.load(Ordering::Relaxed)))
    }
}
