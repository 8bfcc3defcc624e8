//! Loan store

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};

use super::{unit_of_work::TxContext, EntityStore};
use crate::{
    error::AppResult,
    models::loan::{Loan, NewLoan},
};

/// Named lookups over loans
#[derive(Debug, Clone)]
pub enum LoanFilter {
    ByBook(i64),
    ByBorrower(i64),
    ActiveByBook(i64),
    ActiveByBorrower(i64),
    Active,
    /// Active loans whose due date is strictly before the given instant
    OverdueAt(DateTime<Utc>),
    /// Loans due in `[from, to)`
    DueBetween {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl LoanFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE ");
        match self {
            LoanFilter::ByBook(id) => {
                builder.push("book_id = ").push_bind(*id);
            }
            LoanFilter::ByBorrower(id) => {
                builder.push("borrower_id = ").push_bind(*id);
            }
            LoanFilter::ActiveByBook(id) => {
                builder
                    .push("book_id = ")
                    .push_bind(*id)
                    .push(" AND returned_at IS NULL");
            }
            LoanFilter::ActiveByBorrower(id) => {
                builder
                    .push("borrower_id = ")
                    .push_bind(*id)
                    .push(" AND returned_at IS NULL");
            }
            LoanFilter::Active => {
                builder.push("returned_at IS NULL");
            }
            LoanFilter::OverdueAt(now) => {
                builder
                    .push("returned_at IS NULL AND due_at < ")
                    .push_bind(*now);
            }
            LoanFilter::DueBetween { from, to } => {
                builder
                    .push("due_at >= ")
                    .push_bind(*from)
                    .push(" AND due_at < ")
                    .push_bind(*to);
            }
        }
    }
}

pub struct LoanStore {
    ctx: Arc<TxContext>,
}

impl LoanStore {
    pub(crate) fn new(ctx: Arc<TxContext>) -> Self {
        Self { ctx }
    }

    /// Close an active loan. Returns `false` when the loan is missing or already closed.
    pub async fn mark_returned(&self, id: i64, returned_at: DateTime<Utc>) -> AppResult<bool> {
        let mut tx = self.ctx.lock().await?;
        let rows = sqlx::query(
            "UPDATE loans SET returned_at = ? WHERE id = ? AND returned_at IS NULL",
        )
        .bind(returned_at)
        .bind(id)
        .execute(tx.conn())
        .await?
        .rows_affected();

        self.ctx.record(rows);
        Ok(rows == 1)
    }
}

#[async_trait]
impl EntityStore for LoanStore {
    type Entity = Loan;
    type New = NewLoan;
    type Filter = LoanFilter;

    async fn get_all(&self) -> AppResult<Vec<Loan>> {
        let mut tx = self.ctx.lock().await?;
        let loans = sqlx::query_as::<_, Loan>("SELECT * FROM loans ORDER BY id")
            .fetch_all(tx.conn())
            .await?;
        Ok(loans)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Loan>> {
        let mut tx = self.ctx.lock().await?;
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = ?")
            .bind(id)
            .fetch_optional(tx.conn())
            .await?;
        Ok(loan)
    }

    async fn add(&self, new: &NewLoan) -> AppResult<Loan> {
        let mut tx = self.ctx.lock().await?;
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (book_id, borrower_id, borrowed_at, due_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new.book_id)
        .bind(new.borrower_id)
        .bind(new.borrowed_at)
        .bind(new.due_at)
        .fetch_one(tx.conn())
        .await?;

        self.ctx.record(1);
        Ok(loan)
    }

    /// Book, borrower and borrow date never change once a loan exists;
    /// only the due and return dates are written back.
    async fn update(&self, loan: &Loan) -> AppResult<bool> {
        let mut tx = self.ctx.lock().await?;
        let rows = sqlx::query("UPDATE loans SET due_at = ?, returned_at = ? WHERE id = ?")
            .bind(loan.due_at)
            .bind(loan.returned_at)
            .bind(loan.id)
            .execute(tx.conn())
            .await?
            .rows_affected();

        self.ctx.record(rows);
        Ok(rows > 0)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.ctx.lock().await?;
        let rows = sqlx::query("DELETE FROM loans WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await?
            .rows_affected();

        self.ctx.record(rows);
        Ok(rows > 0)
    }

    async fn find(&self, filter: &LoanFilter) -> AppResult<Vec<Loan>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM loans");
        filter.push_where(&mut builder);
        builder.push(" ORDER BY id");

        let mut tx = self.ctx.lock().await?;
        let loans = builder
            .build_query_as::<Loan>()
            .fetch_all(tx.conn())
            .await?;
        Ok(loans)
    }

    async fn exists(&self, filter: &LoanFilter) -> AppResult<bool> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT EXISTS (SELECT 1 FROM loans");
        filter.push_where(&mut builder);
        builder.push(")");

        let mut tx = self.ctx.lock().await?;
        let row = builder.build().fetch_one(tx.conn()).await?;
        Ok(row.try_get::<i64, _>(0)? != 0)
    }
}
