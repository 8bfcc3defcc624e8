//! Loan (borrow) model and related types

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::BookShort;
use super::borrower::Borrower;

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i64,
    pub book_id: i64,
    pub borrower_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Returned,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn status(&self) -> LoanStatus {
        if self.is_active() {
            LoanStatus::Active
        } else {
            LoanStatus::Returned
        }
    }

    /// Active and past its due date at `now`
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.returned_at.is_none() && now > self.due_at
    }
}

/// Insert payload for a fresh, active loan
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: i64,
    pub borrower_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

/// Borrow command handed to the lending service
#[derive(Debug, Clone)]
pub struct BorrowCommand {
    pub book_id: i64,
    pub borrower_id: i64,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

/// Return command handed to the lending service
#[derive(Debug, Clone)]
pub struct ReturnCommand {
    pub loan_id: i64,
    pub returned_at: DateTime<Utc>,
}

/// Loan with book and borrower attached, for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i64,
    pub book_id: i64,
    pub borrower_id: i64,
    /// None when the book record no longer exists
    pub book: Option<BookShort>,
    pub borrower: Option<Borrower>,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub is_overdue: bool,
}

impl LoanDetails {
    pub fn new(
        loan: &Loan,
        book: Option<BookShort>,
        borrower: Option<Borrower>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: loan.id,
            book_id: loan.book_id,
            borrower_id: loan.borrower_id,
            book,
            borrower,
            borrowed_at: loan.borrowed_at,
            due_at: loan.due_at,
            returned_at: loan.returned_at,
            status: loan.status(),
            is_overdue: loan.is_overdue_at(now),
        }
    }
}

/// Canonical stored form of a timestamp: UTC, microsecond precision
pub fn normalize_timestamp(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}
