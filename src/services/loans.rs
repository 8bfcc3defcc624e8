//! Loan management service

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    clock::Clock,
    config::LoanPolicyConfig,
    error::{AppError, AppResult, EntityKind},
    models::{
        book::BookShort,
        borrower::Borrower,
        loan::{normalize_timestamp, BorrowCommand, Loan, LoanDetails, NewLoan, ReturnCommand},
    },
    repository::{EntityStore, LoanFilter, Repository, UnitOfWork},
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    default_duration: Duration,
}

impl LoansService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, policy: &LoanPolicyConfig) -> Self {
        Self {
            repository,
            clock,
            default_duration: Duration::days(policy.default_duration_days),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Due date applied when a borrow request does not name one
    pub fn default_due_date(&self, borrowed_at: DateTime<Utc>) -> DateTime<Utc> {
        borrowed_at + self.default_duration
    }

    /// Lend one copy of a book.
    ///
    /// The availability decrement and the loan insert are staged in the same
    /// unit of work; neither is visible without the other.
    pub async fn borrow(&self, command: BorrowCommand) -> AppResult<LoanDetails> {
        let borrowed_at = normalize_timestamp(command.borrowed_at);
        let due_at = normalize_timestamp(command.due_at);
        if due_at <= borrowed_at {
            return Err(AppError::Validation(
                "Due date must be after the borrow date".to_string(),
            ));
        }

        let uow = self.repository.begin_write().await?;
        let book = uow
            .books()
            .get_by_id(command.book_id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Book))?;
        let borrower = uow
            .borrowers()
            .get_by_id(command.borrower_id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Borrower))?;

        if book.available <= 0 {
            return Err(AppError::OutOfStock { book_id: book.id });
        }

        // Conditional decrement keeps the counter in bounds even against a stale read
        if !uow.books().take_copy(book.id).await? {
            return Err(AppError::OutOfStock { book_id: book.id });
        }
        let loan = uow
            .loans()
            .add(&NewLoan {
                book_id: book.id,
                borrower_id: borrower.id,
                borrowed_at,
                due_at,
            })
            .await?;
        uow.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            book_id = book.id,
            borrower_id = borrower.id,
            due_at = %loan.due_at,
            "Book borrowed"
        );

        Ok(LoanDetails::new(
            &loan,
            Some(BookShort::from(&book)),
            Some(borrower),
            self.clock.now(),
        ))
    }

    /// Close a loan and put its copy back on the shelf
    pub async fn return_loan(&self, command: ReturnCommand) -> AppResult<LoanDetails> {
        let returned_at = normalize_timestamp(command.returned_at);

        let uow = self.repository.begin_write().await?;
        let mut loan = uow
            .loans()
            .get_by_id(command.loan_id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Loan))?;

        if !loan.is_active() {
            return Err(AppError::AlreadyReturned { loan_id: loan.id });
        }
        if returned_at < loan.borrowed_at {
            return Err(AppError::Validation(
                "Return date cannot precede the borrow date".to_string(),
            ));
        }

        if !uow.loans().mark_returned(loan.id, returned_at).await? {
            return Err(AppError::AlreadyReturned { loan_id: loan.id });
        }
        loan.returned_at = Some(returned_at);

        let book = uow.books().get_by_id(loan.book_id).await?;
        match book {
            Some(ref book) => {
                if !uow.books().return_copy(book.id).await? {
                    tracing::warn!(
                        book_id = book.id,
                        "Returned copy found the shelf already full"
                    );
                }
            }
            None => {
                tracing::warn!(
                    loan_id = loan.id,
                    book_id = loan.book_id,
                    "Book of returned loan no longer exists"
                );
            }
        }

        let borrower = uow.borrowers().get_by_id(loan.borrower_id).await?;
        uow.commit().await?;

        tracing::info!(loan_id = loan.id, book_id = loan.book_id, "Book returned");

        Ok(LoanDetails::new(
            &loan,
            book.as_ref().map(BookShort::from),
            borrower,
            self.clock.now(),
        ))
    }

    /// Active loans past their due date, all judged against one reading of the clock
    pub async fn overdue(&self) -> AppResult<Vec<LoanDetails>> {
        let now = normalize_timestamp(self.clock.now());
        let uow = self.repository.begin().await?;
        let loans = uow.loans().find(&LoanFilter::OverdueAt(now)).await?;
        with_details(&uow, loans, now).await
    }

    pub async fn list_loans(&self) -> AppResult<Vec<LoanDetails>> {
        let now = self.clock.now();
        let uow = self.repository.begin().await?;
        let loans = uow.loans().get_all().await?;
        with_details(&uow, loans, now).await
    }

    pub async fn get_loan(&self, id: i64) -> AppResult<LoanDetails> {
        let now = self.clock.now();
        let uow = self.repository.begin().await?;
        let loan = uow
            .loans()
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Loan))?;

        let mut details = with_details(&uow, vec![loan], now).await?;
        details
            .pop()
            .ok_or_else(|| AppError::Internal("loan details lost".to_string()))
    }

    /// Every loan of a borrower, active ones included
    pub async fn borrower_loans(&self, borrower_id: i64) -> AppResult<Vec<LoanDetails>> {
        let now = self.clock.now();
        let uow = self.repository.begin().await?;
        if uow.borrowers().get_by_id(borrower_id).await?.is_none() {
            return Err(AppError::NotFound(EntityKind::Borrower));
        }

        let loans = uow.loans().find(&LoanFilter::ByBorrower(borrower_id)).await?;
        with_details(&uow, loans, now).await
    }
}

/// Attach book and borrower to each loan, fetching each record once
async fn with_details(
    uow: &UnitOfWork,
    loans: Vec<Loan>,
    now: DateTime<Utc>,
) -> AppResult<Vec<LoanDetails>> {
    let mut books: HashMap<i64, Option<BookShort>> = HashMap::new();
    let mut borrowers: HashMap<i64, Option<Borrower>> = HashMap::new();
    let mut details = Vec::with_capacity(loans.len());

    for loan in &loans {
        if !books.contains_key(&loan.book_id) {
            let book = uow.books().get_by_id(loan.book_id).await?;
            books.insert(loan.book_id, book.as_ref().map(BookShort::from));
        }
        if !borrowers.contains_key(&loan.borrower_id) {
            let borrower = uow.borrowers().get_by_id(loan.borrower_id).await?;
            borrowers.insert(loan.borrower_id, borrower);
        }

        details.push(LoanDetails::new(
            loan,
            books.get(&loan.book_id).cloned().flatten(),
            borrowers.get(&loan.borrower_id).cloned().flatten(),
            now,
        ));
    }

    Ok(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::MockClock,
        config::DatabaseConfig,
        models::{book::NewBook, borrower::NewBorrower},
    };
    use chrono::TimeZone;

    async fn repository(dir: &tempfile::TempDir) -> Repository {
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("loans.db").display()),
            ..DatabaseConfig::default()
        };
        let repository = Repository::connect(&config).await.unwrap();
        repository.migrate().await.unwrap();
        repository
    }

    #[tokio::test]
    async fn test_overdue_reads_clock_once() {
        let dir = tempfile::tempdir().unwrap();
        let repository = repository(&dir).await;
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        let uow = repository.begin_write().await.unwrap();
        let book = uow
            .books()
            .add(&NewBook {
                title: "Les Misérables".into(),
                author: "Victor Hugo".into(),
                isbn: "9782253096344".into(),
                quantity: 3,
            })
            .await
            .unwrap();
        let borrower = uow
            .borrowers()
            .add(&NewBorrower {
                name: "Jean".into(),
                contact_info: "jean@example.org".into(),
            })
            .await
            .unwrap();
        for days in [1, 2, 30] {
            uow.loans()
                .add(&NewLoan {
                    book_id: book.id,
                    borrower_id: borrower.id,
                    borrowed_at: t0,
                    due_at: t0 + Duration::days(days),
                })
                .await
                .unwrap();
        }
        uow.commit().await.unwrap();

        let mut clock = MockClock::new();
        clock
            .expect_now()
            .times(1)
            .return_const(t0 + Duration::days(10));
        let service = LoansService::new(
            repository,
            Arc::new(clock),
            &LoanPolicyConfig::default(),
        );

        let overdue = service.overdue().await.unwrap();
        assert_eq!(overdue.len(), 2);
        assert!(overdue.iter().all(|l| l.is_overdue));
        assert_eq!(
            overdue[0].book.as_ref().map(|b| b.title.as_str()),
            Some("Les Misérables")
        );
    }

    #[tokio::test]
    async fn test_borrow_rejects_due_date_before_borrow_date() {
        let dir = tempfile::tempdir().unwrap();
        let repository = repository(&dir).await;
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        let mut clock = MockClock::new();
        clock.expect_now().never();
        let service = LoansService::new(repository, Arc::new(clock), &LoanPolicyConfig::default());

        let err = service
            .borrow(BorrowCommand {
                book_id: 1,
                borrower_id: 1,
                borrowed_at: t0,
                due_at: t0 - Duration::days(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
