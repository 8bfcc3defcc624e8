//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use libris_server::{
    clock::FixedClock,
    config::{AppConfig, DatabaseConfig},
    models::{Book, Borrower, BorrowCommand, CreateBook, CreateBorrower, LoanDetails},
    repository::{EntityStore, LoanFilter, Repository},
    services::Services,
    AppState,
};

pub struct TestContext {
    pub repository: Repository,
    pub services: Services,
    pub clock: Arc<FixedClock>,
    pub config: AppConfig,
    _dir: TempDir,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
}

impl TestContext {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = AppConfig {
            database: DatabaseConfig {
                url: format!("sqlite://{}", dir.path().join("libris.db").display()),
                max_connections: 8,
                ..DatabaseConfig::default()
            },
            ..AppConfig::default()
        };

        let repository = Repository::connect(&config.database)
            .await
            .expect("connect");
        repository.migrate().await.expect("migrate");

        let clock = Arc::new(FixedClock::new(t0()));
        let services = Services::new(repository.clone(), clock.clone(), &config.loans);

        Self {
            repository,
            services,
            clock,
            config,
            _dir: dir,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            services: Arc::new(self.services.clone()),
            repository: self.repository.clone(),
        }
    }

    pub async fn book(&self, isbn: &str, quantity: i32) -> Book {
        self.services
            .catalog
            .create_book(CreateBook {
                title: format!("Title {}", isbn),
                author: "Author".to_string(),
                isbn: isbn.to_string(),
                quantity,
            })
            .await
            .expect("create book")
    }

    pub async fn borrower(&self, name: &str) -> Borrower {
        self.services
            .borrowers
            .create_borrower(CreateBorrower {
                name: name.to_string(),
                contact_info: format!("{}@example.org", name.to_lowercase()),
            })
            .await
            .expect("create borrower")
    }

    pub async fn borrow(
        &self,
        book: &Book,
        borrower: &Borrower,
        at: DateTime<Utc>,
    ) -> libris_server::AppResult<LoanDetails> {
        self.services
            .loans
            .borrow(BorrowCommand {
                book_id: book.id,
                borrower_id: borrower.id,
                borrowed_at: at,
                due_at: at + Duration::days(14),
            })
            .await
    }

    pub async fn reload(&self, book: &Book) -> Book {
        self.services
            .catalog
            .get_book(book.id)
            .await
            .expect("reload book")
    }

    /// `available = quantity - active loans` for every book, and both within bounds
    pub async fn assert_inventory_consistent(&self) {
        let uow = self.repository.begin().await.expect("begin");
        for book in uow.books().get_all().await.expect("books") {
            let active = uow
                .loans()
                .find(&LoanFilter::ActiveByBook(book.id))
                .await
                .expect("active loans")
                .len() as i32;
            assert!(book.available >= 0, "negative availability: {:?}", book);
            assert!(book.available <= book.quantity, "over-full shelf: {:?}", book);
            assert_eq!(
                book.available,
                book.quantity - active,
                "availability drifted from active loans: {:?}",
                book
            );
        }
    }
}
