//! Borrow, return and overdue behaviour of the lending service

mod common;

use chrono::Duration;

use common::{t0, TestContext};
use libris_server::{
    error::EntityKind,
    models::{Book, BorrowCommand, LoanDetails, LoanStatus, ReturnCommand},
    AppError,
};

#[tokio::test]
async fn test_single_copy_lending_scenario() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000001", 1).await;
    let alice = ctx.borrower("Alice").await;
    let bob = ctx.borrower("Bob").await;

    let loan = ctx.borrow(&book, &alice, t0()).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.due_at, t0() + Duration::days(14));
    assert_eq!(ctx.reload(&book).await.available, 0);

    let err = ctx.borrow(&book, &bob, t0()).await.unwrap_err();
    assert!(matches!(err, AppError::OutOfStock { book_id } if book_id == book.id));

    ctx.clock.set(t0() + Duration::days(15));
    let overdue = ctx.services.loans.overdue().await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, loan.id);
    assert!(overdue[0].is_overdue);

    let returned = ctx
        .services
        .loans
        .return_loan(ReturnCommand {
            loan_id: loan.id,
            returned_at: t0() + Duration::days(15),
        })
        .await
        .unwrap();
    assert_eq!(returned.status, LoanStatus::Returned);
    assert!(!returned.is_overdue);
    assert_eq!(ctx.reload(&book).await.available, 1);

    assert!(ctx.services.loans.overdue().await.unwrap().is_empty());
    ctx.assert_inventory_consistent().await;
}

#[tokio::test]
async fn test_out_of_stock_leaves_state_untouched() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000002", 1).await;
    let alice = ctx.borrower("Alice").await;
    let bob = ctx.borrower("Bob").await;

    ctx.borrow(&book, &alice, t0()).await.unwrap();
    let before = ctx.reload(&book).await;

    let err = ctx.borrow(&book, &bob, t0()).await.unwrap_err();
    assert!(matches!(err, AppError::OutOfStock { .. }));

    assert_eq!(ctx.reload(&book).await, before);
    let bob_loans = ctx.services.loans.borrower_loans(bob.id).await.unwrap();
    assert!(bob_loans.is_empty());
    assert_eq!(ctx.services.loans.list_loans().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_return_twice_is_rejected() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000003", 2).await;
    let alice = ctx.borrower("Alice").await;
    let loan = ctx.borrow(&book, &alice, t0()).await.unwrap();

    let command = ReturnCommand {
        loan_id: loan.id,
        returned_at: t0() + Duration::days(3),
    };
    ctx.services.loans.return_loan(command.clone()).await.unwrap();

    let err = ctx.services.loans.return_loan(command).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyReturned { loan_id } if loan_id == loan.id));
    assert_eq!(ctx.reload(&book).await.available, 2);
    ctx.assert_inventory_consistent().await;
}

#[tokio::test]
async fn test_borrow_then_return_restores_availability() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000004", 3).await;
    let alice = ctx.borrower("Alice").await;
    let bob = ctx.borrower("Bob").await;

    let first = ctx.borrow(&book, &alice, t0()).await.unwrap();
    let second = ctx.borrow(&book, &bob, t0()).await.unwrap();
    assert_eq!(ctx.reload(&book).await.available, 1);
    ctx.assert_inventory_consistent().await;

    for loan in [first, second] {
        ctx.services
            .loans
            .return_loan(ReturnCommand {
                loan_id: loan.id,
                returned_at: t0() + Duration::days(1),
            })
            .await
            .unwrap();
    }

    let book = ctx.reload(&book).await;
    assert_eq!(book.available, book.quantity);
    ctx.assert_inventory_consistent().await;
}

#[tokio::test]
async fn test_overdue_boundaries() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000005", 4).await;
    let alice = ctx.borrower("Alice").await;

    let early_return = ctx.borrow(&book, &alice, t0()).await.unwrap();
    let late_return = ctx.borrow(&book, &alice, t0()).await.unwrap();
    let still_out = ctx.borrow(&book, &alice, t0()).await.unwrap();

    // Returned before the due date
    ctx.services
        .loans
        .return_loan(ReturnCommand {
            loan_id: early_return.id,
            returned_at: t0() + Duration::days(2),
        })
        .await
        .unwrap();
    // Returned after the due date: late, but no longer overdue
    ctx.services
        .loans
        .return_loan(ReturnCommand {
            loan_id: late_return.id,
            returned_at: t0() + Duration::days(20),
        })
        .await
        .unwrap();

    // Exactly at the due date nothing is overdue yet
    ctx.clock.set(still_out.due_at);
    assert!(ctx.services.loans.overdue().await.unwrap().is_empty());

    ctx.clock.advance(Duration::seconds(1));
    let overdue = ctx.services.loans.overdue().await.unwrap();
    let ids: Vec<i64> = overdue.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![still_out.id]);
}

#[tokio::test]
async fn test_missing_records_report_their_kind() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000006", 1).await;
    let alice = ctx.borrower("Alice").await;

    let err = ctx
        .services
        .loans
        .borrow(BorrowCommand {
            book_id: 999,
            borrower_id: alice.id,
            borrowed_at: t0(),
            due_at: t0() + Duration::days(1),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(EntityKind::Book)));

    let err = ctx
        .services
        .loans
        .borrow(BorrowCommand {
            book_id: book.id,
            borrower_id: 999,
            borrowed_at: t0(),
            due_at: t0() + Duration::days(1),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(EntityKind::Borrower)));
    assert_eq!(ctx.reload(&book).await.available, 1);

    let err = ctx
        .services
        .loans
        .return_loan(ReturnCommand {
            loan_id: 999,
            returned_at: t0(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(EntityKind::Loan)));

    let err = ctx.services.loans.borrower_loans(999).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(EntityKind::Borrower)));
}

#[tokio::test]
async fn test_return_before_borrow_date_is_rejected() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000007", 1).await;
    let alice = ctx.borrower("Alice").await;
    let loan = ctx.borrow(&book, &alice, t0()).await.unwrap();

    let err = ctx
        .services
        .loans
        .return_loan(ReturnCommand {
            loan_id: loan.id,
            returned_at: t0() - Duration::hours(1),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let loan = ctx.services.loans.get_loan(loan.id).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(ctx.reload(&book).await.available, 0);
}

#[tokio::test]
async fn test_borrower_loans_include_returned_history() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000008", 2).await;
    let alice = ctx.borrower("Alice").await;
    let bob = ctx.borrower("Bob").await;

    let first = ctx.borrow(&book, &alice, t0()).await.unwrap();
    ctx.borrow(&book, &bob, t0()).await.unwrap();
    ctx.services
        .loans
        .return_loan(ReturnCommand {
            loan_id: first.id,
            returned_at: t0() + Duration::days(1),
        })
        .await
        .unwrap();
    ctx.borrow(&book, &alice, t0() + Duration::days(2)).await.unwrap();

    let loans = ctx.services.loans.borrower_loans(alice.id).await.unwrap();
    assert_eq!(loans.len(), 2);
    assert_eq!(loans[0].status, LoanStatus::Returned);
    assert_eq!(loans[1].status, LoanStatus::Active);
    assert!(loans.iter().all(|l| l.borrower_id == alice.id));
    assert_eq!(
        loans[0].borrower.as_ref().map(|b| b.name.as_str()),
        Some("Alice")
    );
}

/// Spawn one borrow per borrower against `book`, all at once
async fn borrow_in_parallel(
    ctx: &TestContext,
    book: &Book,
    readers: usize,
) -> Vec<libris_server::AppResult<LoanDetails>> {
    let mut borrowers = Vec::new();
    for i in 0..readers {
        borrowers.push(ctx.borrower(&format!("Reader{}", i)).await);
    }

    let mut handles = Vec::new();
    for borrower in borrowers {
        let loans = ctx.services.loans.clone();
        let book_id = book.id;
        handles.push(tokio::spawn(async move {
            loans
                .borrow(BorrowCommand {
                    book_id,
                    borrower_id: borrower.id,
                    borrowed_at: t0(),
                    due_at: t0() + Duration::days(14),
                })
                .await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_never_oversell() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000009", 3).await;

    let results = borrow_in_parallel(&ctx, &book, 10).await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 3);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(
            matches!(result, Err(AppError::OutOfStock { .. })),
            "unexpected outcome: {result:?}"
        );
    }

    assert_eq!(ctx.reload(&book).await.available, 0);
    ctx.assert_inventory_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_with_ample_stock_all_succeed() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000019", 10).await;

    let results = borrow_in_parallel(&ctx, &book, 10).await;

    for result in &results {
        assert!(result.is_ok(), "unexpected outcome: {result:?}");
    }
    assert_eq!(ctx.reload(&book).await.available, 0);
    ctx.assert_inventory_consistent().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_returns_close_a_loan_once() {
    let ctx = TestContext::new().await;
    let book = ctx.book("9780000000018", 2).await;
    let alice = ctx.borrower("Alice").await;
    let loan = ctx.borrow(&book, &alice, t0()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..6 {
        let loans = ctx.services.loans.clone();
        let loan_id = loan.id;
        handles.push(tokio::spawn(async move {
            loans
                .return_loan(ReturnCommand {
                    loan_id,
                    returned_at: t0() + Duration::days(1),
                })
                .await
        }));
    }

    let mut returned = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => returned += 1,
            Err(AppError::AlreadyReturned { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(returned, 1);
    assert_eq!(ctx.reload(&book).await.available, 2);
    ctx.assert_inventory_consistent().await;
}
