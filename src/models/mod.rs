//! Data models for Libris

pub mod book;
pub mod borrower;
pub mod loan;

// Re-export commonly used types
pub use book::{Book, BookShort, CreateBook, NewBook, UpdateBook};
pub use borrower::{Borrower, CreateBorrower, NewBorrower, UpdateBorrower};
pub use loan::{BorrowCommand, Loan, LoanDetails, LoanStatus, NewLoan, ReturnCommand};
