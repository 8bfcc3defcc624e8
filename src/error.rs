//! Error types for Libris server

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Entity kinds handled by the lending engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Book,
    Borrower,
    Loan,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Book => "Book",
            EntityKind::Borrower => "Borrower",
            EntityKind::Loan => "Loan",
        };
        f.write_str(name)
    }
}

/// Numeric error codes carried in every error response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    DbFailure = 2,
    NoSuchBook = 3,
    NoSuchBorrower = 4,
    NoSuchLoan = 5,
    Duplicate = 6,
    OutOfStock = 7,
    AlreadyReturned = 8,
    DeleteBlocked = 9,
    BadValue = 10,
    StaleRecord = 11,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(EntityKind),

    #[error("Conflict: {field} '{value}' is already in use")]
    Conflict { field: &'static str, value: String },

    #[error("Book {book_id} has no copies available")]
    OutOfStock { book_id: i64 },

    #[error("Loan {loan_id} has already been returned")]
    AlreadyReturned { loan_id: i64 },

    #[error("Delete refused: {0}")]
    BlockedDelete(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} was modified concurrently, reload and retry")]
    StaleRecord(EntityKind),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NotFound(EntityKind::Book) => ErrorCode::NoSuchBook,
            AppError::NotFound(EntityKind::Borrower) => ErrorCode::NoSuchBorrower,
            AppError::NotFound(EntityKind::Loan) => ErrorCode::NoSuchLoan,
            AppError::Conflict { .. } => ErrorCode::Duplicate,
            AppError::OutOfStock { .. } => ErrorCode::OutOfStock,
            AppError::AlreadyReturned { .. } => ErrorCode::AlreadyReturned,
            AppError::BlockedDelete(_) => ErrorCode::DeleteBlocked,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::StaleRecord(_) => ErrorCode::StaleRecord,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. }
            | AppError::OutOfStock { .. }
            | AppError::AlreadyReturned { .. }
            | AppError::BlockedDelete(_)
            | AppError::StaleRecord(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (self.status(), body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
