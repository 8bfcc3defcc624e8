//! Loan management endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::loan::{BorrowCommand, LoanDetails, ReturnCommand},
};

/// Borrow request
#[derive(Deserialize, ToSchema)]
pub struct BorrowRequest {
    /// Book ID
    pub book_id: i64,
    /// Borrower ID
    pub borrower_id: i64,
    /// Borrow date (defaults to now)
    pub borrowed_at: Option<DateTime<Utc>>,
    /// Due date (defaults to the configured loan duration after the borrow date)
    pub due_at: Option<DateTime<Utc>>,
}

/// Return request
#[derive(Debug, Deserialize, ToSchema, Default)]
pub struct ReturnRequest {
    /// Return date (defaults to now)
    pub returned_at: Option<DateTime<Utc>>,
}

impl ReturnRequest {
    /// An empty body means "return now"; anything else must be a well-formed request
    fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Invalid return request: {}", e)))
    }
}

/// Return response with loan details
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    /// Loan details
    pub loan: LoanDetails,
}

/// List every loan
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    responses(
        (status = 200, description = "All loans", body = Vec<LoanDetails>)
    )
)]
pub async fn list_loans(State(state): State<crate::AppState>) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.list_loans().await?;
    Ok(Json(loans))
}

/// Get loan details by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(loan))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans/borrow",
    tag = "loans",
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Loan created", body = LoanDetails),
        (status = 400, description = "Invalid dates"),
        (status = 404, description = "Book or borrower not found"),
        (status = 409, description = "No copy available")
    )
)]
pub async fn borrow(
    State(state): State<crate::AppState>,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    let loans = &state.services.loans;
    let borrowed_at = request.borrowed_at.unwrap_or_else(|| loans.now());
    let due_at = request
        .due_at
        .unwrap_or_else(|| loans.default_due_date(borrowed_at));

    let loan = loans
        .borrow(BorrowCommand {
            book_id: request.book_id,
            borrower_id: request.borrower_id,
            borrowed_at,
            due_at,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Loan ID")
    ),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 400, description = "Malformed request or return date before the borrow date"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    Path(loan_id): Path<i64>,
    body: Bytes,
) -> AppResult<Json<ReturnResponse>> {
    let request = ReturnRequest::from_body(&body)?;
    let loans = &state.services.loans;
    let returned_at = request.returned_at.unwrap_or_else(|| loans.now());

    let loan = loans
        .return_loan(ReturnCommand {
            loan_id,
            returned_at,
        })
        .await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        loan,
    }))
}

/// List overdue loans
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Active loans past their due date", body = Vec<LoanDetails>)
    )
)]
pub async fn overdue_loans(
    State(state): State<crate::AppState>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.overdue().await?;
    Ok(Json(loans))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_return_body_means_now() {
        assert!(ReturnRequest::from_body(b"").unwrap().returned_at.is_none());
        assert!(ReturnRequest::from_body(b" \n").unwrap().returned_at.is_none());
        assert!(ReturnRequest::from_body(b"{}").unwrap().returned_at.is_none());
    }

    #[test]
    fn test_malformed_return_body_is_rejected() {
        let err = ReturnRequest::from_body(br#"{"returned_at":"not-a-date"}"#).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(matches!(
            ReturnRequest::from_body(b"{returned_at").unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn test_return_body_with_date() {
        let request =
            ReturnRequest::from_body(br#"{"returned_at":"2024-01-20T08:30:00Z"}"#).unwrap();
        assert_eq!(
            request.returned_at.map(|d| d.to_rfc3339()),
            Some("2024-01-20T08:30:00+00:00".to_string())
        );
    }
}
