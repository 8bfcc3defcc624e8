//! Borrower endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::{
        borrower::{Borrower, CreateBorrower, UpdateBorrower},
        loan::LoanDetails,
    },
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BorrowerQuery {
    /// Search by name
    pub name: Option<String>,
}

/// List borrowers
#[utoipa::path(
    get,
    path = "/borrowers",
    tag = "borrowers",
    params(BorrowerQuery),
    responses(
        (status = 200, description = "List of borrowers", body = Vec<Borrower>)
    )
)]
pub async fn list_borrowers(
    State(state): State<crate::AppState>,
    Query(query): Query<BorrowerQuery>,
) -> AppResult<Json<Vec<Borrower>>> {
    let borrowers = state
        .services
        .borrowers
        .list_borrowers(query.name.as_deref())
        .await?;
    Ok(Json(borrowers))
}

/// Get borrower details by ID
#[utoipa::path(
    get,
    path = "/borrowers/{id}",
    tag = "borrowers",
    params(
        ("id" = i64, Path, description = "Borrower ID")
    ),
    responses(
        (status = 200, description = "Borrower details", body = Borrower),
        (status = 404, description = "Borrower not found")
    )
)]
pub async fn get_borrower(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Borrower>> {
    let borrower = state.services.borrowers.get_borrower(id).await?;
    Ok(Json(borrower))
}

/// Register a borrower
#[utoipa::path(
    post,
    path = "/borrowers",
    tag = "borrowers",
    request_body = CreateBorrower,
    responses(
        (status = 201, description = "Borrower created", body = Borrower),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Contact already in use")
    )
)]
pub async fn create_borrower(
    State(state): State<crate::AppState>,
    Json(borrower): Json<CreateBorrower>,
) -> AppResult<(StatusCode, Json<Borrower>)> {
    let created = state.services.borrowers.create_borrower(borrower).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a borrower
#[utoipa::path(
    put,
    path = "/borrowers/{id}",
    tag = "borrowers",
    params(
        ("id" = i64, Path, description = "Borrower ID")
    ),
    request_body = UpdateBorrower,
    responses(
        (status = 200, description = "Borrower updated", body = Borrower),
        (status = 404, description = "Borrower not found"),
        (status = 409, description = "Contact already in use")
    )
)]
pub async fn update_borrower(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
    Json(borrower): Json<UpdateBorrower>,
) -> AppResult<Json<Borrower>> {
    let updated = state.services.borrowers.update_borrower(id, borrower).await?;
    Ok(Json(updated))
}

/// Delete a borrower and their returned loans
#[utoipa::path(
    delete,
    path = "/borrowers/{id}",
    tag = "borrowers",
    params(
        ("id" = i64, Path, description = "Borrower ID")
    ),
    responses(
        (status = 204, description = "Borrower deleted"),
        (status = 404, description = "Borrower not found"),
        (status = 409, description = "Borrower has active loans")
    )
)]
pub async fn delete_borrower(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.borrowers.delete_borrower(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get every loan of a borrower
#[utoipa::path(
    get,
    path = "/borrowers/{id}/loans",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Borrower ID")
    ),
    responses(
        (status = 200, description = "Borrower's loans", body = Vec<LoanDetails>),
        (status = 404, description = "Borrower not found")
    )
)]
pub async fn get_borrower_loans(
    State(state): State<crate::AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.borrower_loans(id).await?;
    Ok(Json(loans))
}
