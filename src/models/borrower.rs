//! Borrower model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Borrower model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrower {
    pub id: i64,
    pub name: String,
    /// Contact email, unique across borrowers
    pub contact_info: String,
}

#[derive(Debug, Clone)]
pub struct NewBorrower {
    pub name: String,
    pub contact_info: String,
}

/// Create borrower request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBorrower {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,
    #[validate(
        email(message = "Invalid email format"),
        length(max = 150, message = "Contact cannot exceed 150 characters")
    )]
    pub contact_info: String,
}

/// Update borrower request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBorrower {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: Option<String>,
    #[validate(
        email(message = "Invalid email format"),
        length(max = 150, message = "Contact cannot exceed 150 characters")
    )]
    pub contact_info: Option<String>,
}

/// Canonical form used for storage and duplicate detection
pub fn normalize_contact(raw: &str) -> String {
    raw.trim().to_lowercase()
}
