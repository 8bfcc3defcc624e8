//! Book (catalog item) model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Full book model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: String,
    /// Copies owned by the library
    pub quantity: i32,
    /// Copies not tied to an active loan
    pub available: i32,
    /// Bumped on every write, used to detect concurrent modification
    pub version: i64,
}

impl Book {
    /// Copies currently on loan
    pub fn on_loan(&self) -> i32 {
        self.quantity - self.available
    }
}

/// Short book representation attached to loans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub isbn: String,
}

impl From<&Book> for BookShort {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
        }
    }
}

/// Insert payload; `available` starts equal to `quantity`
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub quantity: i32,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 200, message = "Author must be 1 to 200 characters"))]
    pub author: String,
    /// ISBN-10 or ISBN-13, hyphens and spaces allowed
    pub isbn: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Update book request, absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Author must be 1 to 200 characters"))]
    pub author: Option<String>,
    pub isbn: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,
}

/// Strip separators from an ISBN and check its shape.
///
/// Accepts 10 or 13 characters once hyphens and spaces are removed; only the
/// last character of an ISBN-10 may be `X`.
pub fn normalize_isbn(raw: &str) -> AppResult<String> {
    let isbn: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let well_formed = match isbn.len() {
        10 => {
            let (body, check) = isbn.split_at(9);
            body.chars().all(|c| c.is_ascii_digit())
                && check.chars().all(|c| c.is_ascii_digit() || c == 'X')
        }
        13 => isbn.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    };

    if well_formed {
        Ok(isbn)
    } else {
        Err(AppError::Validation(format!(
            "ISBN must have 10 or 13 characters, got '{}'",
            raw
        )))
    }
}
