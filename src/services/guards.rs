//! Uniqueness guards run before inserts and updates

use crate::{
    error::{AppError, AppResult},
    repository::{BookFilter, BookStore, BorrowerFilter, BorrowerStore, EntityStore},
};

/// Fail with a conflict if another book already carries `isbn`
pub async fn ensure_isbn_free(
    books: &BookStore,
    isbn: &str,
    excluding: Option<i64>,
) -> AppResult<()> {
    let filter = BookFilter::Isbn {
        isbn: isbn.to_string(),
        excluding,
    };
    if books.exists(&filter).await? {
        return Err(AppError::Conflict {
            field: "isbn",
            value: isbn.to_string(),
        });
    }
    Ok(())
}

/// Fail with a conflict if another borrower already uses `contact_info`
pub async fn ensure_contact_free(
    borrowers: &BorrowerStore,
    contact_info: &str,
    excluding: Option<i64>,
) -> AppResult<()> {
    let filter = BorrowerFilter::ContactInfo {
        contact_info: contact_info.to_string(),
        excluding,
    };
    if borrowers.exists(&filter).await? {
        return Err(AppError::Conflict {
            field: "contact_info",
            value: contact_info.to_string(),
        });
    }
    Ok(())
}
