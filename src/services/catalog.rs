//! Catalog management service

use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use super::guards;
use crate::{
    error::{AppError, AppResult, EntityKind},
    models::book::{normalize_isbn, Book, CreateBook, NewBook, UpdateBook},
    repository::{BookFilter, EntityStore, LoanFilter, Repository},
};

/// Book list query parameters; the first filter present wins
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Search in title
    pub title: Option<String>,
    /// Search by author
    pub author: Option<String>,
    /// Only books with a copy on the shelf
    pub available: Option<bool>,
}

impl BookQuery {
    fn filter(&self) -> Option<BookFilter> {
        if let Some(ref title) = self.title {
            Some(BookFilter::TitleContains(title.clone()))
        } else if let Some(ref author) = self.author {
            Some(BookFilter::AuthorContains(author.clone()))
        } else if self.available == Some(true) {
            Some(BookFilter::Available)
        } else {
            None
        }
    }
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let uow = self.repository.begin().await?;
        match query.filter() {
            Some(filter) => uow.books().find(&filter).await,
            None => uow.books().get_all().await,
        }
    }

    pub async fn get_book(&self, id: i64) -> AppResult<Book> {
        let uow = self.repository.begin().await?;
        uow.books()
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Book))
    }

    /// Register a new title; every copy starts on the shelf
    pub async fn create_book(&self, input: CreateBook) -> AppResult<Book> {
        input.validate()?;
        let isbn = normalize_isbn(&input.isbn)?;

        let uow = self.repository.begin_write().await?;
        guards::ensure_isbn_free(uow.books(), &isbn, None).await?;

        let book = uow
            .books()
            .add(&NewBook {
                title: input.title,
                author: input.author,
                isbn,
                quantity: input.quantity,
            })
            .await?;
        uow.commit().await?;

        tracing::info!(book_id = book.id, isbn = %book.isbn, "Book added to catalog");
        Ok(book)
    }

    /// Apply a partial update. A quantity change shifts `available` by the
    /// same delta and may not go below the copies currently on loan.
    pub async fn update_book(&self, id: i64, input: UpdateBook) -> AppResult<Book> {
        input.validate()?;

        let uow = self.repository.begin_write().await?;
        let mut book = uow
            .books()
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Book))?;

        if let Some(ref raw) = input.isbn {
            let isbn = normalize_isbn(raw)?;
            if isbn != book.isbn {
                guards::ensure_isbn_free(uow.books(), &isbn, Some(id)).await?;
                book.isbn = isbn;
            }
        }
        if let Some(title) = input.title {
            book.title = title;
        }
        if let Some(author) = input.author {
            book.author = author;
        }
        if let Some(quantity) = input.quantity {
            let on_loan = book.on_loan();
            if quantity < on_loan {
                return Err(AppError::Validation(format!(
                    "Quantity {} is below the {} copies currently on loan",
                    quantity, on_loan
                )));
            }
            book.quantity = quantity;
            book.available = quantity - on_loan;
        }

        if !uow.books().update(&book).await? {
            return Err(AppError::NotFound(EntityKind::Book));
        }
        let updated = uow
            .books()
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Book))?;
        uow.commit().await?;

        tracing::info!(book_id = id, quantity = updated.quantity, "Book updated");
        Ok(updated)
    }

    /// Delete a book. Refused while any loan, returned or not, references it.
    pub async fn delete_book(&self, id: i64) -> AppResult<()> {
        let uow = self.repository.begin_write().await?;
        if uow.books().get_by_id(id).await?.is_none() {
            return Err(AppError::NotFound(EntityKind::Book));
        }

        if uow.loans().exists(&LoanFilter::ByBook(id)).await? {
            return Err(AppError::BlockedDelete(format!(
                "book {} has loan history",
                id
            )));
        }

        uow.books().delete(id).await?;
        uow.commit().await?;

        tracing::info!(book_id = id, "Book removed from catalog");
        Ok(())
    }
}
