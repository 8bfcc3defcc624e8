//! Book store

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::{unique_violation, unit_of_work::TxContext, EntityStore};
use crate::{
    error::{AppError, AppResult, EntityKind},
    models::book::{Book, NewBook},
};

/// Named lookups over books
#[derive(Debug, Clone)]
pub enum BookFilter {
    /// Exact ISBN, optionally ignoring one book (the one being updated)
    Isbn { isbn: String, excluding: Option<i64> },
    TitleContains(String),
    AuthorContains(String),
    /// At least one copy on the shelf
    Available,
}

impl BookFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE ");
        match self {
            BookFilter::Isbn { isbn, excluding } => {
                builder.push("isbn = ").push_bind(isbn.clone());
                if let Some(id) = excluding {
                    builder.push(" AND id <> ").push_bind(*id);
                }
            }
            BookFilter::TitleContains(text) => {
                builder.push("title LIKE ").push_bind(format!("%{}%", text));
            }
            BookFilter::AuthorContains(text) => {
                builder.push("author LIKE ").push_bind(format!("%{}%", text));
            }
            BookFilter::Available => {
                builder.push("available > 0");
            }
        }
    }
}

pub struct BookStore {
    ctx: Arc<TxContext>,
}

impl BookStore {
    pub(crate) fn new(ctx: Arc<TxContext>) -> Self {
        Self { ctx }
    }

    /// Take one copy off the shelf. Returns `false` when none is left.
    pub async fn take_copy(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.ctx.lock().await?;
        let rows = sqlx::query(
            "UPDATE books SET available = available - 1, version = version + 1 \
             WHERE id = ? AND available > 0",
        )
        .bind(id)
        .execute(tx.conn())
        .await?
        .rows_affected();

        self.ctx.record(rows);
        Ok(rows == 1)
    }

    /// Put one copy back. Returns `false` when the book is missing or already full.
    pub async fn return_copy(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.ctx.lock().await?;
        let rows = sqlx::query(
            "UPDATE books SET available = available + 1, version = version + 1 \
             WHERE id = ? AND available < quantity",
        )
        .bind(id)
        .execute(tx.conn())
        .await?
        .rows_affected();

        self.ctx.record(rows);
        Ok(rows == 1)
    }
}

#[async_trait]
impl EntityStore for BookStore {
    type Entity = Book;
    type New = NewBook;
    type Filter = BookFilter;

    async fn get_all(&self) -> AppResult<Vec<Book>> {
        let mut tx = self.ctx.lock().await?;
        let books = sqlx::query_as::<_, Book>("SELECT * FROM books ORDER BY id")
            .fetch_all(tx.conn())
            .await?;
        Ok(books)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Book>> {
        let mut tx = self.ctx.lock().await?;
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(tx.conn())
            .await?;
        Ok(book)
    }

    async fn add(&self, new: &NewBook) -> AppResult<Book> {
        let mut tx = self.ctx.lock().await?;
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, quantity, available)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&new.title)
        .bind(&new.author)
        .bind(&new.isbn)
        .bind(new.quantity)
        .bind(new.quantity)
        .fetch_one(tx.conn())
        .await
        .map_err(|e| unique_violation(e, "isbn", &new.isbn))?;

        self.ctx.record(1);
        Ok(book)
    }

    /// Overwrite the book, provided nobody changed it since `book.version` was read
    async fn update(&self, book: &Book) -> AppResult<bool> {
        let mut tx = self.ctx.lock().await?;
        let rows = sqlx::query(
            r#"
            UPDATE books
            SET title = ?, author = ?, isbn = ?, quantity = ?, available = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.quantity)
        .bind(book.available)
        .bind(book.id)
        .bind(book.version)
        .execute(tx.conn())
        .await
        .map_err(|e| unique_violation(e, "isbn", &book.isbn))?
        .rows_affected();

        if rows == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE id = ?")
                .bind(book.id)
                .fetch_one(tx.conn())
                .await?;
            if exists > 0 {
                return Err(AppError::StaleRecord(EntityKind::Book));
            }
            return Ok(false);
        }

        self.ctx.record(rows);
        Ok(true)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.ctx.lock().await?;
        let rows = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await?
            .rows_affected();

        self.ctx.record(rows);
        Ok(rows > 0)
    }

    async fn find(&self, filter: &BookFilter) -> AppResult<Vec<Book>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM books");
        filter.push_where(&mut builder);
        builder.push(" ORDER BY id");

        let mut tx = self.ctx.lock().await?;
        let books = builder
            .build_query_as::<Book>()
            .fetch_all(tx.conn())
            .await?;
        Ok(books)
    }

    async fn exists(&self, filter: &BookFilter) -> AppResult<bool> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT EXISTS (SELECT 1 FROM books");
        filter.push_where(&mut builder);
        builder.push(")");

        let mut tx = self.ctx.lock().await?;
        let row = builder.build().fetch_one(tx.conn()).await?;
        Ok(row.try_get::<i64, _>(0)? != 0)
    }
}
