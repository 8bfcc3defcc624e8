//! Borrower store

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};

use super::{unique_violation, unit_of_work::TxContext, EntityStore};
use crate::{
    error::AppResult,
    models::borrower::{Borrower, NewBorrower},
};

/// Named lookups over borrowers
#[derive(Debug, Clone)]
pub enum BorrowerFilter {
    /// Exact contact, optionally ignoring one borrower (the one being updated)
    ContactInfo {
        contact_info: String,
        excluding: Option<i64>,
    },
    NameContains(String),
}

impl BorrowerFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE ");
        match self {
            BorrowerFilter::ContactInfo {
                contact_info,
                excluding,
            } => {
                builder.push("contact_info = ").push_bind(contact_info.clone());
                if let Some(id) = excluding {
                    builder.push(" AND id <> ").push_bind(*id);
                }
            }
            BorrowerFilter::NameContains(text) => {
                builder.push("name LIKE ").push_bind(format!("%{}%", text));
            }
        }
    }
}

pub struct BorrowerStore {
    ctx: Arc<TxContext>,
}

impl BorrowerStore {
    pub(crate) fn new(ctx: Arc<TxContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl EntityStore for BorrowerStore {
    type Entity = Borrower;
    type New = NewBorrower;
    type Filter = BorrowerFilter;

    async fn get_all(&self) -> AppResult<Vec<Borrower>> {
        let mut tx = self.ctx.lock().await?;
        let borrowers = sqlx::query_as::<_, Borrower>("SELECT * FROM borrowers ORDER BY id")
            .fetch_all(tx.conn())
            .await?;
        Ok(borrowers)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Borrower>> {
        let mut tx = self.ctx.lock().await?;
        let borrower = sqlx::query_as::<_, Borrower>("SELECT * FROM borrowers WHERE id = ?")
            .bind(id)
            .fetch_optional(tx.conn())
            .await?;
        Ok(borrower)
    }

    async fn add(&self, new: &NewBorrower) -> AppResult<Borrower> {
        let mut tx = self.ctx.lock().await?;
        let borrower = sqlx::query_as::<_, Borrower>(
            "INSERT INTO borrowers (name, contact_info) VALUES (?, ?) RETURNING *",
        )
        .bind(&new.name)
        .bind(&new.contact_info)
        .fetch_one(tx.conn())
        .await
        .map_err(|e| unique_violation(e, "contact_info", &new.contact_info))?;

        self.ctx.record(1);
        Ok(borrower)
    }

    async fn update(&self, borrower: &Borrower) -> AppResult<bool> {
        let mut tx = self.ctx.lock().await?;
        let rows = sqlx::query("UPDATE borrowers SET name = ?, contact_info = ? WHERE id = ?")
            .bind(&borrower.name)
            .bind(&borrower.contact_info)
            .bind(borrower.id)
            .execute(tx.conn())
            .await
            .map_err(|e| unique_violation(e, "contact_info", &borrower.contact_info))?
            .rows_affected();

        self.ctx.record(rows);
        Ok(rows > 0)
    }

    async fn delete(&self, id: i64) -> AppResult<bool> {
        let mut tx = self.ctx.lock().await?;
        let rows = sqlx::query("DELETE FROM borrowers WHERE id = ?")
            .bind(id)
            .execute(tx.conn())
            .await?
            .rows_affected();

        self.ctx.record(rows);
        Ok(rows > 0)
    }

    async fn find(&self, filter: &BorrowerFilter) -> AppResult<Vec<Borrower>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM borrowers");
        filter.push_where(&mut builder);
        builder.push(" ORDER BY id");

        let mut tx = self.ctx.lock().await?;
        let borrowers = builder
            .build_query_as::<Borrower>()
            .fetch_all(tx.conn())
            .await?;
        Ok(borrowers)
    }

    async fn exists(&self, filter: &BorrowerFilter) -> AppResult<bool> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT EXISTS (SELECT 1 FROM borrowers");
        filter.push_where(&mut builder);
        builder.push(")");

        let mut tx = self.ctx.lock().await?;
        let row = builder.build().fetch_one(tx.conn()).await?;
        Ok(row.try_get::<i64, _>(0)? != 0)
    }
}
