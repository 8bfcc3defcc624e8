//! Borrower management service

use validator::Validate;

use super::guards;
use crate::{
    error::{AppError, AppResult, EntityKind},
    models::borrower::{normalize_contact, Borrower, CreateBorrower, NewBorrower, UpdateBorrower},
    repository::{BorrowerFilter, EntityStore, LoanFilter, Repository},
};

#[derive(Clone)]
pub struct BorrowersService {
    repository: Repository,
}

impl BorrowersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_borrowers(&self, name: Option<&str>) -> AppResult<Vec<Borrower>> {
        let uow = self.repository.begin().await?;
        match name {
            Some(name) => {
                uow.borrowers()
                    .find(&BorrowerFilter::NameContains(name.to_string()))
                    .await
            }
            None => uow.borrowers().get_all().await,
        }
    }

    pub async fn get_borrower(&self, id: i64) -> AppResult<Borrower> {
        let uow = self.repository.begin().await?;
        uow.borrowers()
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Borrower))
    }

    pub async fn create_borrower(&self, input: CreateBorrower) -> AppResult<Borrower> {
        input.validate()?;
        let contact_info = normalize_contact(&input.contact_info);

        let uow = self.repository.begin_write().await?;
        guards::ensure_contact_free(uow.borrowers(), &contact_info, None).await?;

        let borrower = uow
            .borrowers()
            .add(&NewBorrower {
                name: input.name,
                contact_info,
            })
            .await?;
        uow.commit().await?;

        tracing::info!(borrower_id = borrower.id, "Borrower registered");
        Ok(borrower)
    }

    pub async fn update_borrower(&self, id: i64, input: UpdateBorrower) -> AppResult<Borrower> {
        input.validate()?;

        let uow = self.repository.begin_write().await?;
        let mut borrower = uow
            .borrowers()
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound(EntityKind::Borrower))?;

        if let Some(ref raw) = input.contact_info {
            let contact_info = normalize_contact(raw);
            if contact_info != borrower.contact_info {
                guards::ensure_contact_free(uow.borrowers(), &contact_info, Some(id)).await?;
                borrower.contact_info = contact_info;
            }
        }
        if let Some(name) = input.name {
            borrower.name = name;
        }

        if !uow.borrowers().update(&borrower).await? {
            return Err(AppError::NotFound(EntityKind::Borrower));
        }
        uow.commit().await?;

        tracing::info!(borrower_id = id, "Borrower updated");
        Ok(borrower)
    }

    /// Delete a borrower together with their returned loans.
    /// Refused while any of their loans is still active.
    pub async fn delete_borrower(&self, id: i64) -> AppResult<()> {
        let uow = self.repository.begin_write().await?;
        if uow.borrowers().get_by_id(id).await?.is_none() {
            return Err(AppError::NotFound(EntityKind::Borrower));
        }

        if uow.loans().exists(&LoanFilter::ActiveByBorrower(id)).await? {
            return Err(AppError::BlockedDelete(format!(
                "borrower {} has active loans",
                id
            )));
        }

        let history = uow.loans().find(&LoanFilter::ByBorrower(id)).await?;
        for loan in &history {
            uow.loans().delete(loan.id).await?;
        }
        uow.borrowers().delete(id).await?;
        uow.commit().await?;

        tracing::info!(
            borrower_id = id,
            closed_loans = history.len(),
            "Borrower deleted"
        );
        Ok(())
    }
}
