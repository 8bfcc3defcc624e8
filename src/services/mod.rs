//! Business logic services

pub mod borrowers;
pub mod catalog;
pub mod guards;
pub mod loans;

use std::sync::Arc;

use crate::{clock::Clock, config::LoanPolicyConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub borrowers: borrowers::BorrowersService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, clock: Arc<dyn Clock>, loan_policy: &LoanPolicyConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            borrowers: borrowers::BorrowersService::new(repository.clone()),
            loans: loans::LoansService::new(repository, clock, loan_policy),
        }
    }
}
