//! Libris Library Lending Server
//!
//! Tracks a library's copies and the loans against them. Every lending
//! operation runs inside a single unit of work so that availability counts
//! and loan records always change together, providing a REST JSON API on top.

use std::sync::Arc;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<services::Services>,
    pub repository: repository::Repository,
}
