//! Librum Library Lending System
//!
//! A Rust implementation of the Librum library server, providing a REST JSON
//! API for managing a book catalog, user accounts, and the borrow/return
//! workflow with per-title copy limits.

use std::sync::Arc;

pub mod api;
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
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
