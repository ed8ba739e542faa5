//! La Bibliothèque record service
//!
//! A Rust REST server for managing a library's books, authors and loans,
//! built around a transactional loan lifecycle engine that keeps copy
//! availability consistent with loan state.

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
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
