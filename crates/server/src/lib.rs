//! Parley Server Library
//!
//! This crate contains the real-time chat server components for Parley.

pub mod auth;
pub mod config;
pub mod error;
pub mod messages;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
