//! DeepDive - Knowledge Management Backend
//!
//! REST backend for collecting research resources, annotating them with
//! notes and comments, organizing them into collections, and analysing
//! groups of them through an external AI microservice.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;

pub use config::config;
pub use error::{Error, Result};
pub use state::AppState;
