//! # Drafter Common Library
//!
//! Shared code for Drafter microservices including:
//! - Common error types
//! - Analysis event types (AnalysisEvent enum) and broadcast EventBus
//! - Configuration loading with environment overrides

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
