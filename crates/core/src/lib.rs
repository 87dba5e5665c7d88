//! Core types and configuration for the rebid analysis workspace.
//!
//! This crate provides shared types used across all other crates:
//! - Bid submission types (price bands, quantity bands, joined offers)
//! - Participant categories and auction keys
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
