//! Shared utilities and types for DropLink backend services

// Re-export common dependencies
pub use anyhow;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tracing;
pub use uuid;

pub mod crypto;
pub mod files;
pub mod observability;
pub mod types;

pub use types::{CommonError, CommonResult};
