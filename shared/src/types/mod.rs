//! Shared type definitions for the DropLink backend
//!
//! Holds the error taxonomy every repository and service maps onto, plus the
//! small response envelopes that more than one route returns.

pub mod error;

pub use error::CommonError;

use serde::{Deserialize, Serialize};

/// Result alias used by repositories and other data-store code
pub type CommonResult<T> = std::result::Result<T, CommonError>;

/// Body returned by every failed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
}

impl ErrorBody {
    pub fn new(status: u16, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status,
        }
    }
}

/// Acknowledgement for mutations that carry no payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }
}
