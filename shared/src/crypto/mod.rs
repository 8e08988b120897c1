//! Cryptographic utilities for DropLink
//!
//! Password hashing for accounts and file passwords, content checksums and
//! share id generation.

pub mod hashing;

pub use hashing::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Hashing error: {0}")]
    Hashing(String),

    #[error("Verification error: {0}")]
    Verification(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
