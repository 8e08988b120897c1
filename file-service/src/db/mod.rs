//! Relational store access
//!
//! [`PgRepository`] is the production implementation, [`MemoryRepository`]
//! backs tests and local runs without PostgreSQL.

pub mod memory;
pub mod repository;

pub use memory::MemoryRepository;
pub use repository::PgRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{CommonError, CommonResult};
use uuid::Uuid;

use crate::models::{FileRecord, NewFile, User};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert the user or refresh email and name from token claims
    ///
    /// Accounts with a password keep their registered email.
    async fn upsert_user(
        &self,
        id: Uuid,
        email: Option<&str>,
        name: Option<&str>,
    ) -> CommonResult<User>;

    /// `AlreadyExists` when another password account has the email
    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> CommonResult<User>;

    async fn find_user_by_id(&self, id: Uuid) -> CommonResult<Option<User>>;

    /// Password account for an email, case-insensitive
    async fn find_account_by_email(&self, email: &str) -> CommonResult<Option<User>>;
}

#[async_trait]
pub trait FileRepository: Send + Sync {
    /// `AlreadyExists` when the share id collides
    async fn insert_file(&self, file: NewFile) -> CommonResult<FileRecord>;

    async fn find_file_by_id(&self, id: Uuid) -> CommonResult<Option<FileRecord>>;

    async fn find_file_by_share_id(&self, share_id: &str) -> CommonResult<Option<FileRecord>>;

    /// Newest first
    async fn list_files_by_user(&self, user_id: Uuid) -> CommonResult<Vec<FileRecord>>;

    /// Returns false when no row matched
    async fn delete_file(&self, id: Uuid) -> CommonResult<bool>;

    /// Atomically bump the counter and return its new value
    async fn increment_download_count(&self, id: Uuid) -> CommonResult<i64>;

    /// Files whose expiry is before `now`, oldest expiry first
    async fn list_expired_files(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> CommonResult<Vec<FileRecord>>;
}

#[async_trait]
pub trait Database: UserRepository + FileRepository {
    async fn health_check(&self) -> CommonResult<()>;

    fn backend_name(&self) -> &'static str;
}

/// Mirror a token identity into `users`, dropping the email if it clashes
pub async fn sync_identity<R>(
    repo: &R,
    id: Uuid,
    email: Option<&str>,
    name: Option<&str>,
) -> CommonResult<User>
where
    R: UserRepository + ?Sized,
{
    match repo.upsert_user(id, email, name).await {
        Err(CommonError::AlreadyExists(msg)) if email.is_some() => {
            tracing::warn!("Email of identity {} clashes ({}), storing without it", id, msg);
            repo.upsert_user(id, None, name).await
        }
        other => other,
    }
}
