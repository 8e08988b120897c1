use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{CommonError, CommonResult};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Database, FileRepository, UserRepository};
use crate::models::{FileRecord, NewFile, User};

/// Map-backed repository with the same uniqueness rules as the SQL schema
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    files: HashMap<Uuid, FileRecord>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored row, used to age files in tests
    pub async fn replace_file(&self, record: FileRecord) {
        self.state.lock().await.files.insert(record.id, record);
    }
}

/// Same rule as the partial unique index on `users`
fn is_account_for(user: &User, email: &str) -> bool {
    user.password_hash.is_some()
        && user
            .email
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(email))
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn upsert_user(
        &self,
        id: Uuid,
        email: Option<&str>,
        name: Option<&str>,
    ) -> CommonResult<User> {
        let mut state = self.state.lock().await;

        let now = Utc::now();
        let user = state.users.entry(id).or_insert_with(|| User {
            id,
            email: None,
            name: None,
            password_hash: None,
            created_at: now,
            updated_at: now,
        });
        if let (Some(email), None) = (email, user.password_hash.as_ref()) {
            user.email = Some(email.to_string());
        }
        if let Some(name) = name {
            user.name = Some(name.to_string());
        }
        user.updated_at = now;

        Ok(user.clone())
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> CommonResult<User> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|u| is_account_for(u, email)) {
            return Err(CommonError::AlreadyExists(format!("email {}", email)));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            name: name.map(str::to_string),
            password_hash: Some(password_hash.to_string()),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> CommonResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> CommonResult<Option<User>> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .values()
            .find(|u| is_account_for(u, email))
            .cloned())
    }
}

#[async_trait]
impl FileRepository for MemoryRepository {
    async fn insert_file(&self, file: NewFile) -> CommonResult<FileRecord> {
        let mut state = self.state.lock().await;

        if state.files.values().any(|f| f.share_id == file.share_id) {
            return Err(CommonError::AlreadyExists(format!(
                "share_id {}",
                file.share_id
            )));
        }
        if !state.users.contains_key(&file.user_id) {
            return Err(CommonError::ValidationFailed(format!(
                "unknown user {}",
                file.user_id
            )));
        }

        let now = Utc::now();
        let record = FileRecord {
            id: Uuid::new_v4(),
            filename: file.filename,
            original_name: file.original_name,
            size: file.size,
            mime_type: file.mime_type,
            path: file.path,
            share_id: file.share_id,
            password_hash: file.password_hash,
            expires_at: file.expires_at,
            download_count: 0,
            user_id: file.user_id,
            created_at: now,
            updated_at: now,
        };
        state.files.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_file_by_id(&self, id: Uuid) -> CommonResult<Option<FileRecord>> {
        Ok(self.state.lock().await.files.get(&id).cloned())
    }

    async fn find_file_by_share_id(&self, share_id: &str) -> CommonResult<Option<FileRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .files
            .values()
            .find(|f| f.share_id == share_id)
            .cloned())
    }

    async fn list_files_by_user(&self, user_id: Uuid) -> CommonResult<Vec<FileRecord>> {
        let mut files: Vec<FileRecord> = self
            .state
            .lock()
            .await
            .files
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();

        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(files)
    }

    async fn delete_file(&self, id: Uuid) -> CommonResult<bool> {
        Ok(self.state.lock().await.files.remove(&id).is_some())
    }

    async fn increment_download_count(&self, id: Uuid) -> CommonResult<i64> {
        let mut state = self.state.lock().await;
        let file = state
            .files
            .get_mut(&id)
            .ok_or_else(|| CommonError::NotFound(format!("file {}", id)))?;

        file.download_count += 1;
        file.updated_at = Utc::now();
        Ok(file.download_count)
    }

    async fn list_expired_files(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> CommonResult<Vec<FileRecord>> {
        let mut expired: Vec<FileRecord> = self
            .state
            .lock()
            .await
            .files
            .values()
            .filter(|f| f.is_expired_at(now))
            .cloned()
            .collect();

        expired.sort_by_key(|f| f.expires_at);
        expired.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(expired)
    }
}

#[async_trait]
impl Database for MemoryRepository {
    async fn health_check(&self) -> CommonResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
