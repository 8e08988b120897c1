use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use shared::crypto::{generate_share_id, hash_password, sha256, verify_password};
use shared::files::{
    format_file_size, is_allowed_mime_type, normalize_mime_type, sanitize_filename,
    sniff_content_type, DEFAULT_MIME_TYPE,
};
use shared::CommonError;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::db::{sync_identity, Database};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    FileInfoResponse, FileListItem, FileOwner, FileRecord, NewFile, UploadedFile,
};
use crate::storage::ObjectStore;

/// Fresh share ids tried before an upload gives up
pub const SHARE_ID_ATTEMPTS: usize = 5;

/// One file part of an upload form, plus its optional settings
#[derive(Debug, Clone)]
pub struct UploadInput {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
    pub password: Option<String>,
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FileDownload {
    pub data: Bytes,
    pub mime_type: String,
    pub file_name: String,
    /// `None` when the counter update failed
    pub download_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rows_deleted: usize,
    pub blobs_deleted: usize,
    pub blob_failures: usize,
}

pub struct FileService {
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStore>,
    upload: UploadConfig,
    public_base_url: String,
}

impl FileService {
    pub fn new(
        db: Arc<dyn Database>,
        store: Arc<dyn ObjectStore>,
        upload: UploadConfig,
        public_base_url: String,
    ) -> Self {
        Self {
            db,
            store,
            upload,
            public_base_url,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.upload.max_bytes
    }

    /// Public link to the blob, or the share page when the store serves none
    fn public_url(&self, record: &FileRecord) -> String {
        self.store
            .public_url(&record.path)
            .unwrap_or_else(|| format!("{}/download/{}", self.public_base_url, record.share_id))
    }

    // ============= Upload =============

    pub async fn upload(&self, user: &AuthUser, input: UploadInput) -> AppResult<UploadedFile> {
        if input.data.is_empty() {
            return Err(AppError::BadRequest("Empty file provided".to_string()));
        }

        if input.data.len() > self.upload.max_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File too large. Maximum size is {}",
                format_file_size(self.upload.max_bytes as u64)
            )));
        }

        let mime_type = resolve_mime_type(input.content_type.as_deref(), &input.data);
        if !is_allowed_mime_type(&mime_type, self.upload.allow_unknown_types) {
            return Err(AppError::UnsupportedMediaType(format!(
                "File type not allowed: {}",
                mime_type
            )));
        }

        let expires_at = match input.expires_at.as_deref() {
            Some(raw) => parse_expiry(raw, Utc::now())?,
            None => None,
        };

        let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        sync_identity(
            &*self.db,
            user.id,
            user.email.as_deref(),
            user.name.as_deref(),
        )
        .await?;

        let file_name = sanitize_filename(&input.file_name);
        let size = input.data.len();
        let share_id = generate_share_id();
        let path = storage_key(user.id, Utc::now().timestamp_millis(), &share_id, &file_name);

        info!(
            "File received: user_id={}, filename={}, size={} bytes, content_type={}, sha256={}",
            user.id,
            file_name,
            size,
            mime_type,
            sha256(&input.data)
        );

        self.store.put(&path, input.data, &mime_type).await?;

        let new_file = NewFile {
            filename: file_name.clone(),
            original_name: file_name,
            size: size as i64,
            mime_type,
            path: path.clone(),
            share_id,
            password_hash,
            expires_at,
            user_id: user.id,
        };

        let record = match self.insert_with_fresh_share_id(new_file).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to create file record, removing uploaded blob {}", path);
                if let Err(delete_err) = self.store.delete(&path).await {
                    warn!("Failed to roll back upload {}: {}", path, delete_err);
                }
                return Err(e);
            }
        };

        info!(
            "File uploaded: id={}, share_id={}, path={}",
            record.id, record.share_id, record.path
        );

        Ok(UploadedFile {
            id: record.id,
            url: self.public_url(&record),
            download_url: format!("/download/{}", record.share_id),
            share_id: record.share_id.clone(),
            filename: record.original_name.clone(),
            size: record.size,
            size_label: format_file_size(record.size as u64),
            mime_type: record.mime_type.clone(),
            path: record.path.clone(),
            has_password: record.has_password(),
            expires_at: record.expires_at,
        })
    }

    async fn insert_with_fresh_share_id(&self, mut new_file: NewFile) -> AppResult<FileRecord> {
        for attempt in 1..=SHARE_ID_ATTEMPTS {
            match self.db.insert_file(new_file.clone()).await {
                Ok(record) => return Ok(record),
                Err(CommonError::AlreadyExists(_)) => {
                    debug!(
                        "Share id collision on attempt {}: {}",
                        attempt, new_file.share_id
                    );
                    new_file.share_id = generate_share_id();
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal(format!(
            "No unique share id after {} attempts",
            SHARE_ID_ATTEMPTS
        )))
    }

    // ============= Download =============

    pub async fn download(&self, share_id: &str, password: Option<&str>) -> AppResult<FileDownload> {
        let record = self.find_live_file(share_id).await?;

        if let Some(hash) = record.password_hash.as_deref() {
            let supplied = password
                .filter(|p| !p.is_empty())
                .ok_or_else(|| AppError::Unauthorized("Password required".to_string()))?;

            if !verify_password(supplied, hash)? {
                return Err(AppError::Forbidden("Invalid password".to_string()));
            }
        }

        let data = self.store.get(&record.path).await?;

        let download_count = match self.db.increment_download_count(record.id).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Failed to update download count for {}: {}", record.id, e);
                None
            }
        };

        info!(
            "File downloaded: share_id={}, size={} bytes",
            record.share_id,
            data.len()
        );

        Ok(FileDownload {
            data,
            mime_type: record.mime_type,
            file_name: record.original_name,
            download_count,
        })
    }

    /// Row for a share id that exists and has not expired
    async fn find_live_file(&self, share_id: &str) -> AppResult<FileRecord> {
        let record = self
            .db
            .find_file_by_share_id(share_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        if record.is_expired_at(Utc::now()) {
            return Err(AppError::Gone("File has expired".to_string()));
        }

        Ok(record)
    }

    // ============= Listing / Info =============

    pub async fn list_files(&self, user_id: Uuid) -> AppResult<Vec<FileListItem>> {
        let records = self.db.list_files_by_user(user_id).await?;

        Ok(records
            .into_iter()
            .map(|record| FileListItem {
                id: record.id,
                url: self.public_url(&record),
                download_url: format!("/download/{}", record.share_id),
                size_label: format_file_size(record.size as u64),
                has_password: record.has_password(),
                name: record.filename,
                original_name: record.original_name,
                size: record.size,
                mime_type: record.mime_type,
                share_id: record.share_id,
                path: record.path,
                expires_at: record.expires_at,
                download_count: record.download_count,
                created_at: record.created_at,
                updated_at: record.updated_at,
            })
            .collect())
    }

    pub async fn file_info(&self, share_id: &str) -> AppResult<FileInfoResponse> {
        let record = self.find_live_file(share_id).await?;

        let owner = self
            .db
            .find_user_by_id(record.user_id)
            .await?
            .map(|user| FileOwner {
                name: user.name,
                email: user.email,
            });

        Ok(FileInfoResponse {
            id: record.id,
            size_label: format_file_size(record.size as u64),
            has_password: record.has_password(),
            filename: record.filename,
            original_name: record.original_name,
            size: record.size,
            mime_type: record.mime_type,
            share_id: record.share_id,
            expires_at: record.expires_at,
            download_count: record.download_count,
            created_at: record.created_at,
            user: owner,
        })
    }

    // ============= Deletion =============

    pub async fn delete_file(&self, user_id: Uuid, file_id: Uuid) -> AppResult<()> {
        let record = self
            .db
            .find_file_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        self.delete_owned(user_id, record).await
    }

    pub async fn delete_by_share_id(&self, user_id: Uuid, share_id: &str) -> AppResult<()> {
        let record = self
            .db
            .find_file_by_share_id(share_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        self.delete_owned(user_id, record).await
    }

    async fn delete_owned(&self, user_id: Uuid, record: FileRecord) -> AppResult<()> {
        if !record.is_owned_by(user_id) {
            warn!(
                "User {} attempted to delete file {} owned by {}",
                user_id, record.id, record.user_id
            );
            return Err(AppError::Forbidden(
                "You do not have permission to delete this file".to_string(),
            ));
        }

        if !self.db.delete_file(record.id).await? {
            return Err(AppError::NotFound("File not found".to_string()));
        }

        if let Err(e) = self.store.delete(&record.path).await {
            warn!("Failed to delete blob {} for file {}: {}", record.path, record.id, e);
        }

        info!("File deleted: id={}, share_id={}", record.id, record.share_id);
        Ok(())
    }

    // ============= Expiry =============

    /// Delete up to `limit` expired files, rows first, then blobs
    pub async fn sweep_expired(&self, now: DateTime<Utc>, limit: i64) -> AppResult<SweepReport> {
        let expired = self.db.list_expired_files(now, limit).await?;
        let mut report = SweepReport::default();

        for record in expired {
            match self.db.delete_file(record.id).await {
                Ok(true) => report.rows_deleted += 1,
                Ok(false) => continue,
                Err(e) => {
                    warn!("Failed to delete expired file {}: {}", record.id, e);
                    continue;
                }
            }

            match self.store.delete(&record.path).await {
                Ok(()) => report.blobs_deleted += 1,
                Err(e) => {
                    warn!("Failed to delete expired blob {}: {}", record.path, e);
                    report.blob_failures += 1;
                }
            }
        }

        Ok(report)
    }
}

/// `{user_id}/{millis}_{share_id}_{name}`; the share id keeps same-name uploads apart
fn storage_key(user_id: Uuid, millis: i64, share_id: &str, file_name: &str) -> String {
    format!("{}/{}_{}_{}", user_id, millis, share_id, file_name)
}

/// Declared type when it is specific, otherwise sniffed from the bytes
fn resolve_mime_type(declared: Option<&str>, data: &[u8]) -> String {
    match declared.map(normalize_mime_type) {
        Some(mime) if !mime.is_empty() && mime != DEFAULT_MIME_TYPE => mime,
        _ => sniff_content_type(data).to_string(),
    }
}

/// Parse an `expiresAt` form value; blank means no expiry
///
/// Accepts RFC 3339 and the zone-less `datetime-local` shape, read as UTC.
pub fn parse_expiry(raw: &str, now: DateTime<Utc>) -> AppResult<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
                .map(|naive| naive.and_utc())
        })
        .map_err(|_| AppError::BadRequest(format!("Invalid expiresAt: {}", raw)))?;

    if parsed <= now {
        return Err(AppError::BadRequest(
            "expiresAt must be in the future".to_string(),
        ));
    }

    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FileRepository, MemoryRepository, UserRepository};
    use crate::models::User;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use shared::CommonResult;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Memory repository with switchable failures
    #[derive(Default)]
    struct FlakyRepository {
        inner: MemoryRepository,
        share_id_conflicts: AtomicUsize,
        fail_inserts: AtomicBool,
        fail_increments: AtomicBool,
        reject_emails: AtomicBool,
        attempted_share_ids: Mutex<Vec<String>>,
    }

    impl FlakyRepository {
        fn attempted(&self) -> Vec<String> {
            self.attempted_share_ids.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UserRepository for FlakyRepository {
        async fn upsert_user(
            &self,
            id: Uuid,
            email: Option<&str>,
            name: Option<&str>,
        ) -> CommonResult<User> {
            if email.is_some() && self.reject_emails.load(Ordering::SeqCst) {
                return Err(CommonError::AlreadyExists("email".to_string()));
            }
            self.inner.upsert_user(id, email, name).await
        }

        async fn create_user(
            &self,
            email: &str,
            name: Option<&str>,
            password_hash: &str,
        ) -> CommonResult<User> {
            self.inner.create_user(email, name, password_hash).await
        }

        async fn find_user_by_id(&self, id: Uuid) -> CommonResult<Option<User>> {
            self.inner.find_user_by_id(id).await
        }

        async fn find_account_by_email(&self, email: &str) -> CommonResult<Option<User>> {
            self.inner.find_account_by_email(email).await
        }
    }

    #[async_trait]
    impl FileRepository for FlakyRepository {
        async fn insert_file(&self, file: NewFile) -> CommonResult<FileRecord> {
            self.attempted_share_ids
                .lock()
                .unwrap()
                .push(file.share_id.clone());

            if self.fail_inserts.load(Ordering::SeqCst) {
                return Err(CommonError::Database("connection reset".to_string()));
            }
            let conflict = self
                .share_id_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if conflict {
                return Err(CommonError::AlreadyExists(format!("share_id {}", file.share_id)));
            }
            self.inner.insert_file(file).await
        }

        async fn find_file_by_id(&self, id: Uuid) -> CommonResult<Option<FileRecord>> {
            self.inner.find_file_by_id(id).await
        }

        async fn find_file_by_share_id(&self, share_id: &str) -> CommonResult<Option<FileRecord>> {
            self.inner.find_file_by_share_id(share_id).await
        }

        async fn list_files_by_user(&self, user_id: Uuid) -> CommonResult<Vec<FileRecord>> {
            self.inner.list_files_by_user(user_id).await
        }

        async fn delete_file(&self, id: Uuid) -> CommonResult<bool> {
            self.inner.delete_file(id).await
        }

        async fn increment_download_count(&self, id: Uuid) -> CommonResult<i64> {
            if self.fail_increments.load(Ordering::SeqCst) {
                return Err(CommonError::Database("statement timeout".to_string()));
            }
            self.inner.increment_download_count(id).await
        }

        async fn list_expired_files(
            &self,
            now: DateTime<Utc>,
            limit: i64,
        ) -> CommonResult<Vec<FileRecord>> {
            self.inner.list_expired_files(now, limit).await
        }
    }

    #[async_trait]
    impl Database for FlakyRepository {
        async fn health_check(&self) -> CommonResult<()> {
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "flaky"
        }
    }

    struct FlakyFixture {
        service: FileService,
        repo: Arc<FlakyRepository>,
        store: Arc<MemoryStore>,
        user: AuthUser,
    }

    fn flaky_fixture() -> FlakyFixture {
        let f = fixture();
        let repo = Arc::new(FlakyRepository::default());
        let service = FileService::new(
            repo.clone(),
            f.store.clone(),
            UploadConfig {
                max_bytes: 1024,
                allow_unknown_types: true,
            },
            "http://localhost:3000".to_string(),
        );

        FlakyFixture {
            service,
            repo,
            store: f.store,
            user: f.user,
        }
    }

    struct Fixture {
        service: FileService,
        repo: Arc<MemoryRepository>,
        store: Arc<MemoryStore>,
        user: AuthUser,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let store = Arc::new(MemoryStore::new());
        let service = FileService::new(
            repo.clone(),
            store.clone(),
            UploadConfig {
                max_bytes: 1024,
                allow_unknown_types: true,
            },
            "http://localhost:3000".to_string(),
        );
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some("owner@example.com".to_string()),
            name: Some("Owner".to_string()),
        };

        Fixture {
            service,
            repo,
            store,
            user,
        }
    }

    fn input(name: &str, data: &'static [u8]) -> UploadInput {
        UploadInput {
            file_name: name.to_string(),
            content_type: Some("text/plain".to_string()),
            data: Bytes::from_static(data),
            password: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_upload_stores_blob_and_row() {
        let f = fixture();
        let uploaded = f.service.upload(&f.user, input("notes.txt", b"hello")).await.unwrap();

        assert_eq!(uploaded.share_id.len(), 12);
        assert_eq!(uploaded.download_url, format!("/download/{}", uploaded.share_id));
        assert_eq!(
            uploaded.url,
            format!("http://localhost:3000/download/{}", uploaded.share_id)
        );
        assert!(uploaded.path.starts_with(&format!("{}/", f.user.id)));
        assert!(uploaded.path.ends_with("_notes.txt"));
        assert_eq!(uploaded.size_label, "5 Bytes");
        assert!(f.store.contains(&uploaded.path).await);
    }

    #[tokio::test]
    async fn test_upload_rejects_oversize_and_disallowed_types() {
        let f = fixture();

        let big = UploadInput {
            data: Bytes::from(vec![b'a'; 2048]),
            ..input("big.txt", b"")
        };
        assert!(matches!(
            f.service.upload(&f.user, big).await,
            Err(AppError::PayloadTooLarge(_))
        ));

        let exe = UploadInput {
            content_type: Some("application/x-msdownload".to_string()),
            ..input("setup.exe", b"MZ\x90\x00")
        };
        assert!(matches!(
            f.service.upload(&f.user, exe).await,
            Err(AppError::UnsupportedMediaType(_))
        ));

        assert_eq!(f.store.object_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_content_type_is_sniffed() {
        let f = fixture();
        let png = UploadInput {
            content_type: None,
            ..input("pic", b"\x89PNG\r\n\x1a\n")
        };

        let uploaded = f.service.upload(&f.user, png).await.unwrap();
        assert_eq!(uploaded.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_password_protected_download() {
        let f = fixture();
        let protected = UploadInput {
            password: Some("s3cret".to_string()),
            ..input("secret.txt", b"classified")
        };
        let uploaded = f.service.upload(&f.user, protected).await.unwrap();
        assert!(uploaded.has_password);

        assert!(matches!(
            f.service.download(&uploaded.share_id, None).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            f.service.download(&uploaded.share_id, Some("wrong")).await,
            Err(AppError::Forbidden(_))
        ));

        let download = f
            .service
            .download(&uploaded.share_id, Some("s3cret"))
            .await
            .unwrap();
        assert_eq!(download.data, Bytes::from_static(b"classified"));
        assert_eq!(download.download_count, Some(1));
    }

    #[tokio::test]
    async fn test_expired_file_is_gone() {
        let f = fixture();
        let uploaded = f.service.upload(&f.user, input("old.txt", b"old")).await.unwrap();

        let mut record = f
            .repo
            .find_file_by_share_id(&uploaded.share_id)
            .await
            .unwrap()
            .unwrap();
        record.expires_at = Some(Utc::now() - Duration::minutes(1));
        f.repo.replace_file(record).await;

        assert!(matches!(
            f.service.download(&uploaded.share_id, None).await,
            Err(AppError::Gone(_))
        ));
        assert!(matches!(
            f.service.file_info(&uploaded.share_id).await,
            Err(AppError::Gone(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_blob_reports_not_found_on_server() {
        let f = fixture();
        let uploaded = f.service.upload(&f.user, input("gone.txt", b"bye")).await.unwrap();
        f.store.delete(&uploaded.path).await.unwrap();

        match f.service.download(&uploaded.share_id, None).await {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "File not found on server"),
            other => panic!("unexpected result: {:?}", other.map(|d| d.file_name)),
        }
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        let f = fixture();
        let uploaded = f.service.upload(&f.user, input("mine.txt", b"mine")).await.unwrap();

        assert!(matches!(
            f.service.delete_file(Uuid::new_v4(), uploaded.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(f.service.list_files(f.user.id).await.unwrap().len(), 1);

        f.service.delete_file(f.user.id, uploaded.id).await.unwrap();
        assert!(f.service.list_files(f.user.id).await.unwrap().is_empty());
        assert!(!f.store.contains(&uploaded.path).await);

        assert!(matches!(
            f.service.delete_file(f.user.id, uploaded.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let f = fixture();
        let keep = f.service.upload(&f.user, input("keep.txt", b"keep")).await.unwrap();
        let drop = f.service.upload(&f.user, input("drop.txt", b"drop")).await.unwrap();

        let mut record = f.repo.find_file_by_id(drop.id).await.unwrap().unwrap();
        record.expires_at = Some(Utc::now() - Duration::hours(1));
        f.repo.replace_file(record).await;

        let report = f.service.sweep_expired(Utc::now(), 10).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                rows_deleted: 1,
                blobs_deleted: 1,
                blob_failures: 0
            }
        );

        let remaining = f.service.list_files(f.user.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
        assert!(!f.store.contains(&drop.path).await);
    }

    #[tokio::test]
    async fn test_same_name_uploads_keep_separate_blobs() {
        let f = fixture();
        let mut uploaded = Vec::new();
        for body in ["first", "second"] {
            let file = UploadInput {
                data: Bytes::from(body),
                ..input("report.txt", b"")
            };
            uploaded.push(f.service.upload(&f.user, file).await.unwrap());
        }

        assert_ne!(uploaded[0].path, uploaded[1].path);
        assert!(uploaded[0].path.contains(&uploaded[0].share_id));
        assert!(uploaded[0].path.ends_with("_report.txt"));
        assert_eq!(f.store.object_count().await, 2);

        let first = f.service.download(&uploaded[0].share_id, None).await.unwrap();
        let second = f.service.download(&uploaded[1].share_id, None).await.unwrap();
        assert_eq!(first.data, Bytes::from_static(b"first"));
        assert_eq!(second.data, Bytes::from_static(b"second"));

        f.service.delete_file(f.user.id, uploaded[1].id).await.unwrap();
        let first = f.service.download(&uploaded[0].share_id, None).await.unwrap();
        assert_eq!(first.data, Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn test_identities_without_unique_email_can_upload() {
        let f = fixture();
        f.repo
            .create_user("owner@example.com", None, "hash")
            .await
            .unwrap();

        let anonymous = |name: &str| AuthUser {
            id: Uuid::new_v4(),
            email: None,
            name: Some(name.to_string()),
        };
        for user in [anonymous("Phone One"), anonymous("Phone Two"), f.user.clone()] {
            f.service.upload(&user, input("a.txt", b"a")).await.unwrap();
        }

        let owner = f.repo.find_user_by_id(f.user.id).await.unwrap().unwrap();
        assert_eq!(owner.email.as_deref(), Some("owner@example.com"));
    }

    #[tokio::test]
    async fn test_email_clash_stores_identity_without_email() {
        let f = flaky_fixture();
        f.repo.reject_emails.store(true, Ordering::SeqCst);

        let uploaded = f.service.upload(&f.user, input("a.txt", b"a")).await.unwrap();
        let info = f.service.file_info(&uploaded.share_id).await.unwrap();
        let owner = info.user.unwrap();
        assert_eq!(owner.email, None);
        assert_eq!(owner.name.as_deref(), Some("Owner"));
    }

    #[tokio::test]
    async fn test_share_id_collision_retries_with_fresh_id() {
        let f = flaky_fixture();
        f.repo.share_id_conflicts.store(2, Ordering::SeqCst);

        let uploaded = f.service.upload(&f.user, input("a.txt", b"a")).await.unwrap();

        let attempted = f.repo.attempted();
        assert_eq!(attempted.len(), 3);
        assert_eq!(uploaded.share_id, attempted[2]);
        assert_ne!(attempted[0], attempted[2]);
        assert!(f.service.download(&uploaded.share_id, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_share_id_attempts_exhausted_rolls_back_blob() {
        let f = flaky_fixture();
        f.repo
            .share_id_conflicts
            .store(SHARE_ID_ATTEMPTS, Ordering::SeqCst);

        let result = f.service.upload(&f.user, input("a.txt", b"a")).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(f.repo.attempted().len(), SHARE_ID_ATTEMPTS);
        assert_eq!(f.store.object_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_insert_removes_blob() {
        let f = flaky_fixture();
        f.repo.fail_inserts.store(true, Ordering::SeqCst);

        let result = f.service.upload(&f.user, input("a.txt", b"a")).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(f.repo.attempted().len(), 1);
        assert_eq!(f.store.object_count().await, 0);
    }

    #[tokio::test]
    async fn test_counter_failure_does_not_fail_download() {
        let f = flaky_fixture();
        let uploaded = f.service.upload(&f.user, input("a.txt", b"abc")).await.unwrap();
        f.repo.fail_increments.store(true, Ordering::SeqCst);

        let download = f.service.download(&uploaded.share_id, None).await.unwrap();
        assert_eq!(download.data, Bytes::from_static(b"abc"));
        assert_eq!(download.download_count, None);
    }

    #[test]
    fn test_parse_expiry() {
        let now = Utc::now();
        assert_eq!(parse_expiry("  ", now).unwrap(), None);
        assert!(parse_expiry("2999-01-01T00:00:00Z", now).unwrap().is_some());
        assert!(parse_expiry("2999-01-01T08:30", now).unwrap().is_some());
        assert!(matches!(
            parse_expiry("2000-01-01T00:00:00Z", now),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_expiry("tomorrow", now),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_resolve_mime_type() {
        assert_eq!(resolve_mime_type(Some("Image/PNG"), b"...."), "image/png");
        assert_eq!(
            resolve_mime_type(Some(DEFAULT_MIME_TYPE), b"%PDF-1.4"),
            "application/pdf"
        );
        assert_eq!(resolve_mime_type(None, b"????"), DEFAULT_MIME_TYPE);
    }
}
