use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::CommonResult;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Database, FileRepository, UserRepository};
use crate::models::{FileRecord, NewFile, User};

/// PostgreSQL repository over a shared pool
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn upsert_user(
        &self,
        id: Uuid,
        email: Option<&str>,
        name: Option<&str>,
    ) -> CommonResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (id) DO UPDATE
            SET email = CASE
                    WHEN users.password_hash IS NULL THEN COALESCE(EXCLUDED.email, users.email)
                    ELSE users.email
                END,
                name = COALESCE(EXCLUDED.name, users.name),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(
        &self,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> CommonResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!("Created user record: id={}", user.id);
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> CommonResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_account_by_email(&self, email: &str) -> CommonResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE LOWER(email) = LOWER($1) AND password_hash IS NOT NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl FileRepository for PgRepository {
    async fn insert_file(&self, file: NewFile) -> CommonResult<FileRecord> {
        let record = sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO files (
                id,
                filename,
                original_name,
                size,
                mime_type,
                path,
                share_id,
                password_hash,
                expires_at,
                download_count,
                user_id,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&file.filename)
        .bind(&file.original_name)
        .bind(file.size)
        .bind(&file.mime_type)
        .bind(&file.path)
        .bind(&file.share_id)
        .bind(&file.password_hash)
        .bind(file.expires_at)
        .bind(file.user_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            "Created file record: id={}, share_id={}",
            record.id,
            record.share_id
        );
        Ok(record)
    }

    async fn find_file_by_id(&self, id: Uuid) -> CommonResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_file_by_share_id(&self, share_id: &str) -> CommonResult<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE share_id = $1")
            .bind(share_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn list_files_by_user(&self, user_id: Uuid) -> CommonResult<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT * FROM files
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn delete_file(&self, id: Uuid) -> CommonResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_download_count(&self, id: Uuid) -> CommonResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            UPDATE files
            SET download_count = download_count + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING download_count
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn list_expired_files(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> CommonResult<Vec<FileRecord>> {
        let records = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT * FROM files
            WHERE expires_at IS NOT NULL AND expires_at < $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl Database for PgRepository {
    async fn health_check(&self) -> CommonResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
