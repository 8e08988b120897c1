//! Client for a hosted bucket REST API
//!
//! Objects live at `{url}/storage/v1/object/{bucket}/{key}` and are authorized
//! with the service key as a bearer token. Public objects are served from
//! `{url}/storage/v1/object/public/{bucket}/{key}`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{validate_key, ObjectStore, StorageError, StorageResult};
use crate::config::DEFAULT_BUCKET;

/// REST object store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestStoreConfig {
    pub url: String,
    pub bucket: String,
    #[serde(skip_serializing)]
    pub service_key: String,
    pub timeout_seconds: u64,
}

impl Default for RestStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            bucket: DEFAULT_BUCKET.to_string(),
            service_key: String::new(),
            timeout_seconds: 300,
        }
    }
}

pub struct RestStore {
    config: RestStoreConfig,
    http_client: Client,
    base_url: Url,
}

impl RestStore {
    pub fn new(config: RestStoreConfig) -> StorageResult<Self> {
        info!("Initializing REST object store for bucket: {}", config.bucket);

        let base_url = Url::parse(&config.url)
            .map_err(|e| StorageError::Other(format!("Invalid storage URL: {}", e)))?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(Self::build_headers(&config.service_key)?)
            .build()
            .map_err(|e| StorageError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            base_url,
        })
    }

    fn build_headers(service_key: &str) -> StorageResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", service_key))
            .map_err(|_| StorageError::Other("Service key is not a valid header".to_string()))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let mut api_key = HeaderValue::from_str(service_key)
            .map_err(|_| StorageError::Other("Service key is not a valid header".to_string()))?;
        api_key.set_sensitive(true);
        headers.insert("apikey", api_key);

        Ok(headers)
    }

    /// `{url}/storage/v1/{prefix..}/{bucket}/{key segments..}` with each segment escaped
    fn object_url(&self, prefix: &[&str], key: &str) -> StorageResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Other("Storage URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1"])
            .extend(prefix)
            .push(&self.config.bucket)
            .extend(key.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    async fn error_from_response(response: reqwest::Response, op: &str) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("Storage {} failed: {} - {}", op, status, body);
        map_status(status, format!("{} failed with {}", op, status))
    }
}

fn map_status(status: StatusCode, message: String) -> StorageError {
    match status {
        StatusCode::NOT_FOUND => StorageError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::PermissionDenied(message),
        StatusCode::PAYLOAD_TOO_LARGE => StorageError::TooLarge(message),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            StorageError::Unavailable(message)
        }
        _ => StorageError::Other(message),
    }
}

fn map_transport(err: reqwest::Error) -> StorageError {
    if err.is_timeout() || err.is_connect() {
        StorageError::Unavailable(err.to_string())
    } else {
        StorageError::Other(err.to_string())
    }
}

#[async_trait]
impl ObjectStore for RestStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        debug!("Uploading object: {} ({} bytes)", key, data.len());

        let url = self.object_url(&["object"], key)?;
        let response = self
            .http_client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, "upload").await);
        }

        info!("Object uploaded: {}", key);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        debug!("Downloading object: {}", key);

        let url = self.object_url(&["object", "authenticated"], key)?;
        let response = self.http_client.get(url).send().await.map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, "download").await);
        }

        let data = response.bytes().await.map_err(map_transport)?;
        debug!("Object downloaded: {} ({} bytes)", key, data.len());
        Ok(data)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        debug!("Deleting object: {}", key);

        let url = self.object_url(&["object"], key)?;
        let response = self
            .http_client
            .delete(url)
            .send()
            .await
            .map_err(map_transport)?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            info!("Object deleted: {}", key);
            Ok(())
        } else {
            Err(Self::error_from_response(response, "delete").await)
        }
    }

    fn public_url(&self, key: &str) -> Option<String> {
        self.object_url(&["object", "public"], key)
            .ok()
            .map(String::from)
    }

    async fn health_check(&self) -> StorageResult<()> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Other("Storage URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "bucket"])
            .push(&self.config.bucket);

        let response = self.http_client.get(url).send().await.map_err(map_transport)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(response, "bucket check").await)
        }
    }

    fn backend_name(&self) -> &'static str {
        "rest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RestStore {
        RestStore::new(RestStoreConfig {
            url: "https://project.example.co/".to_string(),
            service_key: "service-role-key".to_string(),
            ..RestStoreConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_rest_config_default() {
        let config = RestStoreConfig::default();
        assert_eq!(config.bucket, "uploads");
        assert_eq!(config.timeout_seconds, 300);
    }

    #[test]
    fn test_public_url_escapes_segments() {
        let url = store().public_url("user-1/1700000000000_my report.pdf").unwrap();
        assert_eq!(
            url,
            "https://project.example.co/storage/v1/object/public/uploads/user-1/1700000000000_my%20report.pdf"
        );
    }

    #[test]
    fn test_object_url() {
        let url = store().object_url(&["object"], "u/1_a.txt").unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.example.co/storage/v1/object/uploads/u/1_a.txt"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, String::new()),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, String::new()),
            StorageError::PermissionDenied(_)
        ));
        assert!(matches!(
            map_status(StatusCode::PAYLOAD_TOO_LARGE, String::new()),
            StorageError::TooLarge(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, String::new()),
            StorageError::Unavailable(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, String::new()),
            StorageError::Other(_)
        ));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = RestStore::new(RestStoreConfig {
            url: "not a url".to_string(),
            ..RestStoreConfig::default()
        });
        assert!(result.is_err());
    }
}
