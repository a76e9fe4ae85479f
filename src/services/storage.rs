// Object storage for supporting images (Supabase Storage HTTP API)

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::StorageConfig;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage returned HTTP {0}")]
    Status(u16),

    #[error("object not found: {0}")]
    NotFound(String),
}

/// Blob store keyed by object path.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key` and return the URL the object is served from.
    fn put<'a>(
        &'a self,
        key: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<String, StorageError>>;

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, StorageError>>;
}

pub struct SupabaseStorage {
    client: reqwest::Client,
    config: StorageConfig,
}

impl SupabaseStorage {
    pub fn new(client: reqwest::Client, config: StorageConfig) -> Self {
        Self { client, config }
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}", self.config.url, path)
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url, self.config.bucket, key
        )
    }
}

impl BlobStore for SupabaseStorage {
    fn put<'a>(
        &'a self,
        key: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        Box::pin(async move {
            let url = self.object_url(&format!("{}/{}", self.config.bucket, key));
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.config.service_role_key)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .timeout(REQUEST_TIMEOUT)
                .body(bytes)
                .send()
                .await?;

            let status = resp.status().as_u16();
            if status != 200 && status != 201 {
                return Err(StorageError::Status(status));
            }
            debug!("Uploaded {} to bucket {}", key, self.config.bucket);
            Ok(self.public_url(key))
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, StorageError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(self.object_url(key.trim_start_matches('/')))
                .bearer_auth(&self.config.service_role_key)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await?;

            match resp.status().as_u16() {
                200 => Ok(resp.bytes().await?.to_vec()),
                404 => Err(StorageError::NotFound(key.to_string())),
                status => Err(StorageError::Status(status)),
            }
        })
    }
}

/// Plain GET for images referenced by absolute URL.
pub async fn fetch_remote(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, StorageError> {
    let resp = client.get(url).timeout(REQUEST_TIMEOUT).send().await?;
    match resp.status().as_u16() {
        200 => Ok(resp.bytes().await?.to_vec()),
        status => Err(StorageError::Status(status)),
    }
}
