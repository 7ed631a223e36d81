//! Media gateway: image uploads against an object store

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use aws_sdk_s3::{Client, error::DisplayErrorContext, primitives::ByteStream};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::{SocialError, SocialResult};

#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Store the bytes and return the public URL of the new object
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> SocialResult<String>;

    async fn delete(&self, url: &str) -> SocialResult<()>;

    /// Whether `url` points into this gateway's storage
    fn owns(&self, url: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub bucket: String,
    pub public_base_url: String,
    pub prefix: String,
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

fn object_key(prefix: &str, content_type: &str) -> String {
    let name = format!("{}.{}", Uuid::new_v4(), extension_for(content_type));
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn key_from_url(base_url: &str, url: &str) -> Option<String> {
    let key = url
        .strip_prefix(base_url.trim_end_matches('/'))?
        .strip_prefix('/')?;
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// S3-backed gateway; objects are served from `public_base_url`
#[derive(Clone)]
pub struct S3MediaGateway {
    client: Client,
    config: MediaConfig,
}

impl S3MediaGateway {
    pub fn new(client: Client, config: MediaConfig) -> Self {
        Self { client, config }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.config.public_base_url.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl MediaGateway for S3MediaGateway {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> SocialResult<String> {
        let key = object_key(&self.config.prefix, content_type);
        info!("Uploading {} bytes to S3: {}", bytes.len(), key);

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| SocialError::Media(DisplayErrorContext(&e).to_string()))?;

        Ok(self.url_for(&key))
    }

    async fn delete(&self, url: &str) -> SocialResult<()> {
        let key = key_from_url(&self.config.public_base_url, url).ok_or_else(|| {
            SocialError::Media(format!("URL is not in the media bucket: {}", url))
        })?;
        info!("Deleting S3 object: {}", key);

        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| SocialError::Media(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    fn owns(&self, url: &str) -> bool {
        key_from_url(&self.config.public_base_url, url).is_some()
    }
}

/// Gateway keeping objects in memory, for tests and local runs
pub struct InMemoryMediaGateway {
    base_url: String,
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl Default for InMemoryMediaGateway {
    fn default() -> Self {
        Self::new("memory://media")
    }
}

impl InMemoryMediaGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, url: &str) -> bool {
        match key_from_url(&self.base_url, url) {
            Some(key) => self.objects.lock().await.contains_key(&key),
            None => false,
        }
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl MediaGateway for InMemoryMediaGateway {
    async fn upload(&self, bytes: Vec<u8>, content_type: &str) -> SocialResult<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(SocialError::Media("upload rejected".to_string()));
        }
        let key = object_key("", content_type);
        self.objects
            .lock()
            .await
            .insert(key.clone(), (bytes, content_type.to_string()));
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn delete(&self, url: &str) -> SocialResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SocialError::Media("delete rejected".to_string()));
        }
        let key = key_from_url(&self.base_url, url)
            .ok_or_else(|| SocialError::Media(format!("Unknown media URL: {}", url)))?;
        self.objects.lock().await.remove(&key);
        Ok(())
    }

    fn owns(&self, url: &str) -> bool {
        key_from_url(&self.base_url, url).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_and_typed() {
        let key = object_key("/profiles/", "image/png");
        assert!(key.starts_with("profiles/"));
        assert!(key.ends_with(".png"));
        assert!(object_key("", "image/jpeg").ends_with(".jpg"));
    }

    #[test]
    fn urls_map_back_to_keys() {
        let base = "https://cdn.example.com/linkup/";
        assert_eq!(
            key_from_url(base, "https://cdn.example.com/linkup/posts/a.jpg").as_deref(),
            Some("posts/a.jpg")
        );
        assert_eq!(key_from_url(base, "https://other.example.com/posts/a.jpg"), None);
        assert_eq!(key_from_url(base, "https://cdn.example.com/linkup/"), None);
        assert_eq!(key_from_url(base, "https://cdn.example.com/linkupx/a.jpg"), None);
    }

    #[tokio::test]
    async fn memory_gateway_round_trip() {
        let gateway = InMemoryMediaGateway::default();
        let url = gateway.upload(vec![1, 2, 3], "image/webp").await.unwrap();
        assert!(gateway.owns(&url));
        assert!(gateway.contains(&url).await);

        gateway.delete(&url).await.unwrap();
        assert_eq!(gateway.object_count().await, 0);
        assert!(gateway.delete("https://elsewhere/x.png").await.is_err());
    }
}
