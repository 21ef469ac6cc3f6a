//! Object storage for variant images.
//!
//! The engine only needs two calls from storage: upload an object and get
//! back its public URL, and delete an object by key when a later persist step
//! fails. [`MemoryImageStore`] backs tests and local runs; the S3 backend is
//! available behind the `s3` feature.

#[cfg(feature = "s3")]
pub mod s3;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sitebuilder_core::{ProductId, StoreId, VariantId};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Errors returned by an [`ImageStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed for {key}: {message}")]
    Upload { key: String, message: String },

    #[error("delete failed for {key}: {message}")]
    Delete { key: String, message: String },

    #[error("storage configuration error: {0}")]
    Config(String),
}

/// Object storage interface.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload an object and return the URL it is served from.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Upload`] when the object cannot be written.
    async fn upload(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Delete an object by key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] when the object cannot be removed.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Key for an image uploaded while resolving a variant.
#[must_use]
pub fn variant_image_key(store_id: StoreId, variant_id: VariantId) -> String {
    format!("stores/{store_id}/variants/{variant_id}/{}", Uuid::new_v4())
}

/// Key for an image attached to an existing variant.
#[must_use]
pub fn attached_image_key(store_id: StoreId, product_id: ProductId, variant_id: VariantId) -> String {
    format!(
        "stores/{store_id}/products/{product_id}/variants/{variant_id}/{}",
        Uuid::new_v4()
    )
}

// =============================================================================
// In-memory store
// =============================================================================

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// In-process image store.
///
/// Uploads can be made to fail with [`MemoryImageStore::fail_uploads`] to
/// exercise the warning path of variant resolution.
#[derive(Debug)]
pub struct MemoryImageStore {
    base_url: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_uploads: AtomicBool,
}

impl MemoryImageStore {
    /// Create an empty store serving objects under `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
            fail_uploads: AtomicBool::new(false),
        }
    }

    /// Make every subsequent upload fail (or succeed again).
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Keys of all stored objects, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Fetch a stored object by key.
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{key}", self.base_url.trim_end_matches('/'))
    }
}

impl Default for MemoryImageStore {
    fn default() -> Self {
        Self::new("memory://images")
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: "uploads disabled".to_string(),
            });
        }
        self.objects.lock().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(self.url_for(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.lock().await.remove(key);
        Ok(())
    }
}
