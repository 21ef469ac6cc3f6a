//! S3-compatible image store.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use super::{ImageStore, StorageError};
use crate::config::StorageConfig;

/// Image store writing to an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3ImageStore {
    /// Build a client from the shared AWS configuration chain.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if the bucket name is empty.
    pub async fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        if config.bucket.trim().is_empty() {
            return Err(StorageError::Config("bucket is empty".to_string()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if config.force_path_style {
            s3_builder = s3_builder.force_path_style(true);
        }
        let client = Client::from_conf(s3_builder.build());

        let public_base_url = config.public_base_url.clone().unwrap_or_else(|| {
            default_public_base_url(
                &config.bucket,
                config.endpoint.as_deref(),
                config.region.as_deref(),
            )
        });

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            public_base_url,
        })
    }
}

fn default_public_base_url(bucket: &str, endpoint: Option<&str>, region: Option<&str>) -> String {
    match (endpoint, region) {
        (Some(endpoint), _) => format!("{}/{bucket}", endpoint.trim_end_matches('/')),
        (None, Some(region)) => format!("https://{bucket}.s3.{region}.amazonaws.com"),
        (None, None) => format!("https://{bucket}.s3.amazonaws.com"),
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn upload(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| StorageError::Upload {
                key: key.to_string(),
                message: err.to_string(),
            })?;

        debug!(bucket = %self.bucket, key, "Uploaded object");
        Ok(format!("{}/{key}", self.public_base_url.trim_end_matches('/')))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StorageError::Delete {
                key: key.to_string(),
                message: err.to_string(),
            })?;

        debug!(bucket = %self.bucket, key, "Deleted object");
        Ok(())
    }
}
