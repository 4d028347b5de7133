use std::fmt;
use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{EncodedImage, ObjectStore, StoreError};

/// Upload relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bucket every image is stored in.
    pub bucket: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bucket: "plant-images".into(),
        }
    }
}

/// Where an uploaded image lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteReference {
    /// Bucket the object was stored in.
    pub bucket: String,
    /// Object path within the bucket.
    pub path: String,
    /// Publicly resolvable URL.
    pub public_url: String,
}

/// Errors that can occur while uploading an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The image has no bytes to upload.
    #[error("image is empty")]
    EmptyPayload,
    /// The object store rejected the write.
    #[error("upload failed: {0}")]
    Store(#[from] StoreError),
}

/// Forwards captured images to an [`ObjectStore`].
///
/// Uploads are attempted once; there is no retry.
pub struct UploadRelay<O> {
    store: Arc<O>,
    config: Arc<RelayConfig>,
}

impl<O> Clone for UploadRelay<O> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

impl<O> fmt::Debug for UploadRelay<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRelay")
            .field("bucket", &self.config.bucket)
            .finish_non_exhaustive()
    }
}

impl<O: ObjectStore> UploadRelay<O> {
    /// Create a relay writing to `store`.
    pub fn new(store: O, config: RelayConfig) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &O {
        &self.store
    }

    /// The bucket images are written to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Upload `image` under a new unique key.
    ///
    /// # Errors
    /// Returns [`UploadError::EmptyPayload`] for an empty image, or
    /// [`UploadError::Store`] if the store rejects the write.
    pub async fn upload(&self, image: &EncodedImage) -> Result<RemoteReference, UploadError> {
        if image.is_empty() {
            return Err(UploadError::EmptyPayload);
        }

        let bucket = self.bucket();
        let key = format!("{}.{}", Uuid::new_v4(), image.mime().extension());
        let stored = self
            .store
            .put(
                bucket,
                &key,
                image.bytes().to_vec(),
                image.mime().as_str(),
                false,
            )
            .await
            .inspect_err(|e| warn!("upload of {key} to {bucket} failed: {e}"))?;

        let public_url = self.store.public_url(bucket, &stored.path);
        info!("uploaded {} bytes to {public_url}", image.len());
        Ok(RemoteReference {
            bucket: bucket.to_owned(),
            path: stored.path,
            public_url,
        })
    }
}
