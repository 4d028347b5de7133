//! Best-effort image upload.
//!
//! [`UploadRelay`] turns a captured [`EncodedImage`] into a binary payload,
//! stores it under a fresh unique key in a fixed bucket of an
//! [`ObjectStore`], and returns a publicly resolvable [`RemoteReference`].
//! Callers treat every [`UploadError`] as a soft failure and keep the local
//! image.

#![warn(missing_docs)]

mod memory;
mod relay;

use std::future::Future;

use thiserror::Error;

pub use memory::{MemoryStore, StoredBlob};
pub use plantcare_camera::EncodedImage;
pub use relay::{RelayConfig, RemoteReference, UploadError, UploadRelay};

/// Errors reported by an object store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("network error: {0}")]
    Network(String),
    /// The session is not allowed to write to the bucket.
    #[error("not authorized to write to bucket {0}")]
    Unauthorized(String),
    /// The bucket is out of space.
    #[error("storage quota exceeded")]
    QuotaExceeded,
    /// An object already exists at the path and overwriting was not allowed.
    #[error("object already exists: {0}")]
    AlreadyExists(String),
    /// The store rejected the request for another reason.
    #[error("rejected by store: {0}")]
    Rejected(String),
}

/// Result of a successful [`ObjectStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Path of the object inside its bucket.
    pub path: String,
}

/// An external object store organised in buckets.
pub trait ObjectStore: Send + Sync {
    /// Store `payload` at `key` in `bucket`.
    ///
    /// # Errors
    /// Returns a [`StoreError`] describing why the write failed.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        payload: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> impl Future<Output = Result<StoredObject, StoreError>> + Send;

    /// Public URL for an object previously stored at `path`.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
