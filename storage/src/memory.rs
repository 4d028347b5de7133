use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_timer::Delay;

use crate::{ObjectStore, StoreError, StoredObject};

/// An object held by [`MemoryStore`].
#[derive(Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Stored bytes.
    pub bytes: Vec<u8>,
    /// Content type given at upload.
    pub content_type: String,
}

impl fmt::Debug for StoredBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredBlob")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<(String, String), StoredBlob>,
    faults: VecDeque<StoreError>,
    latency: Duration,
    attempts: usize,
}

/// An in-memory object store.
///
/// Clones share the same buckets, so a test can keep a handle for
/// inspection and fault injection.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    base_url: String,
    inner: Arc<Mutex<Inner>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory://storage")
    }
}

impl MemoryStore {
    /// Create an empty store whose public URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            inner: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next write with `error`. Faults queue in order.
    pub fn fail_next(&self, error: StoreError) {
        self.lock().faults.push_back(error);
    }

    /// Delay every write.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Fetch a stored object.
    #[must_use]
    pub fn get(&self, bucket: &str, path: &str) -> Option<StoredBlob> {
        self.lock()
            .objects
            .get(&(bucket.to_owned(), path.to_owned()))
            .cloned()
    }

    /// Number of stored objects across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of writes attempted, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }
}

impl ObjectStore for MemoryStore {
    fn put(
        &self,
        bucket: &str,
        key: &str,
        payload: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> impl Future<Output = Result<StoredObject, StoreError>> + Send {
        let inner = Arc::clone(&self.inner);
        let id = (bucket.to_owned(), key.to_owned());
        let content_type = content_type.to_owned();
        async move {
            let latency = {
                let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
                guard.attempts += 1;
                guard.latency
            };
            if !latency.is_zero() {
                Delay::new(latency).await;
            }

            let mut guard = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(fault) = guard.faults.pop_front() {
                return Err(fault);
            }
            if !upsert && guard.objects.contains_key(&id) {
                return Err(StoreError::AlreadyExists(id.1));
            }
            let path = id.1.clone();
            guard.objects.insert(
                id,
                StoredBlob {
                    bytes: payload,
                    content_type,
                },
            );
            Ok(StoredObject { path })
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/object/public/{bucket}/{path}", self.base_url)
    }
}
