//! Upload timing against a slow store.

use std::time::{Duration, Instant};

use plantcare_camera::FrameCapturer;
use plantcare_camera::sys::simulated::leaf_frame;
use plantcare_storage::{MemoryStore, RelayConfig, StoreError, UploadError, UploadRelay};

#[tokio::test]
async fn upload_waits_for_the_store() {
    let store = MemoryStore::default();
    store.set_latency(Duration::from_millis(30));
    let relay = UploadRelay::new(store.clone(), RelayConfig::default());
    let image = FrameCapturer::default().encode(&leaf_frame(4, 4)).unwrap();

    let started = Instant::now();
    relay.upload(&image).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn network_failure_is_not_retried() {
    let store = MemoryStore::default();
    store.fail_next(StoreError::Network("connection reset".into()));
    let relay = UploadRelay::new(store.clone(), RelayConfig::default());
    let image = FrameCapturer::default().encode(&leaf_frame(4, 4)).unwrap();

    let err = relay.upload(&image).await.unwrap_err();
    assert!(matches!(err, UploadError::Store(StoreError::Network(_))));
    assert_eq!(store.attempts(), 1);

    // The queued fault is consumed; a later upload goes through.
    relay.upload(&image).await.unwrap();
    assert_eq!(store.attempts(), 2);
}
