//! End-to-end capture flows against the simulated camera and memory store.

use std::io::Cursor;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use plantcare_camera::DeviceFault;
use plantcare_camera::sys::simulated::{Readiness, SimulatedCamera, SimulatedSurface};
use plantcare_capture::{
    AcquireError, CaptureError, CapturePhase, CaptureSession, ImageSource, SessionConfig,
    SessionError, SessionEvent, Severity, StartOutcome, UploadStatus,
};
use plantcare_storage::{MemoryStore, StoreError};

type Session = CaptureSession<SimulatedCamera, SimulatedSurface, MemoryStore>;

struct Rig {
    session: Session,
    camera: SimulatedCamera,
    surface: SimulatedSurface,
    store: MemoryStore,
}

fn rig() -> Rig {
    let _ = env_logger::builder().is_test(true).try_init();
    let camera = SimulatedCamera::new();
    let surface = SimulatedSurface::new();
    let store = MemoryStore::default();
    let session = CaptureSession::new(
        camera.clone(),
        surface.clone(),
        store.clone(),
        SessionConfig::default(),
    );
    Rig {
        session,
        camera,
        surface,
        store,
    }
}

fn leaf_jpg() -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 12, Rgb([46, 139, 87])))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

fn drain(events: &async_channel::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

#[tokio::test]
async fn start_goes_live_with_one_stream() {
    let rig = rig();
    let outcome = rig.session.start().await.unwrap();

    let snapshot = rig.session.snapshot();
    assert_eq!(snapshot.phase, CapturePhase::Live);
    assert!(matches!(outcome, StartOutcome::Started(handle) if snapshot.stream == Some(handle)));
    assert_eq!(rig.camera.live_streams(), 1);
    assert!(rig.surface.is_attached());
}

#[tokio::test]
async fn start_while_live_does_nothing() {
    let rig = rig();
    rig.session.start().await.unwrap();
    assert_eq!(
        rig.session.start().await.unwrap(),
        StartOutcome::AlreadyLive
    );
    assert_eq!(rig.camera.requests().len(), 1);
    assert_eq!(rig.camera.peak_live_streams(), 1);
}

#[tokio::test]
async fn rapid_double_start_opens_one_stream() {
    let rig = rig();
    rig.camera.set_grant_delay(Duration::from_millis(30));

    let (first, second) = tokio::join!(rig.session.start(), rig.session.start());

    assert!(matches!(first.unwrap(), StartOutcome::Started(_)));
    assert_eq!(second.unwrap(), StartOutcome::InFlight);
    assert_eq!(rig.camera.requests().len(), 1);
    assert_eq!(rig.camera.peak_live_streams(), 1);
}

#[tokio::test]
async fn start_cancel_cycles_never_overlap() {
    let rig = rig();
    for _ in 0..5 {
        rig.session.start().await.unwrap();
        rig.session.cancel();
        assert_eq!(rig.camera.live_streams(), 0);
    }
    assert_eq!(rig.session.phase(), CapturePhase::Idle);
    assert_eq!(rig.camera.peak_live_streams(), 1);
}

#[tokio::test]
async fn cancel_during_start_releases_the_late_stream() {
    let rig = rig();
    rig.camera.set_grant_delay(Duration::from_millis(50));

    let (outcome, ()) = tokio::join!(rig.session.start(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        rig.session.cancel();
    });

    assert_eq!(outcome.unwrap(), StartOutcome::Superseded);
    assert_eq!(rig.session.phase(), CapturePhase::Idle);
    assert_eq!(rig.camera.live_streams(), 0);
    assert!(!rig.surface.is_attached());
}

#[tokio::test]
async fn cancel_then_restart_during_prompt_opens_one_stream() {
    let rig = rig();
    rig.camera.set_grant_delay(Duration::from_millis(50));

    let (first, second) = tokio::join!(rig.session.start(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        rig.session.cancel();
        rig.session.start().await
    });

    assert_eq!(first.unwrap(), StartOutcome::Superseded);
    assert!(matches!(second.unwrap(), StartOutcome::Started(_)));
    assert_eq!(rig.session.phase(), CapturePhase::Live);
    assert_eq!(rig.camera.live_streams(), 1);
    assert_eq!(rig.camera.peak_live_streams(), 1);
}

#[tokio::test]
async fn start_dropped_during_prompt_returns_to_idle() {
    let rig = rig();
    let events = rig.session.subscribe();
    rig.camera.set_grant_delay(Duration::from_millis(50));

    let started = tokio::time::timeout(Duration::from_millis(10), rig.session.start()).await;
    assert!(started.is_err());
    assert_eq!(rig.session.phase(), CapturePhase::Idle);
    assert_eq!(rig.session.snapshot().stream, None);
    assert_eq!(
        drain(&events),
        [
            SessionEvent::PhaseChanged(CapturePhase::Starting),
            SessionEvent::PhaseChanged(CapturePhase::Idle),
        ]
    );

    rig.camera.set_grant_delay(Duration::ZERO);
    assert!(matches!(
        rig.session.start().await.unwrap(),
        StartOutcome::Started(_)
    ));
    assert_eq!(rig.camera.live_streams(), 1);
}

#[tokio::test]
async fn start_dropped_before_ready_releases_the_stream() {
    let rig = rig();
    rig.surface
        .set_readiness(Readiness::Delayed(Duration::from_millis(100)));

    let started = tokio::time::timeout(Duration::from_millis(20), rig.session.start()).await;
    assert!(started.is_err());
    assert_eq!(rig.session.phase(), CapturePhase::Idle);
    assert_eq!(rig.camera.live_streams(), 0);
    assert!(!rig.surface.is_attached());

    rig.surface.set_readiness(Readiness::Immediate);
    rig.session.retry_start().await.unwrap();
    assert_eq!(rig.session.phase(), CapturePhase::Live);
    assert_eq!(rig.camera.peak_live_streams(), 1);
}

#[tokio::test]
async fn missing_rear_camera_falls_back_to_any_camera() {
    let rig = rig();
    rig.camera.without_environment_camera();

    assert!(matches!(
        rig.session.start().await.unwrap(),
        StartOutcome::Started(_)
    ));
    let requests = rig.camera.requests();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].is_relaxed());
    assert!(requests[1].is_relaxed());
    assert_eq!(rig.camera.live_streams(), 1);
}

#[tokio::test]
async fn denied_permission_reports_and_holds_no_stream() {
    let rig = rig();
    let events = rig.session.subscribe();
    rig.camera
        .fail_next(DeviceFault::new("NotAllowedError", "Permission denied"));

    let err = rig.session.start().await.unwrap_err();
    assert_eq!(err, SessionError::Acquire(AcquireError::PermissionDenied));

    let snapshot = rig.session.snapshot();
    assert_eq!(snapshot.phase, CapturePhase::PermissionError);
    assert!(snapshot.error_message().unwrap().contains("denied"));
    assert!(snapshot.can_retry());
    assert!(snapshot.offers_file_selection());
    assert_eq!(snapshot.stream, None);
    assert_eq!(rig.camera.live_streams(), 0);
    // Denial is not worth a relaxed second prompt.
    assert_eq!(rig.camera.requests().len(), 1);

    let events = drain(&events);
    assert_eq!(events[0], SessionEvent::PhaseChanged(CapturePhase::Starting));
    assert_eq!(
        events[1],
        SessionEvent::PhaseChanged(CapturePhase::PermissionError)
    );
    assert!(matches!(
        &events[2],
        SessionEvent::Notice(notice)
            if notice.title == "Camera error" && notice.severity == Severity::Destructive
    ));
}

#[tokio::test]
async fn retry_after_failure_goes_live() {
    let rig = rig();
    rig.camera
        .fail_next(DeviceFault::new("NotReadableError", "in use"));
    rig.camera
        .fail_next(DeviceFault::new("NotReadableError", "in use"));
    assert_eq!(
        rig.session.start().await.unwrap_err(),
        SessionError::Acquire(AcquireError::DeviceBusy)
    );
    assert!(rig.session.snapshot().can_retry());
    assert!(!rig.session.snapshot().offers_file_selection());

    assert!(matches!(
        rig.session.retry_start().await.unwrap(),
        StartOutcome::Started(_)
    ));
    assert_eq!(rig.session.phase(), CapturePhase::Live);
    assert_eq!(rig.session.snapshot().error, None);
}

#[tokio::test]
async fn capture_outside_live_is_rejected() {
    let rig = rig();
    let err = rig.session.capture().await.unwrap_err();
    assert_eq!(
        err,
        SessionError::InvalidPhase {
            operation: "capture",
            phase: CapturePhase::Idle,
        }
    );
    assert_eq!(rig.session.phase(), CapturePhase::Idle);
}

#[tokio::test]
async fn capture_before_first_frame_stays_live() {
    let rig = rig();
    rig.surface.set_auto_paint(false);
    rig.session.start().await.unwrap();

    let err = rig.session.capture().await.unwrap_err();
    assert_eq!(err, SessionError::Capture(CaptureError::SurfaceNotReady));
    assert_eq!(rig.session.phase(), CapturePhase::Live);
    assert_eq!(rig.camera.live_streams(), 1);

    rig.surface.paint();
    rig.session.capture().await.unwrap();
    assert_eq!(rig.session.phase(), CapturePhase::Captured);
}

#[tokio::test]
async fn capture_stops_stream_and_uploads() {
    let rig = rig();
    let events = rig.session.subscribe();
    rig.session.start().await.unwrap();

    let pending = rig.session.capture().await.unwrap();
    assert_eq!(rig.camera.live_streams(), 0);
    assert!(!rig.surface.is_attached());

    let snapshot = rig.session.snapshot();
    assert_eq!(snapshot.phase, CapturePhase::Captured);
    assert_eq!(snapshot.image_source, Some(ImageSource::Camera));
    assert_eq!(snapshot.upload_status, UploadStatus::NotStarted);
    assert!(snapshot.last_image.is_some());

    let status = pending.await;
    let UploadStatus::Succeeded(reference) = &status else {
        panic!("upload should succeed, got {status:?}");
    };
    assert_eq!(reference.bucket, "plant-images");
    assert!(rig.store.get(&reference.bucket, &reference.path).is_some());
    assert_eq!(rig.session.snapshot().upload_status, status);

    let events = drain(&events);
    assert!(events.contains(&SessionEvent::UploadFinished(status.clone())));
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::Notice(notice) if notice.title == "Image uploaded"
    )));

    let accepted = rig.session.accept().unwrap();
    assert!(accepted.image_data.starts_with("data:image/jpeg;base64,"));
    assert_eq!(
        accepted.image_path.as_deref(),
        Some(reference.public_url.as_str())
    );
    assert_eq!(rig.session.phase(), CapturePhase::Idle);
}

#[tokio::test]
async fn upload_failure_falls_back_to_local_image() {
    let rig = rig();
    rig.store
        .fail_next(StoreError::Network("connection reset".into()));
    rig.session.start().await.unwrap();
    let events = rig.session.subscribe();

    let status = rig.session.capture().await.unwrap().await;
    assert_eq!(status, UploadStatus::FailedLocalFallback);
    assert_eq!(rig.store.attempts(), 1);

    let snapshot = rig.session.snapshot();
    assert_eq!(snapshot.phase, CapturePhase::Captured);
    assert_eq!(snapshot.upload_status, UploadStatus::FailedLocalFallback);
    assert!(drain(&events).iter().any(|event| matches!(
        event,
        SessionEvent::Notice(notice)
            if notice.title == "Upload failed" && notice.severity == Severity::Destructive
    )));

    let accepted = rig.session.accept().unwrap();
    assert_eq!(accepted.image_path, None);
    assert!(accepted.image_data.starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn accept_waits_for_running_upload() {
    let rig = rig();
    rig.store.set_latency(Duration::from_millis(50));
    rig.session.start().await.unwrap();
    let pending = rig.session.capture().await.unwrap();

    let (status, ()) = tokio::join!(pending.into_future(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            rig.session.snapshot().upload_status,
            UploadStatus::InProgress
        );
        assert_eq!(
            rig.session.accept().unwrap_err(),
            SessionError::UploadInProgress
        );
    });

    assert!(status.is_settled());
    assert!(rig.session.accept().unwrap().image_path.is_some());
}

#[tokio::test]
async fn retake_discards_previous_image() {
    let rig = rig();
    rig.session.start().await.unwrap();
    let first = rig.session.capture().await.unwrap();

    assert!(matches!(
        rig.session.retake().await.unwrap(),
        StartOutcome::Started(_)
    ));
    let snapshot = rig.session.snapshot();
    assert_eq!(snapshot.phase, CapturePhase::Live);
    assert_eq!(snapshot.last_image, None);
    assert_eq!(snapshot.upload_status, UploadStatus::NotStarted);
    assert_eq!(rig.camera.live_streams(), 1);

    // The old upload still runs but no longer touches the session.
    assert!(first.await.is_settled());
    assert_eq!(rig.session.phase(), CapturePhase::Live);

    let second = rig.session.capture().await.unwrap();
    assert!(second.generation() > 1);
    second.await;
    assert_eq!(rig.camera.peak_live_streams(), 1);
}

#[tokio::test]
async fn retake_outside_captured_is_rejected() {
    let rig = rig();
    assert!(matches!(
        rig.session.retake().await,
        Err(SessionError::InvalidPhase {
            phase: CapturePhase::Idle,
            ..
        })
    ));
}

#[tokio::test]
async fn denied_camera_can_fall_back_to_file() {
    let rig = rig();
    rig.camera
        .fail_next(DeviceFault::new("NotAllowedError", "Permission denied"));
    rig.session.start().await.unwrap_err();

    let pending = rig.session.upload_file(leaf_jpg()).unwrap();
    let snapshot = rig.session.snapshot();
    assert_eq!(snapshot.phase, CapturePhase::Captured);
    assert_eq!(snapshot.image_source, Some(ImageSource::File));
    assert_eq!(snapshot.error, None);

    let status = pending.await;
    assert!(status.is_settled());
    assert_eq!(rig.session.snapshot().upload_status, status);
    assert_eq!(rig.camera.live_streams(), 0);
}

#[tokio::test]
async fn file_selection_rejects_non_images() {
    let rig = rig();
    assert!(matches!(
        rig.session.upload_file(b"not an image".to_vec()),
        Err(SessionError::File(_))
    ));
    assert_eq!(rig.session.phase(), CapturePhase::Idle);
}

#[tokio::test]
async fn file_selection_while_live_is_rejected() {
    let rig = rig();
    rig.session.start().await.unwrap();
    assert!(matches!(
        rig.session.upload_file(leaf_jpg()),
        Err(SessionError::InvalidPhase {
            phase: CapturePhase::Live,
            ..
        })
    ));
}

#[tokio::test]
async fn dropped_upload_does_not_leave_progress_stuck() {
    let rig = rig();
    rig.store.set_latency(Duration::from_millis(200));
    rig.session.start().await.unwrap();
    let pending = rig.session.capture().await.unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
    assert!(timed_out.is_err());
    assert_eq!(
        rig.session.snapshot().upload_status,
        UploadStatus::FailedLocalFallback
    );
}

#[tokio::test]
async fn ready_timeout_surfaces_as_error() {
    let rig = rig();
    rig.surface.set_readiness(Readiness::Never);
    let mut config = SessionConfig::default();
    config.acquire.ready_timeout_ms = 20;
    let session = CaptureSession::new(
        rig.camera.clone(),
        rig.surface.clone(),
        rig.store.clone(),
        config,
    );

    assert_eq!(
        session.start().await.unwrap_err(),
        SessionError::Acquire(AcquireError::Aborted)
    );
    assert_eq!(session.phase(), CapturePhase::PermissionError);
    assert_eq!(rig.camera.live_streams(), 0);
}

#[tokio::test]
async fn dropping_the_session_releases_the_camera() {
    let rig = rig();
    rig.session.start().await.unwrap();
    assert_eq!(rig.camera.live_streams(), 1);

    drop(rig.session);
    assert_eq!(rig.camera.live_streams(), 0);
}
