use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_channel::Receiver;
use futures::lock::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use log::{debug, info, warn};
use plantcare_camera::{EncodedImage, FrameCapturer, MediaAcquirer, MediaDevices, Surface};
use plantcare_storage::{ObjectStore, UploadRelay};

use crate::events::EventHub;
use crate::{
    AcceptedImage, CapturePhase, ImageSource, Notice, PendingUpload, SessionConfig, SessionError,
    SessionEvent, SessionSnapshot, StartOutcome, StreamHandle, UploadStatus,
};

pub(crate) enum Phase {
    Idle,
    Starting,
    Live {
        stream: StreamHandle,
    },
    Captured {
        image: EncodedImage,
        source: ImageSource,
        upload: UploadStatus,
        generation: u64,
    },
    PermissionError {
        reason: plantcare_camera::AcquireError,
    },
}

impl Phase {
    const fn tag(&self) -> CapturePhase {
        match self {
            Self::Idle => CapturePhase::Idle,
            Self::Starting => CapturePhase::Starting,
            Self::Live { .. } => CapturePhase::Live,
            Self::Captured { .. } => CapturePhase::Captured,
            Self::PermissionError { .. } => CapturePhase::PermissionError,
        }
    }
}

pub(crate) struct State {
    phase: Phase,
    // Bumped by every start and cancel; a start whose attempt is no longer
    // current discards its result.
    attempt: u64,
    // Bumped for every new image; upload results for older images are ignored.
    generation: u64,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    events: EventHub,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: &SessionEvent) {
        self.events.emit(event);
    }

    fn emit_phase(&self, phase: CapturePhase) {
        debug!("capture session -> {phase}");
        self.emit(&SessionEvent::PhaseChanged(phase));
    }

    /// Move the upload status of image `generation` forward. Returns `false`
    /// if that image is no longer held or the move would go backwards.
    pub(crate) fn advance_upload(&self, generation: u64, next: UploadStatus) -> bool {
        let mut state = self.lock();
        match &mut state.phase {
            Phase::Captured {
                upload,
                generation: current,
                ..
            } if *current == generation && upload.can_advance_to(&next) => {
                *upload = next;
                true
            }
            _ => false,
        }
    }
}

// Returns the session to Idle when a start future is dropped before it
// settles. Dropping the device half of the start stops its stream.
struct StartGuard {
    shared: Arc<Shared>,
    attempt: u64,
    armed: bool,
}

impl StartGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StartGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.lock();
        if state.attempt != self.attempt || !matches!(state.phase, Phase::Starting) {
            return;
        }
        state.attempt += 1;
        state.phase = Phase::Idle;
        drop(state);
        warn!("start attempt {} abandoned", self.attempt);
        self.shared.emit_phase(CapturePhase::Idle);
    }
}

/// Drives one add-a-plant camera flow.
///
/// All operations take `&self`; the session is meant to be shared with the
/// UI event handlers. The camera is exclusive to the session and is only
/// left running while the session is [`CapturePhase::Live`].
pub struct CaptureSession<D, S, O>
where
    D: MediaDevices,
    S: Surface<D::Stream>,
    O: ObjectStore,
{
    shared: Arc<Shared>,
    device: AsyncMutex<MediaAcquirer<D, S>>,
    capturer: FrameCapturer,
    relay: UploadRelay<O>,
}

impl<D, S, O> CaptureSession<D, S, O>
where
    D: MediaDevices,
    S: Surface<D::Stream>,
    O: ObjectStore + 'static,
{
    /// Create an idle session.
    pub fn new(devices: D, surface: S, store: O, config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    phase: Phase::Idle,
                    attempt: 0,
                    generation: 0,
                }),
                events: EventHub::default(),
            }),
            device: AsyncMutex::new(MediaAcquirer::new(devices, surface, config.acquire)),
            capturer: FrameCapturer::new(config.capture),
            relay: UploadRelay::new(store, config.relay),
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Current phase.
    pub fn phase(&self) -> CapturePhase {
        self.shared.lock().phase.tag()
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.lock();
        let mut snapshot = SessionSnapshot {
            phase: state.phase.tag(),
            stream: None,
            last_image: None,
            image_source: None,
            upload_status: UploadStatus::NotStarted,
            error: None,
        };
        match &state.phase {
            Phase::Live { stream } => snapshot.stream = Some(*stream),
            Phase::Captured {
                image,
                source,
                upload,
                ..
            } => {
                snapshot.last_image = Some(image.clone());
                snapshot.image_source = Some(*source);
                snapshot.upload_status = upload.clone();
            }
            Phase::PermissionError { reason } => snapshot.error = Some(reason.clone()),
            Phase::Idle | Phase::Starting => {}
        }
        snapshot
    }

    /// The upload relay images are handed to.
    pub const fn relay(&self) -> &UploadRelay<O> {
        &self.relay
    }

    /// Start the camera preview.
    ///
    /// Valid from `Idle` and `PermissionError`. While another start is in
    /// flight this returns [`StartOutcome::InFlight`] without touching the
    /// device. Dropping the future before it resolves returns the session to
    /// `Idle` with no stream live.
    ///
    /// # Errors
    /// Returns [`SessionError::Acquire`] if the camera cannot be started; the
    /// session is then in `PermissionError` with no stream live.
    pub async fn start(&self) -> Result<StartOutcome, SessionError> {
        self.begin_start("start the camera", |phase| {
            matches!(phase, Phase::Idle | Phase::PermissionError { .. })
        })
        .await
    }

    /// Try again after a failed start. Same as [`start`](Self::start).
    ///
    /// # Errors
    /// See [`start`](Self::start).
    pub async fn retry_start(&self) -> Result<StartOutcome, SessionError> {
        self.start().await
    }

    /// Discard the captured image and restart the camera.
    ///
    /// The image and its upload status are gone before the new stream is
    /// requested; a late upload result for it is ignored.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidPhase`] outside `Captured`, otherwise
    /// see [`start`](Self::start).
    pub async fn retake(&self) -> Result<StartOutcome, SessionError> {
        self.begin_start("retake", |phase| matches!(phase, Phase::Captured { .. }))
            .await
    }

    async fn begin_start(
        &self,
        operation: &'static str,
        allowed: fn(&Phase) -> bool,
    ) -> Result<StartOutcome, SessionError> {
        let attempt = {
            let mut state = self.shared.lock();
            match &state.phase {
                Phase::Starting => return Ok(StartOutcome::InFlight),
                Phase::Live { .. } => return Ok(StartOutcome::AlreadyLive),
                phase if !allowed(phase) => {
                    return Err(SessionError::InvalidPhase {
                        operation,
                        phase: phase.tag(),
                    });
                }
                Phase::Captured { generation, .. } => debug!("discarding image {generation}"),
                Phase::Idle | Phase::PermissionError { .. } => {}
            }
            state.attempt += 1;
            state.phase = Phase::Starting;
            state.attempt
        };
        let guard = StartGuard {
            shared: Arc::clone(&self.shared),
            attempt,
            armed: true,
        };
        self.shared.emit_phase(CapturePhase::Starting);

        let mut device = self.device.lock().await;
        let outcome = self.run_start(&mut device, attempt).await;
        self.release_device(device);
        guard.disarm();
        outcome
    }

    async fn run_start(
        &self,
        device: &mut MediaAcquirer<D, S>,
        attempt: u64,
    ) -> Result<StartOutcome, SessionError> {
        if self.shared.lock().attempt != attempt {
            debug!("start attempt {attempt} cancelled before reaching the device");
            return Ok(StartOutcome::Superseded);
        }

        let result = device.start().await;

        let mut state = self.shared.lock();
        if state.attempt != attempt || !matches!(state.phase, Phase::Starting) {
            if let Ok(handle) = result {
                info!("discarding {handle}: session moved on while it started");
            }
            return Ok(StartOutcome::Superseded);
        }

        match result {
            Ok(handle) => {
                state.phase = Phase::Live { stream: handle };
                drop(state);
                self.shared.emit_phase(CapturePhase::Live);
                Ok(StartOutcome::Started(handle))
            }
            Err(err) => {
                state.phase = Phase::PermissionError {
                    reason: err.clone(),
                };
                drop(state);
                warn!("camera start failed: {err}");
                self.shared.emit_phase(CapturePhase::PermissionError);
                self.shared.emit(&SessionEvent::Notice(Notice::destructive(
                    "Camera error",
                    err.user_message(),
                )));
                Err(SessionError::Acquire(err))
            }
        }
    }

    // The device may only stay live while the session is Live on that very
    // stream. Called before every device guard is released.
    fn release_device(&self, mut device: AsyncMutexGuard<'_, MediaAcquirer<D, S>>) {
        let state = self.shared.lock();
        let keep = match state.phase {
            Phase::Live { stream } => device.active() == Some(stream),
            _ => false,
        };
        if !keep && device.stop_active() {
            debug!("released camera while {}", state.phase.tag());
        }
        drop(device);
        drop(state);
    }

    /// Capture the current preview frame.
    ///
    /// The stream is always stopped after a successful capture. The image is
    /// kept locally; spawn the returned [`PendingUpload`] to store it
    /// remotely.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidPhase`] outside `Live`, and
    /// [`SessionError::Capture`] if no frame could be read; the session stays
    /// `Live` in that case.
    pub async fn capture(&self) -> Result<PendingUpload, SessionError> {
        let stream = self.live_stream()?;
        let mut device = self.device.lock().await;
        let result = self.capture_frame(&mut device, stream);
        self.release_device(device);

        let (image, generation) = result?;
        info!("captured {image:?} from {stream}");
        self.shared.emit_phase(CapturePhase::Captured);
        Ok(self.pending_upload(image, generation))
    }

    fn live_stream(&self) -> Result<StreamHandle, SessionError> {
        match self.shared.lock().phase {
            Phase::Live { stream } => Ok(stream),
            ref other => Err(SessionError::InvalidPhase {
                operation: "capture",
                phase: other.tag(),
            }),
        }
    }

    fn capture_frame(
        &self,
        device: &mut MediaAcquirer<D, S>,
        stream: StreamHandle,
    ) -> Result<(EncodedImage, u64), SessionError> {
        // Re-check now that the device is ours; a cancel may have landed
        // while waiting for it.
        if self.live_stream()? != stream {
            return Err(SessionError::Superseded);
        }

        let image = self.capturer.capture(device.surface())?;
        device.stop(stream);

        let mut state = self.shared.lock();
        if !matches!(state.phase, Phase::Live { stream: live } if live == stream) {
            return Err(SessionError::Superseded);
        }
        state.generation += 1;
        let generation = state.generation;
        state.phase = Phase::Captured {
            image: image.clone(),
            source: ImageSource::Camera,
            upload: UploadStatus::NotStarted,
            generation,
        };
        Ok((image, generation))
    }

    /// Use an image file instead of the camera.
    ///
    /// Valid from `Idle` and `PermissionError`; the image goes through the
    /// same upload path as a capture.
    ///
    /// # Errors
    /// Returns [`SessionError::File`] if `bytes` is not a supported image and
    /// [`SessionError::InvalidPhase`] in any other phase.
    pub fn upload_file(&self, bytes: Vec<u8>) -> Result<PendingUpload, SessionError> {
        let image = EncodedImage::from_bytes(bytes)?;
        let generation = {
            let mut state = self.shared.lock();
            if !matches!(state.phase, Phase::Idle | Phase::PermissionError { .. }) {
                return Err(SessionError::InvalidPhase {
                    operation: "select a file",
                    phase: state.phase.tag(),
                });
            }
            state.generation += 1;
            let generation = state.generation;
            state.phase = Phase::Captured {
                image: image.clone(),
                source: ImageSource::File,
                upload: UploadStatus::NotStarted,
                generation,
            };
            generation
        };
        info!("selected {image:?} from file");
        self.shared.emit_phase(CapturePhase::Captured);
        Ok(self.pending_upload(image, generation))
    }

    fn pending_upload(&self, image: EncodedImage, generation: u64) -> PendingUpload {
        PendingUpload::new(
            Arc::clone(&self.shared),
            self.relay.clone(),
            image,
            generation,
        )
    }

    /// Hand the captured image over to the plant form and return to `Idle`.
    ///
    /// # Errors
    /// Returns [`SessionError::UploadInProgress`] while the upload is
    /// running and [`SessionError::InvalidPhase`] outside `Captured`.
    pub fn accept(&self) -> Result<AcceptedImage, SessionError> {
        let mut state = self.shared.lock();
        let accepted = match &state.phase {
            Phase::Captured {
                upload: UploadStatus::InProgress,
                ..
            } => return Err(SessionError::UploadInProgress),
            Phase::Captured { image, upload, .. } => AcceptedImage {
                image: image.clone(),
                image_data: image.to_data_url(),
                image_path: upload.reference().map(|r| r.public_url.clone()),
            },
            other => {
                return Err(SessionError::InvalidPhase {
                    operation: "accept",
                    phase: other.tag(),
                });
            }
        };
        state.phase = Phase::Idle;
        drop(state);
        self.shared.emit_phase(CapturePhase::Idle);
        Ok(accepted)
    }

    /// Return to `Idle` from any phase, releasing the camera.
    ///
    /// A start still waiting on the platform is not interrupted; its stream
    /// is stopped as soon as it arrives. Uploads keep running but their
    /// results are ignored.
    pub fn cancel(&self) {
        let mut state = self.shared.lock();
        state.attempt += 1;
        let previous = mem::replace(&mut state.phase, Phase::Idle);
        match self.device.try_lock() {
            Some(mut device) => {
                device.stop_active();
            }
            None => debug!("camera busy; the pending operation will release it"),
        }
        drop(state);

        if !matches!(previous, Phase::Idle) {
            info!("capture session cancelled while {}", previous.tag());
            self.shared.emit_phase(CapturePhase::Idle);
        }
    }
}

impl<D, S, O> fmt::Debug for CaptureSession<D, S, O>
where
    D: MediaDevices,
    S: Surface<D::Stream>,
    O: ObjectStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}
