//! Camera stream lifecycle.

use std::fmt;
use std::pin::pin;
use std::time::Duration;

use futures::future::{Either, select};
use futures_timer::Delay;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    AcquireError, FacingMode, MediaDevices, MediaStream, Resolution, Surface, VideoConstraints,
};

/// Stream acquisition settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    /// How long to wait for the surface to report it can play.
    pub ready_timeout_ms: u64,
    /// Facing mode requested on the first attempt.
    pub preferred_facing: FacingMode,
    /// Ideal resolution requested on the first attempt.
    pub ideal_resolution: Option<Resolution>,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 10_000,
            preferred_facing: FacingMode::Environment,
            ideal_resolution: Some(Resolution::HD),
        }
    }
}

impl AcquireConfig {
    /// The ready window as a [`Duration`].
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Constraints used for the first attempt.
    #[must_use]
    pub const fn preferred_constraints(&self) -> VideoConstraints {
        VideoConstraints::preferred(self.preferred_facing, self.ideal_resolution)
    }
}

/// Token identifying one live stream owned by a [`MediaAcquirer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamHandle(u64);

impl StreamHandle {
    /// Numeric value of the handle.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

struct ActiveStream<St> {
    handle: StreamHandle,
    stream: St,
}

/// Owns at most one live camera stream and the surface it renders to.
///
/// Every exit path releases the device: [`stop`](Self::stop),
/// [`stop_active`](Self::stop_active), a failed [`start`](Self::start), a new
/// `start`, and dropping the acquirer.
pub struct MediaAcquirer<D, S>
where
    D: MediaDevices,
    S: Surface<D::Stream>,
{
    devices: D,
    surface: S,
    config: AcquireConfig,
    active: Option<ActiveStream<D::Stream>>,
    next_handle: u64,
}

impl<D, S> MediaAcquirer<D, S>
where
    D: MediaDevices,
    S: Surface<D::Stream>,
{
    /// Create an acquirer rendering to `surface`.
    pub fn new(devices: D, surface: S, config: AcquireConfig) -> Self {
        Self {
            devices,
            surface,
            config,
            active: None,
            next_handle: 1,
        }
    }

    /// Request a camera stream, bind it to the surface and wait until it can
    /// play.
    ///
    /// Any stream already live is stopped first. If the preferred constraints
    /// fail, one relaxed attempt is made unless access was denied outright.
    /// Dropping the returned future before it resolves stops the new stream.
    ///
    /// # Errors
    /// Returns the translated [`AcquireError`]. On error no stream is live.
    pub async fn start(&mut self) -> Result<StreamHandle, AcquireError> {
        self.stop_active();

        if !self.surface.is_mounted() {
            warn!("camera start requested before the surface was mounted");
            return Err(AcquireError::SurfaceUnavailable);
        }

        let stream = Self::open_stream(&self.devices, &self.config).await?;
        let handle = StreamHandle(self.next_handle);
        self.next_handle += 1;
        debug!("{handle} bound to surface (platform id {})", stream.id());

        let timeout = self.config.ready_timeout();
        let mut pending = PendingStream::attach(&mut self.surface, stream);
        if let Err(err) = Self::await_ready(&mut *pending.surface, timeout).await {
            warn!("{handle} failed to become ready: {err}");
            return Err(err);
        }
        let Some(stream) = pending.commit() else {
            return Err(AcquireError::Aborted);
        };

        self.active = Some(ActiveStream { handle, stream });
        info!("{handle} live");
        Ok(handle)
    }

    async fn open_stream(devices: &D, config: &AcquireConfig) -> Result<D::Stream, AcquireError> {
        let preferred = config.preferred_constraints();
        let fault = match devices.get_user_media(&preferred).await {
            Ok(stream) => return Ok(stream),
            Err(fault) => fault,
        };

        let err = AcquireError::from_fault(&fault);
        if err == AcquireError::PermissionDenied || preferred.is_relaxed() {
            return Err(err);
        }

        debug!("preferred constraints failed ({fault}), retrying with any camera");
        devices
            .get_user_media(&VideoConstraints::relaxed())
            .await
            .map_err(|fault| AcquireError::from_fault(&fault))
    }

    async fn await_ready(surface: &mut S, timeout: Duration) -> Result<(), AcquireError> {
        let ready = pin!(surface.wait_ready());
        match select(ready, Delay::new(timeout)).await {
            Either::Left((Ok(()), _)) => Ok(()),
            Either::Left((Err(fault), _)) => {
                debug!("surface reported {fault}");
                Err(AcquireError::SurfaceUnavailable)
            }
            Either::Right(_) => {
                debug!("no ready signal within {timeout:?}");
                Err(AcquireError::Aborted)
            }
        }
    }

    /// Stop the stream identified by `handle`.
    ///
    /// Returns `false` without doing anything if `handle` is not the live
    /// stream.
    pub fn stop(&mut self, handle: StreamHandle) -> bool {
        if self.active.as_ref().is_some_and(|a| a.handle == handle) {
            self.stop_active()
        } else {
            false
        }
    }

    /// Stop whatever stream is live. Returns `true` if one was.
    pub fn stop_active(&mut self) -> bool {
        let Some(mut active) = self.active.take() else {
            return false;
        };
        stop_stream(&mut active.stream);
        self.surface.detach();
        info!("{} stopped", active.handle);
        true
    }

    /// Handle of the live stream, if any.
    #[must_use]
    pub fn active(&self) -> Option<StreamHandle> {
        self.active.as_ref().map(|a| a.handle)
    }

    /// Whether a stream is live.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.active.is_some()
    }

    /// The surface streams are rendered to.
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// The device backend.
    pub const fn devices(&self) -> &D {
        &self.devices
    }

    /// Current settings.
    pub const fn config(&self) -> &AcquireConfig {
        &self.config
    }
}

fn stop_stream(stream: &mut impl MediaStream) {
    stream.stop();
    let remaining = stream.live_tracks();
    if remaining > 0 {
        warn!("stream {} still has {remaining} live tracks after stop", stream.id());
    }
}

// A stream bound to the surface but not yet ready. Unless committed, it is
// stopped and unbound on drop.
struct PendingStream<'a, St: MediaStream, S: Surface<St>> {
    surface: &'a mut S,
    stream: Option<St>,
}

impl<'a, St: MediaStream, S: Surface<St>> PendingStream<'a, St, S> {
    fn attach(surface: &'a mut S, stream: St) -> Self {
        surface.attach(&stream);
        Self {
            surface,
            stream: Some(stream),
        }
    }

    fn commit(mut self) -> Option<St> {
        self.stream.take()
    }
}

impl<St: MediaStream, S: Surface<St>> Drop for PendingStream<'_, St, S> {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!("releasing stream {} that never became ready", stream.id());
            stop_stream(&mut stream);
            self.surface.detach();
        }
    }
}

impl<D, S> Drop for MediaAcquirer<D, S>
where
    D: MediaDevices,
    S: Surface<D::Stream>,
{
    fn drop(&mut self) {
        self.stop_active();
    }
}

impl<D, S> fmt::Debug for MediaAcquirer<D, S>
where
    D: MediaDevices,
    S: Surface<D::Stream>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaAcquirer")
            .field("config", &self.config)
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}
