//! In-process camera and surface with scriptable failures.
//!
//! [`SimulatedCamera`] and [`SimulatedSurface`] are cheap handles over shared
//! state: keep a clone to script faults or inspect live-stream counts while
//! another component owns the original.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_timer::Delay;

use crate::{
    CameraFrame, DeviceFault, FacingMode, FrameFormat, FrameSource, MediaDevices, MediaStream,
    Surface, SurfaceFault, VideoConstraints,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A solid leaf-green RGB frame.
#[must_use]
pub fn leaf_frame(width: u32, height: u32) -> CameraFrame {
    let data = [46, 139, 87].repeat(width as usize * height as usize);
    CameraFrame::new(data, width, height, FrameFormat::Rgb)
}

#[derive(Debug)]
struct CameraState {
    faults: VecDeque<DeviceFault>,
    requests: Vec<VideoConstraints>,
    frame: CameraFrame,
    has_environment_camera: bool,
    grant_delay: Duration,
    opened: u64,
    live: usize,
    peak: usize,
}

/// A simulated camera device.
#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    state: Arc<Mutex<CameraState>>,
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCamera {
    /// A camera that grants access immediately and sees a 64x48 leaf.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CameraState {
                faults: VecDeque::new(),
                requests: Vec::new(),
                frame: leaf_frame(64, 48),
                has_environment_camera: true,
                grant_delay: Duration::ZERO,
                opened: 0,
                live: 0,
                peak: 0,
            })),
        }
    }

    /// Fail the next request with `fault`. Faults queue in order.
    pub fn fail_next(&self, fault: DeviceFault) {
        lock(&self.state).faults.push_back(fault);
    }

    /// Fail every environment-facing request as overconstrained.
    pub fn without_environment_camera(&self) {
        lock(&self.state).has_environment_camera = false;
    }

    /// Delay every request, like a permission prompt awaiting the user.
    pub fn set_grant_delay(&self, delay: Duration) {
        lock(&self.state).grant_delay = delay;
    }

    /// Replace the frame the camera sees.
    pub fn set_frame(&self, frame: CameraFrame) {
        lock(&self.state).frame = frame;
    }

    /// Every constraint set requested so far.
    #[must_use]
    pub fn requests(&self) -> Vec<VideoConstraints> {
        lock(&self.state).requests.clone()
    }

    /// Streams opened and not yet stopped.
    #[must_use]
    pub fn live_streams(&self) -> usize {
        lock(&self.state).live
    }

    /// Highest number of simultaneously live streams observed.
    #[must_use]
    pub fn peak_live_streams(&self) -> usize {
        lock(&self.state).peak
    }
}

impl MediaDevices for SimulatedCamera {
    type Stream = SimulatedStream;

    fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> impl Future<Output = Result<Self::Stream, DeviceFault>> + Send {
        let constraints = *constraints;
        let state = Arc::clone(&self.state);
        async move {
            let delay = {
                let mut guard = lock(&state);
                guard.requests.push(constraints);
                guard.grant_delay
            };
            if !delay.is_zero() {
                Delay::new(delay).await;
            }

            let mut guard = lock(&state);
            if let Some(fault) = guard.faults.pop_front() {
                return Err(fault);
            }
            if constraints.facing == Some(FacingMode::Environment)
                && !guard.has_environment_camera
            {
                return Err(DeviceFault::new(
                    "OverconstrainedError",
                    "no camera with facingMode environment",
                ));
            }
            guard.opened += 1;
            guard.live += 1;
            guard.peak = guard.peak.max(guard.live);
            let id = format!("sim-{}", guard.opened);
            drop(guard);

            Ok(SimulatedStream {
                id,
                state,
                live: true,
            })
        }
    }
}

/// A stream produced by [`SimulatedCamera`].
///
/// Dropping a stream without stopping it leaves it counted as live.
pub struct SimulatedStream {
    id: String,
    state: Arc<Mutex<CameraState>>,
    live: bool,
}

impl fmt::Debug for SimulatedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedStream")
            .field("id", &self.id)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

impl MediaStream for SimulatedStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn live_tracks(&self) -> usize {
        usize::from(self.live)
    }

    fn stop(&mut self) {
        if std::mem::replace(&mut self.live, false) {
            lock(&self.state).live -= 1;
        }
    }
}

/// How a [`SimulatedSurface`] responds to [`Surface::wait_ready`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Ready as soon as asked.
    Immediate,
    /// Ready after a delay.
    Delayed(Duration),
    /// Never becomes ready.
    Never,
    /// Reports a playback failure.
    Fail(String),
}

#[derive(Debug)]
struct SurfaceState {
    mounted: bool,
    source: Option<Arc<Mutex<CameraState>>>,
    readiness: Readiness,
    auto_paint: bool,
    painted: bool,
}

/// A simulated video surface.
#[derive(Debug, Clone)]
pub struct SimulatedSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl Default for SimulatedSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSurface {
    /// A mounted surface that becomes ready immediately and paints the first
    /// frame as soon as it is ready.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SurfaceState {
                mounted: true,
                source: None,
                readiness: Readiness::Immediate,
                auto_paint: true,
                painted: false,
            })),
        }
    }

    /// A surface that has not been mounted yet.
    #[must_use]
    pub fn unmounted() -> Self {
        let surface = Self::new();
        surface.set_mounted(false);
        surface
    }

    /// Mount or unmount the surface.
    pub fn set_mounted(&self, mounted: bool) {
        lock(&self.state).mounted = mounted;
    }

    /// Change how the surface reports readiness.
    pub fn set_readiness(&self, readiness: Readiness) {
        lock(&self.state).readiness = readiness;
    }

    /// Whether a frame is painted as soon as the surface is ready.
    pub fn set_auto_paint(&self, auto_paint: bool) {
        lock(&self.state).auto_paint = auto_paint;
    }

    /// Paint the current camera frame. No-op when nothing is attached.
    pub fn paint(&self) {
        let mut guard = lock(&self.state);
        guard.painted = guard.source.is_some();
    }

    /// Whether a stream is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        lock(&self.state).source.is_some()
    }

}

impl Surface<SimulatedStream> for SimulatedSurface {
    fn is_mounted(&self) -> bool {
        lock(&self.state).mounted
    }

    fn attach(&mut self, stream: &SimulatedStream) {
        let mut guard = lock(&self.state);
        guard.source = Some(Arc::clone(&stream.state));
        guard.painted = false;
    }

    fn detach(&mut self) {
        let mut guard = lock(&self.state);
        guard.source = None;
        guard.painted = false;
    }

    fn wait_ready(&mut self) -> impl Future<Output = Result<(), SurfaceFault>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            let readiness = lock(&state).readiness.clone();
            match readiness {
                Readiness::Immediate => {}
                Readiness::Delayed(delay) => Delay::new(delay).await,
                Readiness::Never => futures::future::pending::<()>().await,
                Readiness::Fail(reason) => return Err(SurfaceFault(reason)),
            }
            let mut guard = lock(&state);
            if guard.auto_paint && guard.source.is_some() {
                guard.painted = true;
            }
            Ok(())
        }
    }
}

impl FrameSource for SimulatedSurface {
    fn current_frame(&self) -> Option<CameraFrame> {
        let guard = lock(&self.state);
        if !guard.painted {
            return None;
        }
        let source = guard.source.as_ref()?;
        let frame = lock(source).frame.clone();
        Some(frame)
    }
}
