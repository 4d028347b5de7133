//! Camera stream acquisition and still-frame capture.
//!
//! This crate owns the lifecycle of a camera media stream: it requests
//! device access through a [`MediaDevices`] backend, binds the stream to a
//! renderable [`Surface`], and turns the currently painted frame into an
//! [`EncodedImage`]. Platform failures are translated once, at the device
//! boundary, into the closed [`AcquireError`] enumeration.
//!
//! A simulated backend lives in [`sys::simulated`] for tests and demos.

#![warn(missing_docs)]

mod acquirer;
mod capturer;
mod encoded;
mod error;

/// Backend implementations.
pub mod sys;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

pub use acquirer::{AcquireConfig, MediaAcquirer, StreamHandle};
pub use capturer::{CaptureConfig, FrameCapturer};
pub use encoded::{EncodedImage, ImageMime};
pub use error::{AcquireError, CaptureError, DeviceFault, EncodingError, SurfaceFault};

/// Camera resolution configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Standard 720p resolution.
    pub const HD: Self = Self {
        width: 1280,
        height: 720,
    };

    /// Returns `true` if either dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which way a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointed away from the user.
    #[default]
    Environment,
    /// Front camera, pointed at the user.
    User,
}

/// Constraints passed to [`MediaDevices::get_user_media`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VideoConstraints {
    /// Required facing mode, or `None` for any camera.
    pub facing: Option<FacingMode>,
    /// Ideal resolution. Backends treat this as a hint.
    pub ideal: Option<Resolution>,
}

impl VideoConstraints {
    /// Constraints for a specific facing mode and ideal size.
    #[must_use]
    pub const fn preferred(facing: FacingMode, ideal: Option<Resolution>) -> Self {
        Self {
            facing: Some(facing),
            ideal,
        }
    }

    /// The relaxed fallback: any camera, any size.
    #[must_use]
    pub const fn relaxed() -> Self {
        Self {
            facing: None,
            ideal: None,
        }
    }

    /// Returns `true` if these constraints accept any device.
    #[must_use]
    pub const fn is_relaxed(&self) -> bool {
        self.facing.is_none() && self.ideal.is_none()
    }
}

/// Pixel layout of a [`CameraFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameFormat {
    /// Packed 8-bit RGB.
    Rgb,
    /// Packed 8-bit RGBA.
    Rgba,
    /// Packed 8-bit BGRA.
    Bgra,
    /// NV12 (YUV 4:2:0 bi-planar).
    Nv12,
    /// An already encoded JPEG image.
    Jpeg,
}

/// The frame currently rendered by a surface.
#[derive(Clone, PartialEq, Eq)]
pub struct CameraFrame {
    /// Raw pixel data in `format` layout.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: FrameFormat,
}

impl CameraFrame {
    /// Create a new frame.
    #[must_use]
    pub const fn new(data: Vec<u8>, width: u32, height: u32, format: FrameFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// Frame dimensions.
    #[must_use]
    pub const fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }
}

impl fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// A live platform media stream.
///
/// Streams are owned by [`MediaAcquirer`] while live. Implementations must
/// make [`stop`](Self::stop) idempotent.
pub trait MediaStream: Send {
    /// Platform identifier of the stream.
    fn id(&self) -> &str;

    /// Number of tracks that have not been stopped.
    fn live_tracks(&self) -> usize;

    /// Stop every underlying track.
    fn stop(&mut self);
}

/// Access to the platform's camera devices.
pub trait MediaDevices: Send + Sync {
    /// Stream type produced by this backend.
    type Stream: MediaStream;

    /// Request a camera stream matching `constraints`.
    ///
    /// This suspends while the platform shows its permission prompt.
    ///
    /// # Errors
    /// Returns the raw platform [`DeviceFault`]. Callers translate it with
    /// [`AcquireError::from_fault`].
    fn get_user_media(
        &self,
        constraints: &VideoConstraints,
    ) -> impl Future<Output = Result<Self::Stream, DeviceFault>> + Send;
}

/// Anything a still frame can be read from.
pub trait FrameSource {
    /// The currently painted frame, if any has been painted.
    fn current_frame(&self) -> Option<CameraFrame>;
}

/// A renderable target a stream is bound to, such as a video element.
pub trait Surface<St: MediaStream>: FrameSource + Send {
    /// Whether the surface exists and can accept a stream.
    fn is_mounted(&self) -> bool;

    /// Bind `stream` so the surface renders its frames.
    fn attach(&mut self, stream: &St);

    /// Unbind whatever stream is attached. Safe to call when nothing is.
    fn detach(&mut self);

    /// Resolve once the attached stream is ready to play.
    ///
    /// # Errors
    /// Returns a [`SurfaceFault`] if the surface fails to load or play.
    fn wait_ready(&mut self) -> impl Future<Output = Result<(), SurfaceFault>> + Send;
}
