//! Capture session controller.
//!
//! A [`CaptureSession`] drives the add-a-plant camera flow:
//!
//! ```text
//! Idle --start--> Starting --ok--> Live --capture--> Captured
//!                    |                                  |
//!                    +--err--> PermissionError          +--retake--> Starting
//!                                  |
//!                                  +--retry_start--> Starting
//! ```
//!
//! `cancel` returns any phase to `Idle`, and `upload_file` jumps from `Idle`
//! or `PermissionError` straight to `Captured`. Every captured image is kept
//! locally and handed to the upload relay as a fire-and-forget
//! [`PendingUpload`]; an upload failure only downgrades the image to
//! local-only.
//!
//! Observers call [`CaptureSession::snapshot`] or
//! [`subscribe`](CaptureSession::subscribe) to a stream of
//! [`SessionEvent`]s.

#![warn(missing_docs)]

mod events;
mod session;
mod upload;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use events::{Notice, SessionEvent, Severity};
pub use plantcare_camera::{
    AcquireConfig, AcquireError, CaptureConfig, CaptureError, EncodedImage, EncodingError,
    StreamHandle,
};
pub use plantcare_storage::{RelayConfig, RemoteReference};
pub use session::CaptureSession;
pub use upload::PendingUpload;

/// Settings for a [`CaptureSession`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Stream acquisition.
    pub acquire: AcquireConfig,
    /// Still capture.
    pub capture: CaptureConfig,
    /// Upload destination.
    pub relay: RelayConfig,
}

/// The phase of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapturePhase {
    /// Nothing is happening.
    Idle,
    /// Waiting for the camera to start.
    Starting,
    /// The camera preview is live.
    Live,
    /// An image is held locally.
    Captured,
    /// The camera could not be started.
    PermissionError,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Live => "live",
            Self::Captured => "captured",
            Self::PermissionError => "permission error",
        })
    }
}

/// Progress of the upload of the current image.
///
/// Moves forward only: `NotStarted`, then `InProgress`, then one of the two
/// settled states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadStatus {
    /// The upload has not begun.
    #[default]
    NotStarted,
    /// The upload is running.
    InProgress,
    /// The image is durably stored.
    Succeeded(RemoteReference),
    /// The upload failed; the image is only available locally.
    FailedLocalFallback,
}

impl UploadStatus {
    const fn rank(&self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::InProgress => 1,
            Self::Succeeded(_) | Self::FailedLocalFallback => 2,
        }
    }

    /// Whether the upload has finished one way or the other.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.rank() == 2
    }

    /// Whether moving to `next` is a forward transition.
    #[must_use]
    pub const fn can_advance_to(&self, next: &Self) -> bool {
        next.rank() > self.rank()
    }

    /// The remote reference, if the upload succeeded.
    #[must_use]
    pub const fn reference(&self) -> Option<&RemoteReference> {
        match self {
            Self::Succeeded(reference) => Some(reference),
            _ => None,
        }
    }
}

/// Where the current image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// Captured from the camera preview.
    Camera,
    /// Selected from a file.
    File,
}

/// What [`CaptureSession::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new stream is live.
    Started(StreamHandle),
    /// Another start is already in flight; nothing was done.
    InFlight,
    /// A stream was already live; nothing was done.
    AlreadyLive,
    /// The session was cancelled while this start was pending.
    Superseded,
}

/// A point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Current phase.
    pub phase: CapturePhase,
    /// Live stream, present only while `Live`.
    pub stream: Option<StreamHandle>,
    /// Held image, present only while `Captured`.
    pub last_image: Option<EncodedImage>,
    /// Where `last_image` came from.
    pub image_source: Option<ImageSource>,
    /// Upload progress of `last_image`.
    pub upload_status: UploadStatus,
    /// Why the camera could not start, present only in `PermissionError`.
    pub error: Option<AcquireError>,
}

impl SessionSnapshot {
    /// A user-facing message for the current error.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(AcquireError::user_message)
    }

    /// Whether the UI should offer "try again".
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.phase == CapturePhase::PermissionError
    }

    /// Whether the UI should offer manual file selection.
    #[must_use]
    pub fn offers_file_selection(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(AcquireError::offers_file_selection)
    }
}

/// The image handed to the plant form when the user accepts a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedImage {
    /// The image itself.
    pub image: EncodedImage,
    /// `data:` URL of the image, usable as a local preview.
    pub image_data: String,
    /// Public URL of the uploaded copy, if the upload succeeded.
    pub image_path: Option<String>,
}

/// Errors returned by [`CaptureSession`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The operation is not valid in the current phase.
    #[error("cannot {operation} while {phase}")]
    InvalidPhase {
        /// Operation attempted.
        operation: &'static str,
        /// Phase the session was in.
        phase: CapturePhase,
    },
    /// The camera could not be started.
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    /// The frame could not be captured.
    #[error(transparent)]
    Capture(#[from] CaptureError),
    /// The selected file is not a usable image.
    #[error("selected file is not a usable image: {0}")]
    File(#[from] EncodingError),
    /// The current image is still uploading.
    #[error("image upload still in progress")]
    UploadInProgress,
    /// The session moved on while the operation was running.
    #[error("session changed while the operation was running")]
    Superseded,
}
