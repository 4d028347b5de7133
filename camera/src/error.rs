use thiserror::Error;

/// A raw failure reported by the media-device platform.
///
/// Platforms identify failures by name (`NotAllowedError`,
/// `NotReadableError`, ...). Nothing outside this crate should match on
/// [`name`](Self::name); convert with [`AcquireError::from_fault`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct DeviceFault {
    /// Platform error name.
    pub name: String,
    /// Platform-provided detail.
    pub message: String,
}

impl DeviceFault {
    /// Create a new fault.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// A failure reported by a surface while loading or playing a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("surface failed: {0}")]
pub struct SurfaceFault(pub String);

/// Errors that can occur while acquiring a camera stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// The user or platform denied camera access.
    #[error("camera permission denied")]
    PermissionDenied,
    /// No camera is attached.
    #[error("camera not found")]
    DeviceNotFound,
    /// The camera is held by another application.
    #[error("camera is already in use")]
    DeviceBusy,
    /// No camera satisfies the requested constraints.
    #[error("camera constraints cannot be satisfied")]
    ConstraintsUnsatisfiable,
    /// Initialization was aborted or timed out waiting for the surface.
    #[error("camera initialization aborted")]
    Aborted,
    /// The surface is not mounted or failed to play the stream.
    #[error("video surface unavailable")]
    SurfaceUnavailable,
    /// A platform failure with no specific mapping.
    #[error("camera error: {0}")]
    Unknown(String),
}

impl AcquireError {
    /// Translate a platform fault into an [`AcquireError`].
    ///
    /// This is the only place platform error names are inspected.
    #[must_use]
    pub fn from_fault(fault: &DeviceFault) -> Self {
        match fault.name.as_str() {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                Self::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" => Self::DeviceNotFound,
            "NotReadableError" | "TrackStartError" => Self::DeviceBusy,
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
                Self::ConstraintsUnsatisfiable
            }
            "AbortError" => Self::Aborted,
            _ => Self::Unknown(fault.to_string()),
        }
    }

    /// A message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => "Camera access was denied. Please allow camera access in your browser settings.".into(),
            Self::DeviceNotFound => "No camera found on this device.".into(),
            Self::DeviceBusy => "Camera is already in use by another application.".into(),
            Self::ConstraintsUnsatisfiable => {
                "Camera doesn't support the requested resolution or capabilities.".into()
            }
            Self::Aborted => "Camera initialization was aborted.".into(),
            Self::SurfaceUnavailable => {
                "The camera preview is not ready yet. Please try again.".into()
            }
            Self::Unknown(detail) => format!("Could not access camera ({detail})."),
        }
    }

    /// Whether the user should be offered manual file selection instead.
    #[must_use]
    pub const fn offers_file_selection(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::DeviceNotFound)
    }
}

/// Errors that can occur while capturing a still frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// No frame has been painted yet, or it has a zero dimension.
    #[error("surface has not rendered a frame yet")]
    SurfaceNotReady,
    /// The frame could not be turned into an image.
    #[error("image encoding unavailable: {0}")]
    EncodingUnavailable(String),
}

/// Errors that can occur while interpreting encoded image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The input is not a base64 `data:` URL.
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),
    /// The bytes are not a supported image format.
    #[error("unrecognized image format")]
    UnrecognizedFormat,
    /// The image header could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_platform_names() {
        let cases = [
            ("NotAllowedError", AcquireError::PermissionDenied),
            ("PermissionDeniedError", AcquireError::PermissionDenied),
            ("NotFoundError", AcquireError::DeviceNotFound),
            ("DevicesNotFoundError", AcquireError::DeviceNotFound),
            ("NotReadableError", AcquireError::DeviceBusy),
            ("TrackStartError", AcquireError::DeviceBusy),
            ("OverconstrainedError", AcquireError::ConstraintsUnsatisfiable),
            ("AbortError", AcquireError::Aborted),
        ];
        for (name, expected) in cases {
            assert_eq!(AcquireError::from_fault(&DeviceFault::new(name, "")), expected);
        }
    }

    #[test]
    fn unknown_names_keep_detail() {
        let err = AcquireError::from_fault(&DeviceFault::new("TypeError", "bad constraints"));
        assert_eq!(err, AcquireError::Unknown("TypeError: bad constraints".into()));
        assert!(err.user_message().contains("bad constraints"));
    }

    #[test]
    fn user_messages_are_distinct() {
        let all = [
            AcquireError::PermissionDenied,
            AcquireError::DeviceNotFound,
            AcquireError::DeviceBusy,
            AcquireError::ConstraintsUnsatisfiable,
            AcquireError::Aborted,
            AcquireError::SurfaceUnavailable,
        ];
        let mut messages: Vec<_> = all.iter().map(AcquireError::user_message).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), all.len());
        assert!(AcquireError::PermissionDenied.user_message().contains("denied"));
    }

    #[test]
    fn file_selection_offered_when_camera_is_unavailable() {
        assert!(AcquireError::PermissionDenied.offers_file_selection());
        assert!(AcquireError::DeviceNotFound.offers_file_selection());
        assert!(!AcquireError::DeviceBusy.offers_file_selection());
        assert!(!AcquireError::Aborted.offers_file_selection());
    }
}
