use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while driving a workout session
#[derive(Error, Debug)]
pub enum CoachError {
    /// Camera acquisition failed
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    /// Camera must be active for the requested operation
    #[error("Camera not active: {status}")]
    CameraNotActive {
        /// Camera status at the time of the request
        status: String,
    },

    /// Exercise index outside the catalog
    #[error("Exercise index {index} out of range (catalog has {len} entries)")]
    ExerciseOutOfRange {
        /// Requested index
        index: usize,
        /// Catalog length
        len: usize,
    },

    /// Operation requires a rep-based exercise
    #[error("Exercise '{name}' is not rep-based")]
    NotRepBased {
        /// Name of the current exercise
        name: String,
    },

    /// Catalog definition is invalid
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Text generation failed
    #[error("Text generation failed: {0}")]
    Generation(String),

    /// Waited for a session event with no background work running
    #[error("No background work pending")]
    Idle,
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, CoachError>;

impl CoachError {
    /// Check if this error comes from the camera
    #[must_use]
    pub const fn is_camera_error(&self) -> bool {
        matches!(self, Self::Camera(_) | Self::CameraNotActive { .. })
    }

    /// Check if retrying the same action can succeed without outside intervention
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Camera(e) => e.is_retryable(),
            Self::CameraNotActive { .. } | Self::Generation(_) | Self::Idle => true,
            Self::ExerciseOutOfRange { .. }
            | Self::NotRepBased { .. }
            | Self::InvalidCatalog(_) => false,
        }
    }
}

/// Camera acquisition failure taxonomy
///
/// Every platform failure is folded into one of these classes. Each one is
/// terminal for the attempt that produced it; a later `acquire()` is the retry.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraError {
    /// Platform has no capture capability
    #[error("camera capture is not supported on this platform")]
    Unsupported,

    /// User or host denied access
    #[error("camera permission denied")]
    PermissionDenied,

    /// No capture device present
    #[error("no camera device found")]
    NotFound,

    /// Device held by another consumer
    #[error("camera is busy")]
    DeviceBusy,

    /// Anything else, with the raw diagnostic
    #[error("unknown camera failure: {0}")]
    Unknown(String),
}

impl CameraError {
    /// Classify a platform error by its name
    ///
    /// Names follow the media-capture conventions (`NotAllowedError`,
    /// `NotFoundError`, `NotReadableError` and their legacy aliases).
    #[must_use]
    pub fn from_platform(name: &str, message: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" => Self::PermissionDenied,
            "NotFoundError" | "DevicesNotFoundError" => Self::NotFound,
            "NotReadableError" | "TrackStartError" => Self::DeviceBusy,
            _ => Self::Unknown(format!("{name}: {message}")),
        }
    }

    /// Whether a retry can succeed without the user changing anything outside the app
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DeviceBusy | Self::NotFound | Self::Unknown(_))
    }

    /// Text shown to the user for this failure
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Unsupported => "Your browser/app does not support camera access.",
            Self::PermissionDenied => {
                "Access Denied. Camera permission must be granted to this app."
            }
            Self::NotFound => "No camera found. The app may not have hardware access.",
            Self::DeviceBusy => "Camera is currently in use by another application.",
            Self::Unknown(_) => "Could not access camera.",
        }
    }

    /// Raw diagnostic detail, only present for unclassified failures
    #[must_use]
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Unknown(detail) => Some(detail),
            _ => None,
        }
    }
}

/// A single motion analysis failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerError {
    /// No frame was available from the capture stream
    #[error("no video frame available")]
    FrameUnavailable,

    /// The model failed to produce a result
    #[error("inference failed: {0}")]
    Inference(String),
}
