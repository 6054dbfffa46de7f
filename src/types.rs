use serde::{Deserialize, Serialize};
use std::{fmt, time::SystemTime};

use crate::{catalog::ExerciseDescriptor, error::CameraError, throttle::CooldownClock};

/// Classification of a feedback message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackKind {
    /// Informational notice from the engine itself
    Info,
    /// Positive form feedback
    Good,
    /// Corrective form feedback
    Bad,
    /// Tip produced by the text-generation collaborator
    ExternalTip,
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Good => write!(f, "good"),
            Self::Bad => write!(f, "bad"),
            Self::ExternalTip => write!(f, "tip"),
        }
    }
}

/// Feedback message currently shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    /// Message classification
    pub kind: FeedbackKind,
    /// Message text
    pub message: String,
    /// When the message was surfaced
    pub timestamp: SystemTime,
}

impl Feedback {
    /// Create a feedback record stamped with the current time
    #[must_use]
    pub fn new(kind: FeedbackKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: SystemTime::now(),
        }
    }
}

/// Camera lifecycle status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraStatus {
    /// No stream requested yet, or the stream was released
    Unacquired,
    /// A stream request is in flight
    Acquiring,
    /// A stream is held
    Active,
    /// The last acquisition failed
    Failed(CameraError),
}

impl CameraStatus {
    /// Whether a stream is currently held
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unacquired => write!(f, "Unacquired"),
            Self::Acquiring => write!(f, "Acquiring"),
            Self::Active => write!(f, "Active"),
            Self::Failed(reason) => write!(f, "Failed ({reason})"),
        }
    }
}

/// Mutable progress of the session, owned by the controller
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Index into the catalog
    pub current_exercise_index: usize,
    /// Whether the countdown clock is enabled
    pub running: bool,
    /// Whether the motion sampling loop is engaged
    pub tracking: bool,
    /// Honored repetitions for the current exercise
    pub reps_completed: u32,
    /// Seconds left on a duration-based exercise
    pub remaining_seconds: u32,
    /// Last surfaced feedback
    pub last_feedback: Option<Feedback>,
    /// Whether a tip request is outstanding
    pub tip_pending: bool,
    /// Rep and feedback cooldown timestamps
    pub cooldowns: CooldownClock,
}

impl SessionState {
    /// State positioned on `index` with counters initialised from `exercise`
    #[must_use]
    pub fn at(index: usize, exercise: &ExerciseDescriptor) -> Self {
        Self {
            current_exercise_index: index,
            remaining_seconds: exercise.target_duration_secs,
            ..Self::default()
        }
    }

    /// Clear per-exercise progress after moving to `index`
    ///
    /// `running` survives the reset; tracking never does.
    pub fn reset_for(&mut self, index: usize, exercise: &ExerciseDescriptor) {
        self.current_exercise_index = index;
        self.reps_completed = 0;
        self.remaining_seconds = exercise.target_duration_secs;
        self.last_feedback = None;
        self.tracking = false;
        self.cooldowns.reset();
    }
}

/// Engine tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Minimum spacing between honored repetitions in milliseconds
    pub rep_cooldown_ms: u64,
    /// Minimum spacing between surfaced feedback messages in milliseconds
    pub feedback_cooldown_ms: u64,
    /// Countdown tick period in milliseconds
    pub tick_interval_ms: u64,
    /// Delay between sampling iterations in milliseconds (one display refresh)
    pub frame_interval_ms: u64,
    /// Words that classify a feedback message as positive
    pub positive_keywords: Vec<String>,
    /// Message shown when tracking is switched on
    pub tracking_started_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rep_cooldown_ms: 2_000,
            feedback_cooldown_ms: 4_000,
            tick_interval_ms: 1_000,
            frame_interval_ms: 16,
            positive_keywords: vec![
                "good".to_string(),
                "excellent".to_string(),
                "solid".to_string(),
            ],
            tracking_started_message: "AI Vision Active. Start your reps!".to_string(),
        }
    }
}

/// Camera request constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConstraints {
    /// Request a video track
    pub video: bool,
    /// Preferred frame width
    pub width: Option<u32>,
    /// Preferred frame height
    pub height: Option<u32>,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            video: true,
            width: None,
            height: None,
        }
    }
}

/// Read-only view of the session for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Index of the current exercise
    pub exercise_index: usize,
    /// Current exercise
    pub exercise: ExerciseDescriptor,
    /// Countdown enabled
    pub running: bool,
    /// Sampling loop engaged
    pub tracking: bool,
    /// Honored repetitions
    pub reps_completed: u32,
    /// Seconds left on a duration exercise
    pub remaining_seconds: u32,
    /// `MM:SS` rendering of `remaining_seconds`
    pub clock: String,
    /// Last surfaced feedback
    pub last_feedback: Option<Feedback>,
    /// A tip request is outstanding; show a loading indicator
    pub tip_pending: bool,
    /// Camera lifecycle status
    pub camera: CameraStatus,
}

impl SessionSnapshot {
    /// Text for the feedback panel
    #[must_use]
    pub fn feedback_text(&self) -> &str {
        if self.tip_pending {
            "Analyzing form..."
        } else {
            self.last_feedback
                .as_ref()
                .map_or("Start moving for real-time feedback", |f| f.message.as_str())
        }
    }
}

/// Render seconds as `MM:SS`
#[must_use]
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
