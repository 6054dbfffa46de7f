#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

//! # Repcoach 🏋️
//!
//! A workout session engine that walks a user through an ordered list of
//! exercises, counts repetitions from a live camera feed and surfaces
//! throttled form feedback.
//!
//! The engine is built from a handful of small components:
//!
//! - **Catalog**: the fixed exercise sequence, rep-based or duration-based
//! - **Countdown**: a one-second clock for duration exercises
//! - **Sampler**: a strictly sequential motion analysis loop
//! - **Throttler**: rep and feedback cooldown windows
//! - **Camera manager**: single-flight acquisition and exactly-once release
//!   of the capture stream
//! - **Session controller**: owns the session state and applies every
//!   background result one event at a time
//!
//! Camera access, pose analysis and text generation are supplied by the
//! embedding application through the [`CameraDevice`], [`MotionAnalyzer`] and
//! [`TextGenerator`] traits. Simulated implementations are included for demos
//! and tests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use repcoach::{
//!     CameraManager, OfflineGenerator, SessionController, SimulatedAnalyzer, SimulatedCamera,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let camera = CameraManager::new(Arc::new(SimulatedCamera::working()));
//!     let mut session = SessionController::with_defaults(
//!         camera,
//!         Arc::new(SimulatedAnalyzer::new(7)),
//!         Arc::new(OfflineGenerator),
//!     );
//!
//!     // Open the camera and start counting push-ups
//!     session.enable_camera().await?;
//!     if let Some(update) = session.toggle_tracking()? {
//!         println!("{update:?}");
//!     }
//!
//!     // Apply background results as they arrive
//!     for update in session.process_next_event().await? {
//!         println!("{update:?}");
//!     }
//!
//!     session.shutdown();
//!     Ok(())
//! }
//! ```

/// Motion analyzer contract and simulated detector
pub mod analyzer;
/// Camera device contract and resource manager
pub mod camera;
/// Exercise definitions
pub mod catalog;
/// One-second countdown for duration exercises
pub mod countdown;
/// Error types and handling
pub mod error;
/// Sequential motion sampling loop
pub mod sampler;
/// Session controller
pub mod session;
/// Rep and feedback cooldowns
pub mod throttle;
/// Text-generation contract with fixed fallbacks
pub mod tips;
/// Type definitions and data structures
pub mod types;

// Re-export the main types for convenient usage
pub use analyzer::{MotionAnalyzer, PoseSample, SimulatedAnalyzer};
pub use camera::{CameraDevice, CameraManager, CaptureStream, SimulatedCamera};
pub use catalog::{Catalog, ExerciseDescriptor, ExerciseKind};
pub use error::{AnalyzerError, CameraError, CoachError, Result};
pub use session::{SessionController, SessionEvent, SessionUpdate};
pub use throttle::{CooldownClock, ThrottleDecision, Throttler};
pub use tips::{generate_or_fallback, OfflineGenerator, PromptKind, TextGenerator};
pub use types::{
    format_clock, CameraStatus, Feedback, FeedbackKind, SessionConfig, SessionSnapshot,
    SessionState, StreamConstraints,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
