//! Cooldown rules applied to every motion sample before it touches the session.
//!
//! Two independent windows are enforced: honored repetitions are at least
//! `rep_cooldown` apart and surfaced feedback messages at least
//! `feedback_cooldown` apart. Anything arriving inside a window is dropped,
//! never queued.

use std::time::Duration;
use tokio::time::Instant;

use crate::{
    analyzer::PoseSample,
    types::{Feedback, FeedbackKind, SessionConfig},
};

/// Monotonic timestamps of the last honored rep and the last surfaced feedback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CooldownClock {
    /// Last honored repetition
    pub last_rep_at: Option<Instant>,
    /// Last surfaced feedback message
    pub last_feedback_at: Option<Instant>,
}

impl CooldownClock {
    /// Open both windows so the next sample can always land
    pub fn reset(&mut self) {
        self.last_rep_at = None;
        self.last_feedback_at = None;
    }
}

/// Outcome of throttling one sample
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThrottleDecision {
    /// Increment the rep counter
    pub count_rep: bool,
    /// Feedback to surface
    pub feedback: Option<Feedback>,
}

/// Feedback / rep cooldown filter
#[derive(Debug, Clone)]
pub struct Throttler {
    rep_cooldown: Duration,
    feedback_cooldown: Duration,
    positive_keywords: Vec<String>,
}

impl Throttler {
    /// Build a throttler from session configuration
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            rep_cooldown: Duration::from_millis(config.rep_cooldown_ms),
            feedback_cooldown: Duration::from_millis(config.feedback_cooldown_ms),
            positive_keywords: config
                .positive_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }

    /// Minimum spacing between honored repetitions
    #[must_use]
    pub const fn rep_cooldown(&self) -> Duration {
        self.rep_cooldown
    }

    /// Minimum spacing between surfaced feedback messages
    #[must_use]
    pub const fn feedback_cooldown(&self) -> Duration {
        self.feedback_cooldown
    }

    /// Apply both cooldowns to a sample, updating `clock` for whatever passes
    pub fn evaluate(
        &self,
        clock: &mut CooldownClock,
        sample: &PoseSample,
        now: Instant,
    ) -> ThrottleDecision {
        let count_rep = sample.rep_counted && self.admit_rep(clock, now);
        let feedback = sample
            .feedback
            .as_deref()
            .and_then(|message| self.admit_feedback(clock, message, now));

        ThrottleDecision {
            count_rep,
            feedback,
        }
    }

    /// Honor a rep signal if the rep window is open
    pub fn admit_rep(&self, clock: &mut CooldownClock, now: Instant) -> bool {
        if !window_open(clock.last_rep_at, self.rep_cooldown, now) {
            return false;
        }
        clock.last_rep_at = Some(now);
        true
    }

    /// Surface a message if it is non-empty and the feedback window is open
    pub fn admit_feedback(
        &self,
        clock: &mut CooldownClock,
        message: &str,
        now: Instant,
    ) -> Option<Feedback> {
        let message = message.trim();
        if message.is_empty() || !window_open(clock.last_feedback_at, self.feedback_cooldown, now)
        {
            return None;
        }
        clock.last_feedback_at = Some(now);
        Some(Feedback::new(self.classify(message), message))
    }

    /// Positive vocabulary anywhere in the text means `Good`, otherwise `Bad`
    #[must_use]
    pub fn classify(&self, message: &str) -> FeedbackKind {
        let lowered = message.to_lowercase();
        if self
            .positive_keywords
            .iter()
            .any(|keyword| lowered.contains(keyword.as_str()))
        {
            FeedbackKind::Good
        } else {
            FeedbackKind::Bad
        }
    }
}

impl Default for Throttler {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

fn window_open(last: Option<Instant>, cooldown: Duration, now: Instant) -> bool {
    last.is_none_or(|at| now.saturating_duration_since(at) >= cooldown)
}
