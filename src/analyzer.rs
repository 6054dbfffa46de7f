use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use crate::{camera::CaptureStream, error::AnalyzerError};

/// Result of one analysis of the live feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoseSample {
    /// Form feedback, if the analyzer has something to say
    pub feedback: Option<String>,
    /// The analyzer saw a completed repetition
    pub rep_counted: bool,
}

impl PoseSample {
    /// Sample carrying nothing
    #[must_use]
    pub const fn quiet() -> Self {
        Self {
            feedback: None,
            rep_counted: false,
        }
    }
}

/// Motion analysis capability
///
/// Called strictly sequentially by the sampling loop: a new call is never made
/// before the previous one resolved. Expected latency is 100-200ms.
#[async_trait]
pub trait MotionAnalyzer: Send + Sync {
    /// Analyze the current frame of `stream` for `exercise`
    async fn analyze(
        &self,
        stream: &dyn CaptureStream,
        exercise: &str,
    ) -> Result<PoseSample, AnalyzerError>;
}

const PUSH_UP_FEEDBACK: &[&str] = &[
    "Keep your back straight.",
    "Lower your chest to the floor.",
    "Elbows should be closer to your body.",
    "Core engaged!",
    "Good form!",
];

const SQUAT_FEEDBACK: &[&str] = &[
    "Keep your chest up.",
    "Go deeper, thighs parallel to the ground.",
    "Don't let your knees go past your toes.",
    "Weight on your heels.",
    "Excellent depth!",
];

const LUNGE_FEEDBACK: &[&str] = &[
    "Keep your front knee at a 90-degree angle.",
    "Don't let your back knee touch the ground.",
    "Maintain an upright torso.",
    "Solid stance!",
];

const DEFAULT_FEEDBACK: &[&str] = &[
    "Maintain a steady pace.",
    "Control your breathing.",
    "Great work!",
];

/// Stand-in detector producing plausible random samples
///
/// Seeded, so a given seed always yields the same sequence of samples.
pub struct SimulatedAnalyzer {
    rng: Mutex<StdRng>,
    latency: Duration,
    feedback_probability: f64,
    rep_probability: f64,
}

impl SimulatedAnalyzer {
    /// Simulated analyzer with the default 150ms inference latency
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            latency: Duration::from_millis(150),
            feedback_probability: 0.3,
            rep_probability: 0.2,
        }
    }

    /// Override the simulated inference latency
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Override the per-sample chances of feedback and of a rep
    #[must_use]
    pub fn with_probabilities(mut self, feedback: f64, rep: f64) -> Self {
        self.feedback_probability = feedback.clamp(0.0, 1.0);
        self.rep_probability = rep.clamp(0.0, 1.0);
        self
    }

    /// Feedback vocabulary for an exercise
    #[must_use]
    pub fn vocabulary(exercise: &str) -> &'static [&'static str] {
        match exercise {
            "Push-ups" => PUSH_UP_FEEDBACK,
            "Squats" => SQUAT_FEEDBACK,
            "Lunges" => LUNGE_FEEDBACK,
            _ => DEFAULT_FEEDBACK,
        }
    }

    fn draw(&self, exercise: &str) -> PoseSample {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let feedback = if rng.gen_bool(self.feedback_probability) {
            let options = Self::vocabulary(exercise);
            Some(options[rng.gen_range(0..options.len())].to_string())
        } else {
            None
        };

        PoseSample {
            feedback,
            rep_counted: rng.gen_bool(self.rep_probability),
        }
    }
}

#[async_trait]
impl MotionAnalyzer for SimulatedAnalyzer {
    async fn analyze(
        &self,
        stream: &dyn CaptureStream,
        exercise: &str,
    ) -> Result<PoseSample, AnalyzerError> {
        if !stream.is_ready() {
            return Err(AnalyzerError::FrameUnavailable);
        }

        tokio::time::sleep(self.latency).await;

        Ok(self.draw(exercise))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StillFrame {
        ready: bool,
    }

    impl CaptureStream for StillFrame {
        fn label(&self) -> &str {
            "still"
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn stop(&self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_seed_same_samples() {
        let a = SimulatedAnalyzer::new(7);
        let b = SimulatedAnalyzer::new(7);
        let frame = StillFrame { ready: true };

        for _ in 0..20 {
            let left = a.analyze(&frame, "Squats").await;
            let right = b.analyze(&frame, "Squats").await;
            assert_eq!(left, right);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_feedback_comes_from_vocabulary() {
        let analyzer = SimulatedAnalyzer::new(1).with_probabilities(1.0, 0.0);
        let frame = StillFrame { ready: true };

        for _ in 0..10 {
            let sample = analyzer.analyze(&frame, "Lunges").await.unwrap();
            let text = sample.feedback.unwrap();
            assert!(SimulatedAnalyzer::vocabulary("Lunges").contains(&text.as_str()));
            assert!(!sample.rep_counted);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unready_stream_yields_error() {
        let analyzer = SimulatedAnalyzer::new(3);
        let frame = StillFrame { ready: false };

        let result = analyzer.analyze(&frame, "Push-ups").await;
        assert_eq!(result, Err(AnalyzerError::FrameUnavailable));
    }

    #[test]
    fn test_unknown_exercise_uses_default_vocabulary() {
        assert_eq!(SimulatedAnalyzer::vocabulary("Burpees"), DEFAULT_FEEDBACK);
    }
}
