//! Text-generation collaborator boundary.
//!
//! The engine asks an external generator for short coaching texts. Every call
//! site resolves to a fixed fallback when the generator fails, so session
//! logic never stalls or errors because of it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoachError, Result};

/// Reps logged in one week of training
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyReps {
    /// Week label, e.g. "Week 3"
    pub week: String,
    /// Total reps that week
    pub reps: u32,
}

/// What to ask the generator for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromptKind {
    /// One short, actionable form tip for an exercise
    FormTip {
        /// Exercise the tip is about
        exercise: String,
    },
    /// An inspiring quote about fitness and perseverance
    MotivationalQuote,
    /// A short motivational subheading for the home screen
    HomeSubheading,
    /// An encouraging summary of weekly progress
    ProgressAnalysis {
        /// Weekly totals, oldest first
        weeks: Vec<WeeklyReps>,
    },
}

impl PromptKind {
    /// Prompt text sent to the generator
    #[must_use]
    pub fn prompt(&self) -> String {
        match self {
            Self::FormTip { exercise } => format!(
                "Give me one, short, actionable tip for improving my form on {exercise}. Max 10 words."
            ),
            Self::MotivationalQuote => {
                "Generate an inspiring and motivational quote about fitness and perseverance."
                    .to_string()
            }
            Self::HomeSubheading => "Generate a short, motivational, and encouraging subheading \
                 for a fitness app's hero section. Max 15 words."
                .to_string(),
            Self::ProgressAnalysis { weeks } => {
                let data = weeks
                    .iter()
                    .map(|w| format!("{}: {} reps", w.week, w.reps))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "A user has provided their weekly workout progress data: {data}. \
                     Analyze this progress and provide a short, encouraging, and insightful summary. \
                     Mention the trend and offer some motivation to keep going. Be positive and brief."
                )
            }
        }
    }

    /// Fixed text used whenever generation fails
    #[must_use]
    pub const fn fallback(&self) -> &'static str {
        match self {
            Self::FormTip { .. } => "Focus on your breathing and maintain control.",
            Self::MotivationalQuote => "The only bad workout is the one that didn't happen.",
            Self::HomeSubheading => "Your journey to a healthier you starts now.",
            Self::ProgressAnalysis { .. } => {
                "Could not analyze progress, but keep up the great work!"
            }
        }
    }
}

/// External text generator
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce text for `prompt`
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::Generation`] on network, quota or parse failures.
    async fn generate(&self, prompt: &PromptKind) -> Result<String>;
}

/// Ask `generator` for text, resolving any failure to the prompt's fallback
///
/// Output is trimmed; an empty answer counts as a failure.
pub async fn generate_or_fallback(generator: &dyn TextGenerator, prompt: &PromptKind) -> String {
    match generator.generate(prompt).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            warn!("Text generator returned nothing, using fallback");
            prompt.fallback().to_string()
        }
        Err(e) => {
            warn!("Text generation failed, using fallback: {}", e);
            prompt.fallback().to_string()
        }
    }
}

/// Generator used when no remote service is configured
///
/// Answers every prompt with its fallback text.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineGenerator;

#[async_trait]
impl TextGenerator for OfflineGenerator {
    async fn generate(&self, prompt: &PromptKind) -> Result<String> {
        debug!("No text generator configured, answering with fallback");
        Ok(prompt.fallback().to_string())
    }
}

/// Generator that always fails, for exercising fallback paths
#[derive(Debug, Clone, Default)]
pub struct UnavailableGenerator {
    /// Failure description
    pub reason: String,
}

#[async_trait]
impl TextGenerator for UnavailableGenerator {
    async fn generate(&self, _prompt: &PromptKind) -> Result<String> {
        Err(CoachError::Generation(self.reason.clone()))
    }
}
