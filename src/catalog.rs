use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoachError, Result};

/// Whether an exercise completes on repetitions or on elapsed time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseKind {
    /// Completes after `target_reps` honored repetitions
    RepBased,
    /// Completes when the countdown reaches zero
    DurationBased,
}

/// Static definition of one movement and its completion target
///
/// Exactly one of `target_reps` and `target_duration_secs` is nonzero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseDescriptor {
    /// Display name, also passed to the motion analyzer
    pub name: String,
    /// Repetitions to complete, zero for timed exercises
    pub target_reps: u32,
    /// Seconds to hold, zero for rep-based exercises
    pub target_duration_secs: u32,
}

impl ExerciseDescriptor {
    /// Rep-based exercise
    #[must_use]
    pub fn reps(name: impl Into<String>, target_reps: u32) -> Self {
        Self {
            name: name.into(),
            target_reps,
            target_duration_secs: 0,
        }
    }

    /// Duration-based exercise
    #[must_use]
    pub fn timed(name: impl Into<String>, target_duration_secs: u32) -> Self {
        Self {
            name: name.into(),
            target_reps: 0,
            target_duration_secs,
        }
    }

    /// Exercise kind derived from the nonzero target
    #[must_use]
    pub const fn kind(&self) -> ExerciseKind {
        if self.target_reps > 0 {
            ExerciseKind::RepBased
        } else {
            ExerciseKind::DurationBased
        }
    }

    /// Check if the exercise counts repetitions
    #[must_use]
    pub const fn is_rep_based(&self) -> bool {
        matches!(self.kind(), ExerciseKind::RepBased)
    }

    /// Check if the exercise runs against the clock
    #[must_use]
    pub const fn is_duration_based(&self) -> bool {
        matches!(self.kind(), ExerciseKind::DurationBased)
    }

    fn validate(&self) -> Result<()> {
        match (self.target_reps, self.target_duration_secs) {
            (0, 0) => Err(CoachError::InvalidCatalog(format!(
                "'{}' has no target",
                self.name
            ))),
            (reps, secs) if reps > 0 && secs > 0 => Err(CoachError::InvalidCatalog(format!(
                "'{}' has both a rep target ({reps}) and a duration target ({secs}s)",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ExerciseDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExerciseKind::RepBased => write!(f, "{} ({} reps)", self.name, self.target_reps),
            ExerciseKind::DurationBased => {
                write!(f, "{} ({}s)", self.name, self.target_duration_secs)
            }
        }
    }
}

/// Ordered, fixed sequence of exercises
///
/// Deserialization runs the same checks as [`Catalog::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CatalogDef")]
pub struct Catalog {
    exercises: Vec<ExerciseDescriptor>,
}

#[derive(Deserialize)]
struct CatalogDef {
    exercises: Vec<ExerciseDescriptor>,
}

impl TryFrom<CatalogDef> for Catalog {
    type Error = CoachError;

    fn try_from(def: CatalogDef) -> Result<Self> {
        Self::new(def.exercises)
    }
}

impl Catalog {
    /// Build a catalog, rejecting empty lists and ill-formed targets
    ///
    /// # Errors
    ///
    /// Returns [`CoachError::InvalidCatalog`] if the list is empty or an entry
    /// does not have exactly one nonzero target.
    pub fn new(exercises: Vec<ExerciseDescriptor>) -> Result<Self> {
        if exercises.is_empty() {
            return Err(CoachError::InvalidCatalog(
                "catalog must contain at least one exercise".to_string(),
            ));
        }

        for exercise in &exercises {
            exercise.validate()?;
        }

        Ok(Self { exercises })
    }

    /// Number of exercises
    #[must_use]
    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    /// Always false; a catalog holds at least one exercise
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Exercise at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ExerciseDescriptor> {
        self.exercises.get(index)
    }

    /// Exercise at `index`, wrapping modulo the catalog length
    #[must_use]
    pub fn at(&self, index: usize) -> &ExerciseDescriptor {
        &self.exercises[index % self.exercises.len()]
    }

    /// Index following `index`, wrapping to the start
    #[must_use]
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.exercises.len()
    }

    /// Iterate in session order
    pub fn iter(&self) -> impl Iterator<Item = &ExerciseDescriptor> {
        self.exercises.iter()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            exercises: vec![
                ExerciseDescriptor::reps("Push-ups", 15),
                ExerciseDescriptor::reps("Squats", 20),
                ExerciseDescriptor::timed("Plank", 60),
                ExerciseDescriptor::timed("Jumping Jacks", 45),
                ExerciseDescriptor::reps("Lunges", 12),
            ],
        }
    }
}
