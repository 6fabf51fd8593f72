//! Decision function: runs the scoring model over an encoded submission and applies the
//! hire threshold.
//!
//! The model sits behind the [`Scorer`] trait so any local or remote runtime can be swapped
//! in without touching the pipeline or the HTTP handlers. `AppState` and the stream consumer
//! share one [`DecisionEngine`]; it holds no mutable state.

pub mod handlers;
pub mod model;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::features::{encode, FeatureVector};
use crate::models::{Decision, Submission};

/// Probabilities at or above this value are a Hire.
pub const HIRE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("feature vector has width {actual}, model expects {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("feature {position} is named '{actual}', model expects '{expected}'")]
    FeatureNameMismatch {
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("feature '{name}' is not a finite number")]
    NonFiniteValue { name: String },

    #[error("model returned {0}, which is not a probability")]
    InvalidProbability(f32),

    #[error("scoring backend failed: {0}")]
    Backend(String),
}

/// A scoring model: feature vector plus parallel names in, hire probability out.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, values: &[f32], names: &[&str]) -> Result<f32, ScoringError>;
}

/// Maps a model probability to a label. The boundary belongs to Hire.
pub fn classify(probability: f32) -> Decision {
    if probability >= HIRE_THRESHOLD {
        Decision::Hire
    } else {
        Decision::Reject
    }
}

#[derive(Clone)]
pub struct DecisionEngine {
    scorer: Arc<dyn Scorer>,
}

impl DecisionEngine {
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Self { scorer }
    }

    pub async fn decide(&self, features: &FeatureVector) -> Result<Decision, ScoringError> {
        let probability = self
            .scorer
            .score(features.values(), features.names())
            .await?;

        // NaN fails the range check too
        if !(0.0..=1.0).contains(&probability) {
            return Err(ScoringError::InvalidProbability(probability));
        }

        Ok(classify(probability))
    }

    /// Encode then decide.
    pub async fn evaluate(&self, submission: &Submission) -> Result<Decision, ScoringError> {
        self.decide(&encode(submission)).await
    }
}
