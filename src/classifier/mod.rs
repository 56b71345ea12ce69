//! Behavior classification.
//!
//! Window metrics are normalized into a four-element [`FeatureVector`] and
//! handed to a [`BehaviorModel`], which returns three confidence scores. The
//! [`BehaviorClassifier`] port combines the model with the [`PatternReasoner`]
//! to turn those scores into a [`BehaviorPattern`].
//!
//! [`PatternReasoner`]: crate::core::reasoner::PatternReasoner
//! [`BehaviorPattern`]: crate::core::reasoner::BehaviorPattern

pub mod insight;
pub mod local;
pub mod remote;

use crate::core::reasoner::{BehaviorPattern, PatternReasoner};
use crate::core::windowing::WindowMetrics;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

pub use insight::{BehaviorInsights, InsightClient, InsightConfig};
pub use local::LinearModel;
pub use remote::RemoteModel;

/// One hour of screen time.
pub const SCREEN_TIME_SCALE_MS: f32 = 3_600_000.0;
pub const UNLOCK_SCALE: f32 = 20.0;
pub const TYPING_SCALE: f32 = 1_000.0;
pub const ACTIVE_APP_SCALE: f32 = 20.0;

/// Errors surfaced by classifiers.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed classifier output: {0}")]
    MalformedOutput(String),

    #[error("Unparseable insight response: {0}")]
    UnparseableResponse(String),
}

/// Normalized model input.
///
/// Values are scaled against fixed ceilings but never clamped, so a heavy
/// window can produce features above 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub screen_time: f32,
    pub unlocks: f32,
    pub typing: f32,
    pub active_apps: f32,
}

impl FeatureVector {
    pub fn from_metrics(metrics: &WindowMetrics) -> Self {
        Self {
            screen_time: metrics.screen_on_duration_ms as f32 / SCREEN_TIME_SCALE_MS,
            unlocks: metrics.unlock_count as f32 / UNLOCK_SCALE,
            typing: metrics.keys_typed as f32 / TYPING_SCALE,
            active_apps: metrics.active_app_count() as f32 / ACTIVE_APP_SCALE,
        }
    }

    /// Features in model input order.
    pub fn to_array(self) -> [f32; 4] {
        [self.screen_time, self.unlocks, self.typing, self.active_apps]
    }
}

/// Confidence scores in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    pub distracted: f32,
    pub compulsive_checking: f32,
    pub high_typing: f32,
}

impl Predictions {
    /// Validate a raw model output vector.
    pub fn from_slice(values: &[f32]) -> Result<Self, ClassifierError> {
        let [distracted, compulsive_checking, high_typing] = values else {
            return Err(ClassifierError::MalformedOutput(format!(
                "expected 3 scores, got {}",
                values.len()
            )));
        };

        for score in values {
            if !score.is_finite() || !(0.0..=1.0).contains(score) {
                return Err(ClassifierError::MalformedOutput(format!(
                    "score out of range: {score}"
                )));
            }
        }

        Ok(Self {
            distracted: *distracted,
            compulsive_checking: *compulsive_checking,
            high_typing: *high_typing,
        })
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.distracted, self.compulsive_checking, self.high_typing]
    }
}

/// A model mapping features to confidence scores.
pub trait BehaviorModel: Send + Sync {
    fn predict(
        &self,
        features: FeatureVector,
    ) -> impl Future<Output = Result<Predictions, ClassifierError>> + Send;
}

/// Runtime choice between the bundled and a remote model.
#[derive(Debug)]
pub enum Model {
    Local(LinearModel),
    Remote(RemoteModel),
}

impl BehaviorModel for Model {
    async fn predict(&self, features: FeatureVector) -> Result<Predictions, ClassifierError> {
        match self {
            Model::Local(model) => model.predict(features).await,
            Model::Remote(model) => model.predict(features).await,
        }
    }
}

/// Result of classifying one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub features: FeatureVector,
    pub predictions: Predictions,
    pub pattern: BehaviorPattern,
}

/// Classifier port: normalize, infer, explain.
#[derive(Debug)]
pub struct BehaviorClassifier<M> {
    model: M,
    reasoner: PatternReasoner,
}

impl<M: BehaviorModel> BehaviorClassifier<M> {
    pub fn new(model: M, reasoner: PatternReasoner) -> Self {
        Self { model, reasoner }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn reasoner(&self) -> &PatternReasoner {
        &self.reasoner
    }

    /// Classify one window's metrics.
    pub async fn classify(&self, metrics: &WindowMetrics) -> Result<Classification, ClassifierError> {
        let features = FeatureVector::from_metrics(metrics);
        let predictions = self.model.predict(features).await?;
        let pattern = self.reasoner.explain(&predictions, metrics);

        tracing::debug!(
            distracted = predictions.distracted,
            compulsive_checking = predictions.compulsive_checking,
            high_typing = predictions.high_typing,
            "Window classified"
        );

        Ok(Classification {
            features,
            predictions,
            pattern,
        })
    }
}
