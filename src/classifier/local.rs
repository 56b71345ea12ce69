//! Bundled on-device model.
//!
//! One logistic regression per output over the four normalized features.

use crate::classifier::{BehaviorModel, ClassifierError, FeatureVector, Predictions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-output weights and bias, in [`Predictions`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: [[f32; 4]; 3],
    pub biases: [f32; 3],
}

impl Default for LinearModel {
    fn default() -> Self {
        Self {
            weights: [
                // distracted: screen time and unlocks dominate
                [20.0, 8.0, 0.0, 2.0],
                // compulsive checking: unlocks and app hopping
                [0.0, 12.0, 0.0, 6.0],
                // high typing
                [0.0, 0.0, 8.0, 0.0],
            ],
            biases: [-3.0, -4.0, -4.0],
        }
    }
}

impl LinearModel {
    /// Load weights from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::Unavailable(format!("cannot read model {}: {e}", path.display()))
        })?;
        let model: LinearModel = serde_json::from_str(&content).map_err(|e| {
            ClassifierError::Unavailable(format!("invalid model {}: {e}", path.display()))
        })?;

        let finite = model
            .weights
            .iter()
            .flatten()
            .chain(model.biases.iter())
            .all(|w| w.is_finite());
        if !finite {
            return Err(ClassifierError::Unavailable(format!(
                "model {} contains non-finite weights",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loaded behavior model weights");
        Ok(model)
    }

    /// Raw scores for `features`.
    pub fn evaluate(&self, features: FeatureVector) -> [f32; 3] {
        let x = features.to_array();
        let mut out = [0.0; 3];
        for (i, score) in out.iter_mut().enumerate() {
            let z: f32 = self.weights[i]
                .iter()
                .zip(x.iter())
                .map(|(w, f)| w * f)
                .sum::<f32>()
                + self.biases[i];
            *score = sigmoid(z);
        }
        out
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

impl BehaviorModel for LinearModel {
    async fn predict(&self, features: FeatureVector) -> Result<Predictions, ClassifierError> {
        Predictions::from_slice(&self.evaluate(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(screen_time: f32, unlocks: f32, typing: f32, active_apps: f32) -> FeatureVector {
        FeatureVector {
            screen_time,
            unlocks,
            typing,
            active_apps,
        }
    }

    #[tokio::test]
    async fn test_idle_window_scores_low() {
        let model = LinearModel::default();
        let predictions = model.predict(features(0.0, 0.0, 0.0, 0.0)).await.unwrap();
        assert!(predictions.distracted < 0.1);
        assert!(predictions.compulsive_checking < 0.1);
        assert!(predictions.high_typing < 0.1);
    }

    #[tokio::test]
    async fn test_heavy_unlocking_flags_compulsive_checking() {
        let model = LinearModel::default();
        let predictions = model.predict(features(0.0, 0.5, 0.0, 0.1)).await.unwrap();
        assert!(predictions.compulsive_checking >= 0.7);
    }

    #[tokio::test]
    async fn test_unclamped_features_stay_in_range() {
        let model = LinearModel::default();
        let predictions = model.predict(features(50.0, 50.0, 50.0, 50.0)).await.unwrap();
        for score in predictions.to_array() {
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = LinearModel {
            weights: [[1.0; 4]; 3],
            biases: [0.0; 3],
        };
        std::fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();

        assert_eq!(LinearModel::from_file(&path).unwrap(), model);
    }

    #[test]
    fn test_missing_or_invalid_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            LinearModel::from_file(&missing),
            Err(ClassifierError::Unavailable(_))
        ));

        let invalid = dir.path().join("invalid.json");
        std::fs::write(&invalid, r#"{"weights": [1, 2]}"#).unwrap();
        assert!(matches!(
            LinearModel::from_file(&invalid),
            Err(ClassifierError::Unavailable(_))
        ));
    }
}
