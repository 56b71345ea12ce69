//! Remote model served over HTTP.

use crate::classifier::{BehaviorModel, ClassifierError, FeatureVector, Predictions};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct PredictRequest {
    features: [f32; 4],
}

/// Model behind an HTTP endpoint accepting `{"features": [f; 4]}` and
/// answering with a JSON array of three scores.
#[derive(Debug, Clone)]
pub struct RemoteModel {
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteModel {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClassifierError::Unavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Interpret a response body as three scores.
pub fn parse_predictions(value: &Value) -> Result<Predictions, ClassifierError> {
    let array = value
        .as_array()
        .ok_or_else(|| ClassifierError::MalformedOutput("expected a JSON array".to_string()))?;

    let scores = array
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| ClassifierError::MalformedOutput(format!("not a number: {v}")))
        })
        .collect::<Result<Vec<f32>, _>>()?;

    Predictions::from_slice(&scores)
}

impl BehaviorModel for RemoteModel {
    async fn predict(&self, features: FeatureVector) -> Result<Predictions, ClassifierError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&PredictRequest {
                features: features.to_array(),
            })
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Unavailable(format!(
                "classifier returned {status}"
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::MalformedOutput(e.to_string()))?;

        parse_predictions(&value)
    }
}
