//! Network text-insight classifier.
//!
//! A privacy-safe summary of a window (numbers only) is sent to a hosted text
//! model; the generated text is scanned for break and high-usage cues.

use crate::classifier::ClassifierError;
use crate::core::reasoner::BehaviorPattern;
use crate::core::windowing::WindowMetrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_MODEL_ID: &str = "distilbert-base-uncased";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Field carrying the generated text in every supported response shape.
const RESULT_FIELD: &str = "generated_text";

/// Text-insight service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightConfig {
    pub api_token: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl InsightConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            model_id: default_model_id(),
            base_url: default_base_url(),
        }
    }

    /// Inference endpoint for the configured model.
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.model_id)
    }
}

/// Signals extracted from generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorInsights {
    pub message: String,
    pub suggests_break: bool,
    pub indicates_high_usage: bool,
}

impl BehaviorInsights {
    pub fn from_text(text: impl Into<String>) -> Self {
        let message = text.into();
        let lower = message.to_lowercase();
        Self {
            suggests_break: lower.contains("break"),
            indicates_high_usage: lower.contains("high usage") || lower.contains("excessive"),
            message,
        }
    }

    /// Local fallback used when no insight service is configured:
    /// a distracted window suggests a break.
    pub fn from_pattern(pattern: &BehaviorPattern) -> Self {
        Self {
            message: pattern
                .reasons
                .first()
                .cloned()
                .unwrap_or_else(|| "No notable pattern".to_string()),
            suggests_break: pattern.is_distracted,
            indicates_high_usage: pattern.is_distracted || pattern.is_compulsive_checking,
        }
    }
}

type ShapeMatcher = fn(&Value) -> Option<String>;

/// Response shapes, tried in order.
const RESPONSE_SHAPES: &[(&str, ShapeMatcher)] = &[
    ("object", match_object),
    ("wrapped array", match_wrapped_array),
    ("array of objects", match_object_array),
    ("array of strings", match_string_array),
];

fn match_object(value: &Value) -> Option<String> {
    value.get(RESULT_FIELD)?.as_str().map(str::to_string)
}

fn match_wrapped_array(value: &Value) -> Option<String> {
    let first = value.get("generated_texts")?.as_array()?.first()?;
    match_object(first).or_else(|| first.as_str().map(str::to_string))
}

fn match_object_array(value: &Value) -> Option<String> {
    match_object(value.as_array()?.first()?)
}

fn match_string_array(value: &Value) -> Option<String> {
    value.as_array()?.first()?.as_str().map(str::to_string)
}

/// Extract the generated text from a raw response body.
pub fn parse_response(body: &str) -> Result<String, ClassifierError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ClassifierError::UnparseableResponse(format!("invalid JSON: {e}")))?;

    for (shape, matcher) in RESPONSE_SHAPES {
        if let Some(text) = matcher(&value) {
            tracing::trace!(shape, "Insight response matched");
            return Ok(text);
        }
    }

    Err(ClassifierError::UnparseableResponse(
        "no known response shape matched".to_string(),
    ))
}

/// Build the numbers-only summary sent to the insight service.
pub fn summarize(metrics: &WindowMetrics, pattern: &BehaviorPattern) -> String {
    let mut summary = format!(
        "In the last {} seconds: screen on for {} seconds, {} unlocks, {} characters typed, {} apps opened.",
        metrics.duration_seconds,
        metrics.screen_on_duration_ms / 1000,
        metrics.unlock_count,
        metrics.keys_typed,
        metrics.active_app_count(),
    );
    if !pattern.reasons.is_empty() {
        summary.push(' ');
        summary.push_str(&pattern.reasons.join("; "));
    }
    summary
}

/// Client for the hosted text model.
#[derive(Debug, Clone)]
pub struct InsightClient {
    config: InsightConfig,
    client: reqwest::Client,
}

impl InsightClient {
    pub fn new(config: InsightConfig) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClassifierError::Unavailable(format!("HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    /// Ask the model about `input` and extract insights from its reply.
    pub async fn analyze(&self, input: &str) -> Result<BehaviorInsights, ClassifierError> {
        let response = self
            .client
            .post(self.config.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_token))
            .json(&serde_json::json!({ "inputs": input }))
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Unavailable(format!(
                "insight service returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;
        tracing::debug!(bytes = body.len(), "Insight response received");

        let insights = BehaviorInsights::from_text(parse_response(&body)?);
        tracing::info!(
            suggests_break = insights.suggests_break,
            indicates_high_usage = insights.indicates_high_usage,
            "Behavior insight"
        );
        Ok(insights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    #[test]
    fn test_parse_object_shape() {
        let text = parse_response(r#"{"generated_text": "Take a break"}"#).unwrap();
        assert_eq!(text, "Take a break");
    }

    #[test]
    fn test_parse_array_shapes() {
        assert_eq!(
            parse_response(r#"[{"generated_text": "first"}, {"generated_text": "second"}]"#).unwrap(),
            "first"
        );
        assert_eq!(parse_response(r#"["plain"]"#).unwrap(), "plain");
        assert_eq!(
            parse_response(r#"{"generated_texts": ["wrapped"]}"#).unwrap(),
            "wrapped"
        );
    }

    #[test]
    fn test_unknown_shapes_are_unparseable() {
        for body in [r#"{"label": "x"}"#, "[]", "[1, 2]", "not json"] {
            assert!(
                matches!(parse_response(body), Err(ClassifierError::UnparseableResponse(_))),
                "{body}"
            );
        }
    }

    #[test]
    fn test_insights_from_text() {
        let insights = BehaviorInsights::from_text("Excessive scrolling. Consider a BREAK.");
        assert!(insights.suggests_break);
        assert!(insights.indicates_high_usage);

        let insights = BehaviorInsights::from_text("All good");
        assert!(!insights.suggests_break);
        assert!(!insights.indicates_high_usage);
    }

    #[test]
    fn test_insights_from_pattern() {
        let pattern = BehaviorPattern {
            is_distracted: true,
            reasons: vec!["Distraction detected: Multiple factors".to_string()],
            ..Default::default()
        };
        let insights = BehaviorInsights::from_pattern(&pattern);
        assert!(insights.suggests_break);
        assert_eq!(insights.message, "Distraction detected: Multiple factors");

        let quiet = BehaviorInsights::from_pattern(&BehaviorPattern::default());
        assert!(!quiet.suggests_break);
    }

    #[test]
    fn test_summary_contains_only_numbers_and_reasons() {
        let now = Utc::now();
        let metrics = WindowMetrics {
            window_start: now,
            window_end: now,
            duration_seconds: 10,
            screen_on_duration_ms: 9_000,
            unlock_count: 1,
            keys_typed: 600,
            active_apps: ["com.secret.app".to_string()].into_iter().collect::<BTreeSet<_>>(),
        };
        let summary = summarize(&metrics, &BehaviorPattern::default());
        assert!(summary.contains("screen on for 9 seconds"));
        assert!(summary.contains("600 characters"));
        assert!(!summary.contains("com.secret.app"));
    }

    #[test]
    fn test_endpoint() {
        let mut config = InsightConfig::new("token");
        assert_eq!(
            config.endpoint(),
            "https://api-inference.huggingface.co/models/distilbert-base-uncased"
        );
        config.base_url = "http://localhost:8080/".to_string();
        config.model_id = "m".to_string();
        assert_eq!(config.endpoint(), "http://localhost:8080/m");
    }
}
