//! Human-readable justifications for flagged behavior.
//!
//! Given classifier predictions and the raw window metrics, pick exactly one
//! reason per flagged dimension using a fixed precedence order.

use crate::classifier::Predictions;
use crate::core::windowing::WindowMetrics;
use serde::{Deserialize, Serialize};

/// Unlocks in one window above which unlocks explain a flag.
pub const HIGH_UNLOCK_COUNT: u32 = 5;
/// Screen-on time above which screen time explains distraction (5 minutes).
pub const HIGH_SCREEN_TIME_MS: i64 = 300_000;
/// Distinct foreground apps above which app switching explains compulsive checking.
pub const RAPID_APP_SWITCHES: usize = 8;
/// Characters per window considered heavy typing.
pub const HIGH_TYPING_COUNT: u64 = 500;
/// Confidence at or above which a prediction is flagged.
pub const FLAG_THRESHOLD: f32 = 0.7;

/// Secondary thresholds used to explain flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternThresholds {
    pub flag_threshold: f32,
    pub high_unlock_count: u32,
    pub high_screen_time_ms: i64,
    pub rapid_app_switches: usize,
    pub high_typing_count: u64,
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            flag_threshold: FLAG_THRESHOLD,
            high_unlock_count: HIGH_UNLOCK_COUNT,
            high_screen_time_ms: HIGH_SCREEN_TIME_MS,
            rapid_app_switches: RAPID_APP_SWITCHES,
            high_typing_count: HIGH_TYPING_COUNT,
        }
    }
}

/// Behavior detected in one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub is_distracted: bool,
    pub is_compulsive_checking: bool,
    pub is_high_typing_activity: bool,
    /// One reason per flag, in the order distracted, compulsive, typing
    pub reasons: Vec<String>,
}

impl BehaviorPattern {
    /// Whether any dimension was flagged.
    pub fn any_flagged(&self) -> bool {
        self.is_distracted || self.is_compulsive_checking || self.is_high_typing_activity
    }

    /// The justification for the distraction flag, if set.
    pub fn distraction_reason(&self) -> Option<&str> {
        if self.is_distracted {
            self.reasons.first().map(String::as_str)
        } else {
            None
        }
    }
}

/// Applies precedence rules to explain classifier flags.
#[derive(Debug, Clone, Default)]
pub struct PatternReasoner {
    thresholds: PatternThresholds,
}

impl PatternReasoner {
    pub fn new(thresholds: PatternThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PatternThresholds {
        &self.thresholds
    }

    /// Derive the behavior pattern for one window.
    pub fn explain(&self, predictions: &Predictions, metrics: &WindowMetrics) -> BehaviorPattern {
        let threshold = self.thresholds.flag_threshold;
        let is_distracted = predictions.distracted >= threshold;
        let is_compulsive_checking = predictions.compulsive_checking >= threshold;
        let is_high_typing_activity = predictions.high_typing >= threshold;

        let mut reasons = Vec::new();
        if is_distracted {
            reasons.push(self.distraction_reason(metrics));
        }
        if is_compulsive_checking {
            reasons.push(self.compulsive_checking_reason(metrics));
        }
        if is_high_typing_activity {
            reasons.push(format!(
                "High typing activity: {} characters typed",
                metrics.keys_typed
            ));
        }

        BehaviorPattern {
            is_distracted,
            is_compulsive_checking,
            is_high_typing_activity,
            reasons,
        }
    }

    fn distraction_reason(&self, metrics: &WindowMetrics) -> String {
        let detail = if metrics.unlock_count > self.thresholds.high_unlock_count {
            format!("High unlock count ({} times)", metrics.unlock_count)
        } else if metrics.screen_on_duration_ms > self.thresholds.high_screen_time_ms {
            format!(
                "Extended screen time ({} seconds)",
                metrics.screen_on_duration_ms / 1000
            )
        } else {
            "Multiple factors".to_string()
        };
        format!("Distraction detected: {detail}")
    }

    fn compulsive_checking_reason(&self, metrics: &WindowMetrics) -> String {
        let detail = if metrics.unlock_count > self.thresholds.high_unlock_count {
            format!("Frequent unlocks ({} times)", metrics.unlock_count)
        } else if metrics.active_app_count() > self.thresholds.rapid_app_switches {
            format!("Rapid app switching ({} apps)", metrics.active_app_count())
        } else {
            "Multiple factors".to_string()
        };
        format!("Compulsive checking: {detail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn metrics(unlocks: u32, screen_ms: i64, apps: usize, keys: u64) -> WindowMetrics {
        let start = Utc::now();
        WindowMetrics {
            window_start: start,
            window_end: start + Duration::seconds(10),
            duration_seconds: 10,
            screen_on_duration_ms: screen_ms,
            unlock_count: unlocks,
            keys_typed: keys,
            active_apps: (0..apps).map(|i| format!("app{i}")).collect::<BTreeSet<_>>(),
        }
    }

    fn predictions(d: f32, c: f32, t: f32) -> Predictions {
        Predictions {
            distracted: d,
            compulsive_checking: c,
            high_typing: t,
        }
    }

    #[test]
    fn test_unlock_reason_wins_over_screen_time() {
        let reasoner = PatternReasoner::default();
        let pattern = reasoner.explain(&predictions(0.9, 0.1, 0.1), &metrics(6, 400_000, 0, 0));

        assert!(pattern.is_distracted);
        assert_eq!(
            pattern.reasons,
            vec!["Distraction detected: High unlock count (6 times)".to_string()]
        );
    }

    #[test]
    fn test_screen_time_reason_when_unlocks_low() {
        let reasoner = PatternReasoner::default();
        let pattern = reasoner.explain(&predictions(0.8, 0.0, 0.0), &metrics(5, 300_001, 0, 0));
        assert_eq!(
            pattern.distraction_reason(),
            Some("Distraction detected: Extended screen time (300 seconds)")
        );
    }

    #[test]
    fn test_multiple_factors_fallback() {
        let reasoner = PatternReasoner::default();
        let pattern = reasoner.explain(&predictions(0.7, 0.7, 0.0), &metrics(1, 1_000, 3, 0));
        assert_eq!(
            pattern.reasons,
            vec![
                "Distraction detected: Multiple factors".to_string(),
                "Compulsive checking: Multiple factors".to_string(),
            ]
        );
    }

    #[test]
    fn test_compulsive_checking_precedence() {
        let reasoner = PatternReasoner::default();

        let pattern = reasoner.explain(&predictions(0.0, 0.95, 0.0), &metrics(7, 0, 12, 0));
        assert_eq!(pattern.reasons, vec!["Compulsive checking: Frequent unlocks (7 times)"]);

        let pattern = reasoner.explain(&predictions(0.0, 0.95, 0.0), &metrics(2, 0, 9, 0));
        assert_eq!(pattern.reasons, vec!["Compulsive checking: Rapid app switching (9 apps)"]);
    }

    #[test]
    fn test_typing_always_reports_count() {
        let reasoner = PatternReasoner::default();
        let pattern = reasoner.explain(&predictions(0.0, 0.0, 0.99), &metrics(0, 0, 0, 42));
        assert!(pattern.is_high_typing_activity);
        assert_eq!(pattern.reasons, vec!["High typing activity: 42 characters typed"]);
    }

    #[test]
    fn test_below_threshold_flags_nothing() {
        let reasoner = PatternReasoner::default();
        let pattern = reasoner.explain(&predictions(0.69, 0.5, 0.1), &metrics(10, 900_000, 15, 900));
        assert!(!pattern.any_flagged());
        assert!(pattern.reasons.is_empty());
        assert_eq!(pattern.distraction_reason(), None);
    }
}
