//! Privacy-preserving transparency log.
//!
//! This module tracks and exposes statistics about what the agent observed
//! and did, without storing any personal or identifying information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Transparency statistics for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Number of screen events ingested
    screen_events: AtomicU64,
    /// Number of app usage events ingested
    usage_events: AtomicU64,
    /// Number of text-change events ingested
    typing_events: AtomicU64,
    /// Notifications that were malformed or could not be queued
    dropped_notifications: AtomicU64,
    /// Number of windows completed
    windows_completed: AtomicU64,
    /// Windows for which the classifier produced no signal
    classifier_failures: AtomicU64,
    nudges_shown: AtomicU64,
    /// Nudges skipped because presentation was unavailable
    nudges_deferred: AtomicU64,
    /// Terminate and relaunch cycles performed
    friction_actions: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            screen_events: AtomicU64::new(0),
            usage_events: AtomicU64::new(0),
            typing_events: AtomicU64::new(0),
            dropped_notifications: AtomicU64::new(0),
            windows_completed: AtomicU64::new(0),
            classifier_failures: AtomicU64::new(0),
            nudges_shown: AtomicU64::new(0),
            nudges_deferred: AtomicU64::new(0),
            friction_actions: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a transparency log with persistence.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        // Try to load existing stats
        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous transparency stats: {e}");
        }

        log
    }

    pub fn record_screen_event(&self) {
        self.screen_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch of usage events returned by one poll.
    pub fn record_usage_events(&self, count: u64) {
        self.usage_events.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_typing_event(&self) {
        self.typing_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_notification(&self) {
        self.dropped_notifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed window.
    pub fn record_window_completed(&self) {
        self.windows_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classifier_failure(&self) {
        self.classifier_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nudge_shown(&self) {
        self.nudges_shown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nudge_deferred(&self) {
        self.nudges_deferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_friction_action(&self) {
        self.friction_actions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            screen_events: self.screen_events.load(Ordering::Relaxed),
            usage_events: self.usage_events.load(Ordering::Relaxed),
            typing_events: self.typing_events.load(Ordering::Relaxed),
            dropped_notifications: self.dropped_notifications.load(Ordering::Relaxed),
            windows_completed: self.windows_completed.load(Ordering::Relaxed),
            classifier_failures: self.classifier_failures.load(Ordering::Relaxed),
            nudges_shown: self.nudges_shown.load(Ordering::Relaxed),
            nudges_deferred: self.nudges_deferred.load(Ordering::Relaxed),
            friction_actions: self.friction_actions.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Screen events processed: {}\n\
             - App usage events processed: {}\n\
             - Text-change events processed: {}\n\
             - Notifications dropped: {}\n\
             - Windows completed: {}\n\
             - Windows without classifier signal: {}\n\
             - Nudges shown: {} (deferred: {})\n\
             - Launch friction actions: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No typed text captured, only lengths\n\
             - No screen content captured\n\
             - Only timing, package names and counts retained",
            stats.screen_events,
            stats.usage_events,
            stats.typing_events,
            stats.dropped_notifications,
            stats.windows_completed,
            stats.classifier_failures,
            stats.nudges_shown,
            stats.nudges_deferred,
            stats.friction_actions,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                screen_events: stats.screen_events,
                usage_events: stats.usage_events,
                typing_events: stats.typing_events,
                dropped_notifications: stats.dropped_notifications,
                windows_completed: stats.windows_completed,
                classifier_failures: stats.classifier_failures,
                nudges_shown: stats.nudges_shown,
                nudges_deferred: stats.nudges_deferred,
                friction_actions: stats.friction_actions,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.screen_events
                    .store(persisted.screen_events, Ordering::Relaxed);
                self.usage_events
                    .store(persisted.usage_events, Ordering::Relaxed);
                self.typing_events
                    .store(persisted.typing_events, Ordering::Relaxed);
                self.dropped_notifications
                    .store(persisted.dropped_notifications, Ordering::Relaxed);
                self.windows_completed
                    .store(persisted.windows_completed, Ordering::Relaxed);
                self.classifier_failures
                    .store(persisted.classifier_failures, Ordering::Relaxed);
                self.nudges_shown
                    .store(persisted.nudges_shown, Ordering::Relaxed);
                self.nudges_deferred
                    .store(persisted.nudges_deferred, Ordering::Relaxed);
                self.friction_actions
                    .store(persisted.friction_actions, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.screen_events,
            &self.usage_events,
            &self.typing_events,
            &self.dropped_notifications,
            &self.windows_completed,
            &self.classifier_failures,
            &self.nudges_shown,
            &self.nudges_deferred,
            &self.friction_actions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub screen_events: u64,
    pub usage_events: u64,
    pub typing_events: u64,
    pub dropped_notifications: u64,
    pub windows_completed: u64,
    pub classifier_failures: u64,
    pub nudges_shown: u64,
    pub nudges_deferred: u64,
    pub friction_actions: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    screen_events: u64,
    #[serde(default)]
    usage_events: u64,
    #[serde(default)]
    typing_events: u64,
    #[serde(default)]
    dropped_notifications: u64,
    #[serde(default)]
    windows_completed: u64,
    #[serde(default)]
    classifier_failures: u64,
    #[serde(default)]
    nudges_shown: u64,
    #[serde(default)]
    nudges_deferred: u64,
    #[serde(default)]
    friction_actions: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

/// Create a new shared transparency log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transparency_log_counting() {
        let log = TransparencyLog::new();

        log.record_screen_event();
        log.record_screen_event();
        log.record_usage_events(3);
        log.record_typing_event();
        log.record_nudge_deferred();

        let stats = log.stats();
        assert_eq!(stats.screen_events, 2);
        assert_eq!(stats.usage_events, 3);
        assert_eq!(stats.typing_events, 1);
        assert_eq!(stats.nudges_deferred, 1);
        assert_eq!(stats.nudges_shown, 0);
    }

    #[test]
    fn test_transparency_log_reset() {
        let log = TransparencyLog::new();

        log.record_usage_events(100);
        log.record_friction_action();
        log.record_classifier_failure();
        log.reset();

        let stats = log.stats();
        assert_eq!(stats.usage_events, 0);
        assert_eq!(stats.friction_actions, 0);
        assert_eq!(stats.classifier_failures, 0);
    }

    #[test]
    fn test_summary_format() {
        let log = TransparencyLog::new();
        let summary = log.summary();

        assert!(summary.contains("Screen events"));
        assert!(summary.contains("Nudges shown"));
        assert!(summary.contains("Privacy Guarantee"));
        assert!(summary.contains("No typed text captured"));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transparency_stats.json");

        let log = TransparencyLog::with_persistence(path.clone());
        log.record_window_completed();
        log.record_nudge_shown();
        log.save().unwrap();

        let restored = TransparencyLog::with_persistence(path);
        let stats = restored.stats();
        assert_eq!(stats.windows_completed, 1);
        assert_eq!(stats.nudges_shown, 1);
    }
}
