//! Privacy-preserving event types for the Usage Nudge Agent.
//!
//! These types capture ONLY timing, package identity and magnitudes - never
//! typed content.

use crate::collector::CollectorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform action broadcast when the display turns on.
pub const ACTION_SCREEN_ON: &str = "android.intent.action.SCREEN_ON";
/// Platform action broadcast when the display turns off.
pub const ACTION_SCREEN_OFF: &str = "android.intent.action.SCREEN_OFF";
/// Platform action broadcast when the user unlocks the device.
pub const ACTION_USER_PRESENT: &str = "android.intent.action.USER_PRESENT";

/// Screen state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreenEventType {
    ScreenOn,
    ScreenOff,
    /// The device was unlocked
    UserPresent,
}

impl ScreenEventType {
    /// Map a raw platform action string to a screen event type.
    ///
    /// Both the fully-qualified action and its bare suffix are accepted.
    pub fn from_action(action: &str) -> Result<Self, CollectorError> {
        match action.trim() {
            ACTION_SCREEN_ON | "SCREEN_ON" => Ok(Self::ScreenOn),
            ACTION_SCREEN_OFF | "SCREEN_OFF" => Ok(Self::ScreenOff),
            ACTION_USER_PRESENT | "USER_PRESENT" => Ok(Self::UserPresent),
            other => Err(CollectorError::UnrecognizedAction(other.to_string())),
        }
    }

    /// Human-readable description used in logs.
    pub fn describe(&self) -> &'static str {
        match self {
            ScreenEventType::ScreenOn => "Screen turned ON",
            ScreenEventType::ScreenOff => "Screen turned OFF",
            ScreenEventType::UserPresent => "User unlocked device",
        }
    }
}

/// A screen state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenEvent {
    pub event_type: ScreenEventType,
    pub timestamp: DateTime<Utc>,
}

impl ScreenEvent {
    pub fn new(event_type: ScreenEventType) -> Self {
        Self::at(event_type, Utc::now())
    }

    pub fn at(event_type: ScreenEventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            timestamp,
        }
    }

    /// Build a screen event from a raw platform action string.
    pub fn from_action(action: &str, timestamp: DateTime<Utc>) -> Result<Self, CollectorError> {
        Ok(Self::at(ScreenEventType::from_action(action)?, timestamp))
    }
}

/// App lifecycle transition reported by the usage-stats source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppUsageEventType {
    Resumed,
    Paused,
    Stopped,
    Destroyed,
    Foreground,
    Background,
    Other,
}

impl AppUsageEventType {
    /// Map a raw usage code to an event type. Unknown codes map to `Other`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "ACTIVITY_RESUMED" | "RESUMED" => Self::Resumed,
            "ACTIVITY_PAUSED" | "PAUSED" => Self::Paused,
            "ACTIVITY_STOPPED" | "STOPPED" => Self::Stopped,
            "ACTIVITY_DESTROYED" | "DESTROYED" => Self::Destroyed,
            "MOVE_TO_FOREGROUND" | "FOREGROUND" => Self::Foreground,
            "MOVE_TO_BACKGROUND" | "BACKGROUND" => Self::Background,
            _ => Self::Other,
        }
    }
}

/// An app usage event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUsageEvent {
    pub package_name: String,
    pub event_type: AppUsageEventType,
    pub timestamp: DateTime<Utc>,
}

impl AppUsageEvent {
    pub fn new(
        package_name: impl Into<String>,
        event_type: AppUsageEventType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            event_type,
            timestamp,
        }
    }

    /// Build a usage event from a raw usage code. Never fails.
    pub fn from_code(package_name: impl Into<String>, code: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new(package_name, AppUsageEventType::from_code(code), timestamp)
    }
}

/// A text-input change.
///
/// Privacy guarantee: only the length of the changed text is kept, never the
/// text itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEvent {
    pub package_name: String,
    /// Number of characters in the changed text
    pub text_length: u32,
    pub timestamp: DateTime<Utc>,
}

impl TypingEvent {
    pub fn new(package_name: impl Into<String>, text_length: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            package_name: package_name.into(),
            text_length,
            timestamp,
        }
    }
}

/// Unified event type pushed by producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    Screen(ScreenEvent),
    Usage(AppUsageEvent),
    Typing(TypingEvent),
}

impl TelemetryEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TelemetryEvent::Screen(e) => e.timestamp,
            TelemetryEvent::Usage(e) => e.timestamp,
            TelemetryEvent::Typing(e) => e.timestamp,
        }
    }
}

impl From<ScreenEvent> for TelemetryEvent {
    fn from(event: ScreenEvent) -> Self {
        TelemetryEvent::Screen(event)
    }
}

impl From<AppUsageEvent> for TelemetryEvent {
    fn from(event: AppUsageEvent) -> Self {
        TelemetryEvent::Usage(event)
    }
}

impl From<TypingEvent> for TelemetryEvent {
    fn from(event: TypingEvent) -> Self {
        TelemetryEvent::Typing(event)
    }
}
