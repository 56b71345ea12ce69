//! Event collection module for the Usage Nudge Agent.
//!
//! Platform event sources (screen broadcasts, usage-stats queries, text-change
//! notifications) live outside this crate. This module defines the normalized
//! events they produce and the bridge that feeds them into the agent.

pub mod bridge;
pub mod types;
pub mod usage_log;

use thiserror::Error;

// Re-export commonly used types
pub use bridge::{Collector, EventSender, PlatformBridge, PlatformNotification};
pub use types::{
    AppUsageEvent, AppUsageEventType, ScreenEvent, ScreenEventType, TelemetryEvent, TypingEvent,
};
pub use usage_log::{AppLabelResolver, UsageLog, UsageStatsSource};

/// Errors that can occur during event collection.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Unrecognized screen action: {0}")]
    UnrecognizedAction(String),

    #[error("Usage stats permission not granted")]
    PermissionDenied,

    #[error("App label lookup failed for {0}")]
    AppLookupFailed(String),

    #[error("Collector is already running")]
    AlreadyRunning,

    #[error("Event channel is full")]
    ChannelFull,

    #[error("Event channel disconnected")]
    Disconnected,

    #[error("Malformed notification: {0}")]
    MalformedNotification(String),
}
