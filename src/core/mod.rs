//! Core functionality for the Usage Nudge Agent.
//!
//! This module contains:
//! - Per-kind event buffers shared by producers and periodic tasks
//! - Foreground-duration tracking from app usage events
//! - The self-rescheduling periodic task runner
//! - Window aggregation into metrics
//! - Pattern reasoning over classifier output

pub mod buffer;
pub mod reasoner;
pub mod scheduler;
pub mod usage;
pub mod windowing;

// Re-export commonly used types
pub use buffer::{EventBuffer, TelemetryBuffers};
pub use reasoner::{BehaviorPattern, PatternReasoner, PatternThresholds};
pub use scheduler::{FirstTick, PeriodicTask, Scheduler, TaskHandle};
pub use usage::{UsageDurationTracker, UsageSession};
pub use windowing::{compute_metrics, EventWindow, WindowAggregator, WindowMetrics};
