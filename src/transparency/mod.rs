//! Transparency module for the Usage Nudge Agent.
//!
//! This module provides tools for tracking and exposing what data
//! the agent observes and which interventions it issued, supporting user trust.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
