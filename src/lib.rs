//! Usage Nudge Agent - privacy-first phone usage monitor with gentle interventions.
//!
//! This library buffers device interaction signals (screen state, foreground
//! app transitions, text-input lengths), aggregates them into fixed windows,
//! classifies each window and turns the result into rate-limited nudges and
//! launch friction for selected apps.
//!
//! # Privacy Guarantees
//!
//! - **No typed content**: Text changes are reduced to a length at ingestion
//! - **No screen content**: Only on/off/unlock transitions are observed
//! - **No raw history**: Events are discarded once their window closes
//! - **Transparency**: All collection and every intervention is counted
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         Usage Nudge Agent                         │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌──────────┐   ┌───────────┐   ┌────────────┐    │
//! │  │  Platform │──▶│  Event   │──▶│ Windowing │──▶│ Classifier │    │
//! │  │  Bridge   │   │ Buffers  │   │ (10s tick)│   │ + Reasoner │    │
//! │  └───────────┘   └──────────┘   └───────────┘   └────────────┘    │
//! │        │                                               │          │
//! │        ▼                                               ▼          │
//! │  ┌───────────┐   ┌──────────┐                   ┌────────────┐    │
//! │  │ Usage Log │──▶│ Friction │──────────────────▶│  Command   │    │
//! │  │ (queries) │   │ (100ms)  │      Nudge ──────▶│    Sink    │    │
//! │  └───────────┘   └──────────┘                   └────────────┘    │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use usage_nudge_agent::{
//!     agent::{Agent, AgentPorts},
//!     classifier::LinearModel,
//!     collector::UsageLog,
//!     config::Config,
//!     core::Scheduler,
//!     intervention::CommandSink,
//!     transparency::create_shared_log,
//! };
//!
//! # async fn run() {
//! let usage_log = Arc::new(UsageLog::new());
//! let sink = Arc::new(CommandSink::stdout());
//! let ports = AgentPorts {
//!     usage_source: usage_log.clone(),
//!     labels: usage_log,
//!     presenter: sink.clone(),
//!     lifecycle: sink,
//! };
//! let agent = Arc::new(Agent::new(
//!     &Config::default(),
//!     LinearModel::default(),
//!     ports,
//!     create_shared_log(),
//! ));
//!
//! let mut scheduler = Scheduler::new();
//! agent.spawn(&mut scheduler);
//! // ... later
//! scheduler.shutdown().await;
//! # }
//! ```

pub mod agent;
pub mod classifier;
pub mod collector;
pub mod config;
pub mod core;
pub mod intervention;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use agent::{Agent, AgentPorts, WindowReport};
pub use classifier::{BehaviorClassifier, ClassifierError, Model, Predictions};
pub use collector::{Collector, CollectorError, PlatformBridge, TelemetryEvent, UsageLog};
pub use config::Config;
pub use core::{BehaviorPattern, Scheduler, WindowAggregator, WindowMetrics};
pub use intervention::{CommandSink, InterventionError};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║            USAGE NUDGE AGENT - PRIVACY DECLARATION               ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent watches usage patterns to suggest healthier habits.  ║
║                                                                  ║
║  ✓ WHAT WE CAPTURE:                                              ║
║    • When the screen turns on, off, or is unlocked               ║
║    • Which apps come to the foreground, and for how long         ║
║    • How many characters were typed (count only)                 ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • What you type (no passwords, messages, etc.)                ║
║    • Anything shown on your screen                               ║
║    • Your location or contacts                                   ║
║                                                                  ║
║  All data is processed locally. Raw events are discarded         ║
║  when their window closes (every 10 seconds). Only if a text     ║
║  insight service is configured, a numbers-only summary of a      ║
║  distracted window is sent to it.                                ║
║                                                                  ║
║  You can view collection statistics anytime with:                ║
║    usage-nudge status                                            ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
