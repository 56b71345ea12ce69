//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use usage_nudge_agent::classifier::{BehaviorModel, ClassifierError, FeatureVector, Predictions};
use usage_nudge_agent::collector::{Collector, PlatformBridge, UsageLog};
use usage_nudge_agent::intervention::OutboundCommand;
use usage_nudge_agent::{Agent, AgentPorts, CommandSink, Config, SharedTransparencyLog};

/// Fixed reference instant so timestamps in input lines are readable.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Model returning the same scores for every window, optionally slow or
/// failing on the listed calls.
pub struct ScriptedModel {
    scores: [f32; 3],
    fail_on: Vec<usize>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn always(scores: [f32; 3]) -> Self {
        Self {
            scores,
            fail_on: Vec::new(),
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Model that takes `latency` to answer every request.
    pub fn slow(scores: [f32; 3], latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::always(scores)
        }
    }

    pub fn failing_on(scores: [f32; 3], fail_on: Vec<usize>) -> Self {
        Self {
            scores,
            fail_on,
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl BehaviorModel for ScriptedModel {
    async fn predict(&self, _: FeatureVector) -> Result<Predictions, ClassifierError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_on.contains(&call) {
            return Err(ClassifierError::Unavailable("model not loaded".to_string()));
        }
        Predictions::from_slice(&self.scores)
    }
}

/// In-memory writer standing in for the platform shim's stdin.
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn commands(&self) -> Vec<OutboundCommand> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                serde_json::from_value(value).unwrap()
            })
            .collect()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A fully wired agent fed through the platform bridge.
pub struct Harness {
    pub agent: Arc<Agent<ScriptedModel>>,
    pub bridge: PlatformBridge,
    pub collector: Collector,
    pub usage_log: Arc<UsageLog>,
    pub output: CapturedOutput,
    pub sink: Arc<CommandSink>,
    pub transparency: SharedTransparencyLog,
}

impl Harness {
    pub fn new(model: ScriptedModel) -> Self {
        Self::with_config(&Config::default(), model)
    }

    pub fn with_config(config: &Config, model: ScriptedModel) -> Self {
        let transparency = usage_nudge_agent::transparency::create_shared_log();
        let usage_log = Arc::new(UsageLog::new());
        let output = CapturedOutput::default();
        let sink = Arc::new(CommandSink::new(Box::new(output.clone())));

        let ports = AgentPorts {
            usage_source: usage_log.clone(),
            labels: usage_log.clone(),
            presenter: sink.clone(),
            lifecycle: sink.clone(),
        };
        let agent = Arc::new(Agent::new(config, model, ports, transparency.clone()));

        let mut collector = Collector::new();
        collector.start().unwrap();
        let bridge = PlatformBridge::new(collector.sender(), usage_log.clone(), transparency.clone());

        Self {
            agent,
            bridge,
            collector,
            usage_log,
            output,
            sink,
            transparency,
        }
    }

    /// Feed JSON lines through the bridge and move queued events into the agent.
    pub fn feed(&self, lines: &[String]) {
        for line in lines {
            self.bridge.dispatch_line(line).unwrap();
        }
        while let Some(event) = self.collector.try_recv() {
            self.agent.ingest(event);
        }
    }
}

pub fn screen_line(action: &str, at: DateTime<Utc>) -> String {
    serde_json::json!({ "kind": "screen", "action": action, "timestamp": at }).to_string()
}

pub fn usage_line(package: &str, code: &str, at: DateTime<Utc>) -> String {
    serde_json::json!({ "kind": "usage", "package": package, "code": code, "timestamp": at })
        .to_string()
}

pub fn text_line(package: &str, length: u32, at: DateTime<Utc>) -> String {
    serde_json::json!({ "kind": "text_changed", "package": package, "length": length, "timestamp": at })
        .to_string()
}
