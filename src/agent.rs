//! Agent wiring.
//!
//! The [`Agent`] owns every piece of mutable state (event buffers, usage
//! tracker, cooldown tables) and exposes one method per periodic task. The
//! [`Scheduler`] drives those methods; nothing here is a global.

use crate::classifier::{
    insight, BehaviorClassifier, BehaviorInsights, BehaviorModel, Classification, InsightClient,
};
use crate::collector::types::TelemetryEvent;
use crate::collector::usage_log::{AppLabelResolver, UsageStatsSource};
use crate::collector::CollectorError;
use crate::config::Config;
use crate::core::buffer::TelemetryBuffers;
use crate::core::reasoner::{BehaviorPattern, PatternReasoner};
use crate::core::scheduler::{FirstTick, PeriodicTask, Scheduler};
use crate::core::usage::{UsageDurationTracker, UsageSession};
use crate::core::windowing::{WindowAggregator, WindowMetrics};
use crate::intervention::{
    AppLifecycle, FrictionOutcome, LaunchFrictionController, NudgeController, NudgeOutcome,
    Presenter,
};
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::broadcast;

/// How far back the first usage poll reaches.
pub const INITIAL_USAGE_LOOKBACK_MINUTES: i64 = 60;

const SESSION_CHANNEL_CAPACITY: usize = 256;

/// External collaborators the agent talks to.
#[derive(Clone)]
pub struct AgentPorts {
    pub usage_source: Arc<dyn UsageStatsSource>,
    pub labels: Arc<dyn AppLabelResolver>,
    pub presenter: Arc<dyn Presenter>,
    pub lifecycle: Arc<dyn AppLifecycle>,
}

/// Periods of the three periodic tasks.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub window: Duration,
    pub usage_poll: Duration,
    pub friction_poll: Duration,
}

impl Schedule {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window: config.window_duration,
            usage_poll: config.usage_poll_interval,
            friction_poll: config.friction_poll_interval,
        }
    }
}

/// Outcome of one window tick.
#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub metrics: WindowMetrics,
    /// None when the classifier produced no signal
    pub classification: Option<Classification>,
    #[serde(skip)]
    pub nudge: Option<NudgeOutcome>,
}

impl WindowReport {
    pub fn pattern(&self) -> Option<&BehaviorPattern> {
        self.classification.as_ref().map(|c| &c.pattern)
    }
}

/// The windowing and intervention pipeline.
pub struct Agent<M> {
    schedule: Schedule,
    buffers: TelemetryBuffers,
    aggregator: WindowAggregator,
    classifier: BehaviorClassifier<M>,
    insight: Option<InsightClient>,
    nudge: NudgeController,
    friction: LaunchFrictionController,
    tracker: Mutex<Option<UsageDurationTracker>>,
    usage_source: Arc<dyn UsageStatsSource>,
    labels: Arc<dyn AppLabelResolver>,
    sessions: broadcast::Sender<UsageSession>,
    transparency: SharedTransparencyLog,
    paused: AtomicBool,
}

impl<M: BehaviorModel + 'static> Agent<M> {
    pub fn new(
        config: &Config,
        model: M,
        ports: AgentPorts,
        transparency: SharedTransparencyLog,
    ) -> Self {
        let (sessions, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);
        Self {
            schedule: Schedule::from_config(config),
            buffers: TelemetryBuffers::new(),
            aggregator: WindowAggregator::new(config.window_duration),
            classifier: BehaviorClassifier::new(
                model,
                PatternReasoner::new(config.thresholds.clone()),
            ),
            insight: None,
            nudge: NudgeController::new(
                config.nudge_cooldown(),
                ports.presenter.clone(),
                transparency.clone(),
            ),
            friction: LaunchFrictionController::new(
                config.friction_settings(),
                ports.usage_source.clone(),
                ports.presenter,
                ports.lifecycle,
                transparency.clone(),
            ),
            tracker: Mutex::new(None),
            usage_source: ports.usage_source,
            labels: ports.labels,
            sessions,
            transparency,
            paused: AtomicBool::new(config.paused),
        }
    }

    /// Ask the text-insight service for the break signal on distracted windows.
    pub fn with_insight(mut self, client: InsightClient) -> Self {
        self.insight = Some(client);
        self
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn buffers(&self) -> &TelemetryBuffers {
        &self.buffers
    }

    pub fn transparency(&self) -> &SharedTransparencyLog {
        &self.transparency
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Pause or resume. Pausing drops everything buffered so far.
    pub fn set_paused(&self, paused: bool) {
        let was = self.paused.swap(paused, Ordering::SeqCst);
        if paused && !was {
            self.buffers.clear();
            tracing::info!("Collection paused");
        } else if !paused && was {
            tracing::info!("Collection resumed");
        }
    }

    /// Observe usage sessions as they are emitted.
    pub fn subscribe_sessions(&self) -> broadcast::Receiver<UsageSession> {
        self.sessions.subscribe()
    }

    /// Append one event to its buffer.
    pub fn ingest(&self, event: TelemetryEvent) {
        if self.is_paused() {
            return;
        }
        match &event {
            TelemetryEvent::Screen(_) => self.transparency.record_screen_event(),
            TelemetryEvent::Typing(_) => self.transparency.record_typing_event(),
            TelemetryEvent::Usage(_) => self.transparency.record_usage_events(1),
        }
        tracing::trace!(at = %event.timestamp(), "Event buffered");
        self.buffers.append(event);
    }

    /// Close the window ending at `now`: aggregate, prune, classify and
    /// consider a nudge. Returns None while paused.
    pub async fn run_window_tick(&self, now: DateTime<Utc>) -> Option<WindowReport> {
        if self.is_paused() {
            return None;
        }

        let metrics = self.aggregator.aggregate(&self.buffers, now);
        self.transparency.record_window_completed();
        tracing::info!(
            screen_on_ms = metrics.screen_on_duration_ms,
            unlocks = metrics.unlock_count,
            keys_typed = metrics.keys_typed,
            active_apps = metrics.active_app_count(),
            "Window completed"
        );

        let classification = match self.classifier.classify(&metrics).await {
            Ok(classification) => classification,
            Err(e) => {
                tracing::warn!("No behavior signal for window: {e}");
                self.transparency.record_classifier_failure();
                return Some(WindowReport {
                    metrics,
                    classification: None,
                    nudge: None,
                });
            }
        };

        for reason in &classification.pattern.reasons {
            tracing::info!(reason = %reason, "Behavior flagged");
        }

        let nudge = if classification.pattern.is_distracted {
            if !self.nudge.is_ready(now) {
                tracing::debug!("Nudge cooling down, break signal not requested");
                return Some(WindowReport {
                    metrics,
                    classification: Some(classification),
                    nudge: Some(NudgeOutcome::CoolingDown),
                });
            }
            let insights = self.break_signal(&metrics, &classification.pattern).await;
            self.nudge.consider(&classification.pattern, &insights, now)
        } else {
            NudgeOutcome::NotWarranted
        };

        Some(WindowReport {
            metrics,
            classification: Some(classification),
            nudge: Some(nudge),
        })
    }

    async fn break_signal(&self, metrics: &WindowMetrics, pattern: &BehaviorPattern) -> BehaviorInsights {
        let Some(client) = &self.insight else {
            return BehaviorInsights::from_pattern(pattern);
        };

        match client.analyze(&insight::summarize(metrics, pattern)).await {
            Ok(insights) => insights,
            Err(e) => {
                tracing::warn!("Text insight failed, no break signal: {e}");
                BehaviorInsights {
                    message: String::new(),
                    suggests_break: false,
                    indicates_high_usage: false,
                }
            }
        }
    }

    /// Fetch usage records since the previous poll, fold them into sessions
    /// and publish every finished or still-running session.
    ///
    /// On error nothing is changed; the next poll covers the same range.
    pub fn run_usage_poll(&self, now: DateTime<Utc>) -> Result<Vec<UsageSession>, CollectorError> {
        if self.is_paused() {
            return Ok(Vec::new());
        }

        let mut guard = self.tracker.lock().unwrap_or_else(PoisonError::into_inner);
        let tracker = guard.get_or_insert_with(|| {
            UsageDurationTracker::new(now - ChronoDuration::minutes(INITIAL_USAGE_LOOKBACK_MINUTES))
        });

        let events = self.usage_source.query_events(tracker.last_check(), now)?;
        self.transparency.record_usage_events(events.len() as u64);

        let mut sessions = Vec::new();
        for event in events {
            if let Some(session) = tracker.fold(&event, self.labels.as_ref()) {
                sessions.push(session);
            }
            self.buffers.usage.append(event);
        }
        tracker.mark_checked(now);
        sessions.extend(tracker.flush_running(now, self.labels.as_ref()));
        drop(guard);

        for session in &sessions {
            tracing::info!(
                app = %session.app_label,
                duration_ms = session.duration_ms,
                still_running = session.still_running,
                "App usage"
            );
            // No subscribers is fine.
            let _ = self.sessions.send(session.clone());
        }

        Ok(sessions)
    }

    /// Look for fresh launches of target apps.
    pub fn run_friction_poll(&self, now: DateTime<Utc>) -> Result<Vec<FrictionOutcome>, CollectorError> {
        if self.is_paused() {
            return Ok(Vec::new());
        }
        self.friction.poll(now)
    }

    /// Register the three periodic tasks on `scheduler`.
    pub fn spawn(self: &Arc<Self>, scheduler: &mut Scheduler) {
        let agent = self.clone();
        scheduler.spawn(PeriodicTask::new("window", self.schedule.window), move || {
            let agent = agent.clone();
            async move {
                agent.run_window_tick(Utc::now()).await;
                anyhow::Ok(())
            }
        });

        let agent = self.clone();
        scheduler.spawn(
            PeriodicTask::new("usage-poll", self.schedule.usage_poll),
            move || {
                let agent = agent.clone();
                async move {
                    match agent.run_usage_poll(Utc::now()) {
                        Ok(_) => anyhow::Ok(()),
                        Err(CollectorError::PermissionDenied) => {
                            tracing::warn!("Usage poll skipped: usage access not granted");
                            Ok(())
                        }
                        Err(e) => Err(anyhow::Error::from(e)),
                    }
                }
            },
        );

        let agent = self.clone();
        scheduler.spawn(
            PeriodicTask::new("friction-poll", self.schedule.friction_poll)
                .first_tick(FirstTick::AfterPeriod),
            move || {
                let agent = agent.clone();
                async move {
                    match agent.run_friction_poll(Utc::now()) {
                        Ok(_) => anyhow::Ok(()),
                        Err(CollectorError::PermissionDenied) => {
                            tracing::trace!("Friction poll skipped: usage access not granted");
                            Ok(())
                        }
                        Err(e) => Err(anyhow::Error::from(e)),
                    }
                }
            },
        );
    }
}

/// Drain the collector channel into the agent's buffers on a background
/// thread until `running` is cleared or every sender is gone.
pub fn spawn_event_pump<M: BehaviorModel + 'static>(
    agent: Arc<Agent<M>>,
    receiver: Receiver<TelemetryEvent>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => agent.ingest(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("Event channel closed");
                    break;
                }
            }
        }
    })
}
