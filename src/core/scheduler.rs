//! Self-rescheduling periodic tasks.
//!
//! Each task waits one full period *after* its previous tick completes, so an
//! overrunning tick pushes later boundaries back instead of overlapping them.
//! Cancellation stops pending timers; a tick already running is allowed to
//! finish.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// When a task fires for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstTick {
    /// Fire as soon as the task starts
    Immediate,
    /// Wait one period before the first tick
    AfterPeriod,
}

/// A named periodic task definition.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    first_tick: FirstTick,
}

impl PeriodicTask {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            first_tick: FirstTick::Immediate,
        }
    }

    pub fn first_tick(mut self, first_tick: FirstTick) -> Self {
        self.first_tick = first_tick;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the task on the current tokio runtime.
    ///
    /// Each tick runs in its own spawned task: an error or a panic is logged
    /// and the schedule carries on.
    pub fn spawn<F, Fut>(self, cancel: CancellationToken, mut tick: F) -> TaskHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = ticks.clone();
        let token = cancel.clone();
        let PeriodicTask {
            name,
            period,
            first_tick,
        } = self;

        let handle = tokio::spawn(async move {
            tracing::debug!(task = name, period_ms = period.as_millis() as u64, "Periodic task started");

            if first_tick == FirstTick::AfterPeriod && !wait_or_cancel(period, &token).await {
                tracing::debug!(task = name, "Periodic task cancelled before first tick");
                return;
            }

            loop {
                match tokio::spawn(tick()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(task = name, "Tick failed: {e:#}"),
                    Err(e) => tracing::error!(task = name, "Tick aborted: {e}"),
                }
                counter.fetch_add(1, Ordering::Relaxed);

                if !wait_or_cancel(period, &token).await {
                    break;
                }
            }

            tracing::debug!(task = name, "Periodic task stopped");
        });

        TaskHandle {
            name,
            cancel,
            handle,
            ticks,
        }
    }
}

/// Sleep for `period`. Returns false if cancelled first.
async fn wait_or_cancel(period: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(period) => true,
    }
}

/// Handle to a spawned periodic task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of completed ticks.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Cancel the pending timer. An in-flight tick still completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to exit.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(task = self.name, "Periodic task join failed: {e}");
        }
    }
}

/// Owns a group of periodic tasks sharing one shutdown signal.
#[derive(Debug, Default)]
pub struct Scheduler {
    shutdown: CancellationToken,
    tasks: Vec<TaskHandle>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task that stops when the scheduler shuts down.
    pub fn spawn<F, Fut>(&mut self, task: PeriodicTask, tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handle = task.spawn(self.shutdown.child_token(), tick);
        self.tasks.push(handle);
    }

    /// Completed tick count per task name.
    pub fn tick_counts(&self) -> Vec<(&'static str, u64)> {
        self.tasks
            .iter()
            .map(|t| (t.name(), t.tick_count()))
            .collect()
    }

    /// Cancel every task and wait for in-flight ticks to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            task.join().await;
        }
        tracing::info!("All periodic tasks stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tokio::time::Instant;

    async fn noop() -> anyhow::Result<()> {
        Ok(())
    }

    async fn fail() -> anyhow::Result<()> {
        anyhow::bail!("classifier unavailable")
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_first_tick_then_fixed_period() {
        let starts = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = starts.clone();
        let origin = Instant::now();
        let cancel = CancellationToken::new();

        let handle = PeriodicTask::new("test", Duration::from_secs(10)).spawn(cancel.clone(), move || {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(Instant::now());
                anyhow::Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(25)).await;
        handle.cancel();
        handle.join().await;

        let starts = starts.lock().unwrap();
        let offsets: Vec<u64> = starts.iter().map(|s| (*s - origin).as_secs()).collect();
        assert_eq!(offsets, vec![0, 10, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_period_first_tick() {
        let cancel = CancellationToken::new();
        let handle = PeriodicTask::new("test", Duration::from_millis(100))
            .first_tick(FirstTick::AfterPeriod)
            .spawn(cancel.clone(), noop);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.tick_count(), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.tick_count(), 1);

        cancel.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_ticks_do_not_stop_the_task() {
        let cancel = CancellationToken::new();
        let handle = PeriodicTask::new("flaky", Duration::from_secs(1)).spawn(cancel.clone(), fail);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(handle.tick_count(), 4);

        cancel.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_cancel() {
        let cancel = CancellationToken::new();
        let handle = PeriodicTask::new("test", Duration::from_secs(1)).spawn(cancel.clone(), noop);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(handle.tick_count(), 3);
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_tick_completes_after_cancel() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let cancel = CancellationToken::new();

        let handle = PeriodicTask::new("slow", Duration::from_secs(10)).spawn(cancel.clone(), move || {
            let flag = flag.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                flag.store(true, Ordering::SeqCst);
                anyhow::Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        handle.join().await;

        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_shutdown_stops_all_tasks() {
        let mut scheduler = Scheduler::new();
        scheduler.spawn(PeriodicTask::new("a", Duration::from_secs(1)), noop);
        scheduler.spawn(PeriodicTask::new("b", Duration::from_millis(100)), noop);

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        let counts = scheduler.tick_counts();
        assert_eq!(counts[0], ("a", 2));
        assert_eq!(counts[1], ("b", 11));

        scheduler.shutdown().await;
    }
}
