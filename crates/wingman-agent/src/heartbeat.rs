// SPDX-FileCopyrightText: 2026 Wingman Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic background tasks.
//!
//! The [`HeartbeatScheduler`] wakes on a fixed tick and spawns every task
//! that is enabled, due and not already running. A task's next run is
//! scheduled one interval after its previous run finishes, so a slow task
//! never overlaps itself. Errors and panics are counted and logged; they
//! never disable the task or stop the loop.

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wingman_config::model::HeartbeatConfig;
use wingman_core::WingmanError;
use wingman_provider::ProviderManager;
use wingman_session::SessionManager;

type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, Result<(), WingmanError>> + Send + Sync>;

struct TaskEntry {
    /// Distinguishes this registration from earlier ones under the same name.
    generation: u64,
    interval: Duration,
    enabled: bool,
    running: bool,
    next_run: Instant,
    last_run: Option<DateTime<Utc>>,
    run_count: u64,
    error_count: u64,
    last_error: Option<String>,
    task: TaskFn,
}

/// Snapshot of one task, as reported by [`HeartbeatScheduler::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeartbeatTaskStatus {
    pub name: String,
    pub interval_secs: u64,
    pub enabled: bool,
    pub running: bool,
    /// Seconds until the task is due; zero when overdue.
    pub due_in_secs: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
}

pub struct HeartbeatScheduler {
    tick: Duration,
    tasks: Arc<Mutex<BTreeMap<String, TaskEntry>>>,
    generations: AtomicU64,
}

impl HeartbeatScheduler {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            tasks: Arc::new(Mutex::new(BTreeMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    /// Registers `task` to run every `interval`, first one interval from
    /// now. Re-registering a name replaces the previous task; a run of the
    /// old task still in flight finishes without touching the new entry.
    pub async fn register<F, Fut>(&self, name: &str, interval: Duration, enabled: bool, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), WingmanError>> + Send + 'static,
    {
        let task: TaskFn = Arc::new(move || task().boxed());
        let entry = TaskEntry {
            generation: self.generations.fetch_add(1, Ordering::Relaxed),
            interval,
            enabled,
            running: false,
            next_run: Instant::now() + interval,
            last_run: None,
            run_count: 0,
            error_count: 0,
            last_error: None,
            task,
        };
        self.tasks.lock().await.insert(name.to_string(), entry);
        info!(task = name, interval_secs = interval.as_secs(), enabled, "heartbeat task registered");
    }

    pub async fn unregister(&self, name: &str) -> bool {
        self.tasks.lock().await.remove(name).is_some()
    }

    /// Returns false when no task is registered under `name`.
    pub async fn enable(&self, name: &str) -> bool {
        self.set_enabled(name, true).await
    }

    pub async fn disable(&self, name: &str) -> bool {
        self.set_enabled(name, false).await
    }

    async fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.tasks.lock().await.get_mut(name) {
            Some(entry) => {
                entry.enabled = enabled;
                debug!(task = name, enabled, "heartbeat task toggled");
                true
            }
            None => false,
        }
    }

    /// Status of every task, sorted by name.
    pub async fn status(&self) -> Vec<HeartbeatTaskStatus> {
        let now = Instant::now();
        self.tasks
            .lock()
            .await
            .iter()
            .map(|(name, entry)| HeartbeatTaskStatus {
                name: name.clone(),
                interval_secs: entry.interval.as_secs(),
                enabled: entry.enabled,
                running: entry.running,
                due_in_secs: entry.next_run.saturating_duration_since(now).as_secs(),
                last_run: entry.last_run,
                run_count: entry.run_count,
                error_count: entry.error_count,
                last_error: entry.last_error.clone(),
            })
            .collect()
    }

    /// Ticks until `cancel` fires. Tasks still running at that point finish
    /// on their own.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_secs = self.tick.as_secs_f64(), "heartbeat scheduler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("heartbeat scheduler stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.dispatch_due().await;
                }
            }
        }
    }

    /// Spawns every due task and returns how many were started.
    pub async fn dispatch_due(&self) -> usize {
        let now = Instant::now();
        let mut tasks = self.tasks.lock().await;
        let mut started = 0;

        for (name, entry) in tasks.iter_mut() {
            if !entry.enabled || entry.running || now < entry.next_run {
                continue;
            }
            entry.running = true;
            started += 1;

            let name = name.clone();
            let generation = entry.generation;
            let run = (entry.task)();
            let table = self.tasks.clone();
            tokio::spawn(async move {
                debug!(task = %name, "heartbeat task started");
                let result = AssertUnwindSafe(run).catch_unwind().await;
                let mut tasks = table.lock().await;
                let Some(entry) = tasks
                    .get_mut(&name)
                    .filter(|entry| entry.generation == generation)
                else {
                    debug!(task = %name, "heartbeat task replaced while running, result dropped");
                    return;
                };
                entry.running = false;
                entry.next_run = Instant::now() + entry.interval;
                match result {
                    Ok(Ok(())) => {
                        entry.run_count += 1;
                        entry.last_run = Some(Utc::now());
                    }
                    Ok(Err(e)) => {
                        warn!(task = %name, error = %e, "heartbeat task failed");
                        entry.error_count += 1;
                        entry.last_error = Some(e.to_string());
                    }
                    Err(_) => {
                        warn!(task = %name, "heartbeat task panicked");
                        entry.error_count += 1;
                        entry.last_error = Some("task panicked".into());
                    }
                }
            });
        }
        started
    }
}

/// Registers `session_cleanup` and `provider_health` per `config`.
pub async fn register_default_tasks(
    scheduler: &HeartbeatScheduler,
    config: &HeartbeatConfig,
    sessions: Arc<SessionManager>,
    providers: Arc<ProviderManager>,
) {
    let max_idle = Duration::from_secs(config.session_max_idle_secs);
    scheduler
        .register(
            "session_cleanup",
            Duration::from_secs(config.session_cleanup_secs),
            true,
            move || {
                let sessions = sessions.clone();
                async move {
                    let evicted = sessions.evict_idle(max_idle).await;
                    debug!(evicted, live = sessions.live_count(), "session cleanup finished");
                    Ok(())
                }
            },
        )
        .await;

    scheduler
        .register(
            "provider_health",
            Duration::from_secs(config.provider_health_secs),
            config.provider_health_enabled,
            move || {
                let providers = providers.clone();
                async move {
                    for health in providers.health_report().await {
                        if health.status.is_reachable() {
                            info!(
                                provider = %health.name,
                                circuit = ?health.circuit,
                                success_rate = health.success_rate,
                                "provider healthy"
                            );
                        } else {
                            warn!(provider = %health.name, status = ?health.status, "provider unhealthy");
                        }
                    }
                    Ok(())
                }
            },
        )
        .await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter_task(
        counter: &Arc<AtomicUsize>,
    ) -> impl Fn() -> BoxFuture<'static, Result<(), WingmanError>> + Send + Sync + 'static {
        let counter = counter.clone();
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_each_interval_until_cancelled() {
        let scheduler = Arc::new(HeartbeatScheduler::new(Duration::from_secs(1)));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("count", Duration::from_secs(5), true, counter_task(&counter))
            .await;

        let cancel = CancellationToken::new();
        let loop_handle = tokio::spawn({
            let scheduler = scheduler.clone();
            let cancel = cancel.clone();
            async move { scheduler.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(16_500)).await;
        cancel.cancel();
        loop_handle.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        let status = scheduler.status().await;
        assert_eq!(status[0].run_count, 3);
        assert_eq!(status[0].error_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_tasks_wait_until_enabled() {
        let scheduler = HeartbeatScheduler::new(Duration::from_secs(1));
        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("idle", Duration::from_secs(1), false, counter_task(&counter))
            .await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(scheduler.dispatch_due().await, 0);

        assert!(scheduler.enable("idle").await);
        assert_eq!(scheduler.dispatch_due().await, 1);
        assert!(!scheduler.enable("ghost").await);
    }

    #[tokio::test(start_paused = true)]
    async fn running_tasks_do_not_overlap() {
        let scheduler = HeartbeatScheduler::new(Duration::from_secs(1));
        scheduler
            .register("slow", Duration::from_secs(1), true, || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<(), WingmanError>(())
            })
            .await;

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(scheduler.dispatch_due().await, 1);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(scheduler.dispatch_due().await, 0);
        assert!(scheduler.status().await[0].running);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_and_panics_are_counted_not_fatal() {
        let scheduler = HeartbeatScheduler::new(Duration::from_secs(1));
        scheduler
            .register("fails", Duration::from_secs(1), true, || async {
                Err::<(), _>(WingmanError::Internal("disk full".into()))
            })
            .await;
        scheduler
            .register("panics", Duration::from_secs(1), true, || async {
                let explode = true;
                if explode {
                    panic!("boom");
                }
                Ok::<(), WingmanError>(())
            })
            .await;

        for _ in 0..2 {
            tokio::time::advance(Duration::from_secs(1)).await;
            assert_eq!(scheduler.dispatch_due().await, 2);
            // Let the spawned tasks finish and record their results.
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
        }

        let status = scheduler.status().await;
        let fails = status.iter().find(|s| s.name == "fails").unwrap();
        let panics = status.iter().find(|s| s.name == "panics").unwrap();
        assert_eq!(fails.error_count, 2);
        assert_eq!(fails.last_error.as_deref(), Some("internal error: disk full"));
        assert!(fails.enabled);
        assert_eq!(panics.error_count, 2);
        assert_eq!(panics.last_error.as_deref(), Some("task panicked"));
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_task_ignores_stale_completion() {
        let scheduler = HeartbeatScheduler::new(Duration::from_secs(1));
        scheduler
            .register("swap", Duration::from_secs(1), true, || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<(), WingmanError>(())
            })
            .await;
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(scheduler.dispatch_due().await, 1);

        let counter = Arc::new(AtomicUsize::new(0));
        scheduler
            .register("swap", Duration::from_secs(5), true, counter_task(&counter))
            .await;
        assert!(!scheduler.status().await[0].running);

        // The old run finishes now.
        tokio::time::sleep(Duration::from_secs(10)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let status = scheduler.status().await;
        assert_eq!(status[0].run_count, 0);
        assert_eq!(status[0].interval_secs, 5);
        assert_eq!(status[0].due_in_secs, 0);

        assert_eq!(scheduler.dispatch_due().await, 1);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.status().await[0].run_count, 1);
    }

    #[tokio::test]
    async fn unregister_removes_task() {
        let scheduler = HeartbeatScheduler::new(Duration::from_secs(1));
        scheduler
            .register("gone", Duration::from_secs(60), true, || async {
                Ok::<(), WingmanError>(())
            })
            .await;
        assert!(scheduler.unregister("gone").await);
        assert!(!scheduler.unregister("gone").await);
        assert!(scheduler.status().await.is_empty());
    }
}
