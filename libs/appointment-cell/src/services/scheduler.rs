// libs/appointment-cell/src/services/scheduler.rs
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use shared_config::SchedulingSettings;

use crate::engine::AppointmentEngine;
use crate::models::{AppointmentError, GenerationReport, SweepReport};

type Job<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, AppointmentError>> + Send + Sync>;

#[derive(Debug)]
pub enum TaskOutcome<T> {
    Ran(T),
    /// Another run of the same task was still in progress.
    Skipped,
    Failed(AppointmentError),
}

/// A named job with a run lock: at most one execution at a time, overlapping
/// invocations are skipped rather than queued.
pub struct PeriodicTask<T> {
    name: &'static str,
    interval: Duration,
    lock: Mutex<()>,
    job: Job<T>,
}

impl<T: Debug + Send + 'static> PeriodicTask<T> {
    pub fn new<F>(name: &'static str, interval: Duration, job: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<T, AppointmentError>> + Send + Sync + 'static,
    {
        Self {
            name,
            interval,
            lock: Mutex::new(()),
            job: Arc::new(job),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run_once(&self) -> TaskOutcome<T> {
        let Ok(_guard) = self.lock.try_lock() else {
            warn!("Task {} is already running, skipping this invocation", self.name);
            return TaskOutcome::Skipped;
        };

        debug!("Running task {}", self.name);
        match (self.job)().await {
            Ok(report) => {
                info!("Task {} completed: {:?}", self.name, report);
                TaskOutcome::Ran(report)
            }
            Err(e) => {
                error!("Task {} failed: {}", self.name, e);
                TaskOutcome::Failed(e)
            }
        }
    }
}

/// Drives slot generation and the expiry sweep on their own interval loops.
pub struct MaintenanceScheduler {
    generation: Arc<PeriodicTask<GenerationReport>>,
    sweep: Arc<PeriodicTask<SweepReport>>,
    generate_on_startup: bool,
    shutdown: watch::Sender<bool>,
}

impl MaintenanceScheduler {
    pub fn new(engine: Arc<AppointmentEngine>, settings: &SchedulingSettings) -> Self {
        let generating = engine.clone();
        let generation = PeriodicTask::new(
            "slot-generation",
            Duration::from_secs(settings.generation_interval_secs.max(1)),
            move || {
                let engine = generating.clone();
                async move { engine.generate_availability().await }.boxed()
            },
        );

        let sweeping = engine;
        let sweep = PeriodicTask::new(
            "expiry-sweep",
            Duration::from_secs(settings.sweep_interval_secs.max(1)),
            move || {
                let engine = sweeping.clone();
                async move { engine.sweep_expired().await }.boxed()
            },
        );

        let (shutdown, _) = watch::channel(false);

        Self {
            generation: Arc::new(generation),
            sweep: Arc::new(sweep),
            generate_on_startup: settings.generate_on_startup,
            shutdown,
        }
    }

    pub fn generation(&self) -> &Arc<PeriodicTask<GenerationReport>> {
        &self.generation
    }

    pub fn sweep(&self) -> &Arc<PeriodicTask<SweepReport>> {
        &self.sweep
    }

    /// Starts both loops. The sweep runs immediately; generation runs
    /// immediately only when `generate_on_startup` is set.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        info!(
            "Starting maintenance scheduler (generation every {:?}, sweep every {:?})",
            self.generation.interval(),
            self.sweep.interval()
        );

        vec![
            tokio::spawn(Self::task_loop(
                self.generation.clone(),
                self.generate_on_startup,
                self.shutdown.subscribe(),
            )),
            tokio::spawn(Self::task_loop(self.sweep.clone(), true, self.shutdown.subscribe())),
        ]
    }

    pub fn shutdown(&self) {
        info!("Stopping maintenance scheduler");
        self.shutdown.send_replace(true);
    }

    async fn task_loop<T: Debug + Send + Sync + 'static>(
        task: Arc<PeriodicTask<T>>,
        run_immediately: bool,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(task.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if !run_immediately {
            interval.tick().await;
        }

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    task.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Task loop {} received shutdown signal", task.name());
                        break;
                    }
                }
            }
        }
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
