use crate::pipeline::{CycleReport, RedditPipeline};
use mentionwatch_core::{CoreError, ErrorReporter};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// One unit of scheduled work.
pub trait CycleRunner: Send + Sync + 'static {
    fn run_cycle(&self) -> impl Future<Output = Result<CycleReport, CoreError>> + Send;
}

impl CycleRunner for RedditPipeline {
    fn run_cycle(&self) -> impl Future<Output = Result<CycleReport, CoreError>> + Send {
        RedditPipeline::run_cycle(self)
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Runs a cycle immediately on start and then once per interval until stopped.
/// Cycles run on a single task and never overlap.
pub struct MonitorService<R> {
    runner: Arc<R>,
    interval: Duration,
    cycles_completed: Arc<AtomicU64>,
    running: Option<Running>,
}

impl<R: CycleRunner> MonitorService<R> {
    pub fn new(runner: R, interval: Duration) -> Self {
        Self {
            runner: Arc::new(runner),
            interval,
            cycles_completed: Arc::new(AtomicU64::new(0)),
            running: None,
        }
    }

    pub fn from_minutes(runner: R, poll_interval_minutes: u64) -> Self {
        Self::new(runner, Duration::from_secs(poll_interval_minutes.max(1) * 60))
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Cycles that ran to completion, successful or not.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::SeqCst)
    }

    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.is_running() {
            return Err(CoreError::InvalidInput {
                message: "monitor service is already running".to_string(),
            });
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let runner = Arc::clone(&self.runner);
        let cycles = Arc::clone(&self.cycles_completed);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let reporter = ErrorReporter::new();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.changed() => break,
                }

                tokio::select! {
                    result = runner.run_cycle() => {
                        match result {
                            Ok(report) => info!(
                                "Scheduled cycle stored {} of {} fetched mentions",
                                report.stored, report.fetched
                            ),
                            Err(e) => reporter.report_error(&e),
                        }
                        cycles.fetch_add(1, Ordering::SeqCst);
                    }
                    _ = shutdown_rx.changed() => {
                        warn!("Monitor stopped during a cycle");
                        break;
                    }
                }
            }
            info!("Monitor loop exited");
        });

        info!("Monitor service started, polling every {:?}", interval);
        self.running = Some(Running { shutdown, handle });
        Ok(())
    }

    /// Signals the loop and waits for it to finish. Stopping an idle service is a no-op.
    pub async fn stop(&mut self) -> Result<(), CoreError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        // The receiver is gone if the task already ended; nothing to signal then.
        let _ = running.shutdown.send(true);
        running.handle.await.map_err(|e| CoreError::Internal {
            message: format!("monitor task failed: {}", e),
        })?;
        info!("Monitor service stopped");
        Ok(())
    }
}
