use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::SweepConfig;
use crate::errors::{LendingError, Result};
use crate::ledger::Ledger;
use crate::reconcile::Reconciler;

/// handle to a repeating sweep task
///
/// The task stops when `cancel` or `shutdown` is called, or when the handle
/// is dropped. A pass that is running when the stop arrives is abandoned;
/// the ledger is left as the completed close requests made it.
pub struct SweepSchedule {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    passes: Arc<AtomicU64>,
}

impl SweepSchedule {
    /// completed passes, successful or not
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// signal the task to stop without waiting for it
    pub fn cancel(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// stop the task and wait until it has exited
    pub async fn shutdown(mut self) {
        self.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "sweep task ended abnormally");
            }
        }
    }
}

impl Drop for SweepSchedule {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<L: Ledger + 'static> Reconciler<L> {
    /// run a sweep every `config.interval` on the tokio runtime
    ///
    /// Must be called from within a runtime. Ticks missed while a pass is
    /// still running are skipped rather than queued.
    pub fn start_schedule(self: &Arc<Self>, config: &SweepConfig) -> Result<SweepSchedule> {
        config.validate()?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let passes = Arc::new(AtomicU64::new(0));

        let first_tick = if config.run_immediately {
            Instant::now()
        } else {
            Instant::now() + config.interval
        };
        let mut ticker = time::interval_at(first_tick, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let reconciler = Arc::clone(self);
        let counter = Arc::clone(&passes);
        let interval = config.interval;

        let task = tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "sweep schedule started");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = &mut stop_rx => break,
                    result = reconciler.sweep() => {
                        match result {
                            Ok(report) => tracing::debug!(
                                sweep_id = %report.sweep_id,
                                closed = report.closed().len(),
                                "scheduled sweep completed"
                            ),
                            Err(LendingError::SweepInProgress) => {
                                tracing::debug!("previous sweep still running, skipping tick")
                            }
                            Err(e) => tracing::warn!(error = %e, "scheduled sweep failed"),
                        }
                        counter.fetch_add(1, Ordering::AcqRel);
                    }
                }
            }
            tracing::info!("sweep schedule stopped");
        });

        Ok(SweepSchedule {
            stop: Some(stop_tx),
            task: Some(task),
            passes,
        })
    }
}
