//! Background batching on count and time thresholds.
//!
//! The scheduler polls each watched log and roots its pending entries when
//! either enough have accumulated or the oldest has waited long enough. It
//! only reads the log through `BatchVerifier`, so it never holds the append
//! sequencer and appends proceed while a batch is being built.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::batch::BatchVerifier;

/// When to cut a batch.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Cut as soon as this many entries are pending.
    pub count_threshold: u64,
    /// Cut whatever is pending once this much time passed since the last cut.
    pub interval: Duration,
    /// How often thresholds are checked.
    pub poll_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count_threshold: 100,
            interval: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Handle to a running scheduler task.
#[derive(Debug)]
pub struct BatchScheduler {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl BatchScheduler {
    /// Start batching `log_ids` on the current tokio runtime.
    pub fn spawn(verifier: Arc<BatchVerifier>, log_ids: Vec<String>, config: BatchConfig) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let task = tokio::spawn(async move {
            info!(logs = log_ids.len(), count = config.count_threshold, "batch scheduler started");
            let mut last_cut: HashMap<String, Instant> =
                log_ids.iter().map(|id| (id.clone(), Instant::now())).collect();
            let mut ticker = tokio::time::interval(config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = ticker.tick() => {
                        for log_id in &log_ids {
                            let due = last_cut
                                .get(log_id)
                                .is_some_and(|at| at.elapsed() >= config.interval);
                            if run_once(&verifier, log_id, config.count_threshold, due).await {
                                last_cut.insert(log_id.clone(), Instant::now());
                            }
                        }
                    }
                }
            }

            // Nothing pending is left behind on shutdown.
            for log_id in &log_ids {
                run_once(&verifier, log_id, 0, true).await;
            }
            info!("batch scheduler stopped");
        });
        Self { shutdown, task }
    }

    /// Signal the task, let it flush pending entries, and wait for it.
    pub async fn shutdown(self) {
        // The receiver only disappears if the task already ended.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "batch scheduler task failed");
        }
    }
}

/// Cut a batch for `log_id` if a threshold is met. Returns whether one was
/// built.
async fn run_once(verifier: &Arc<BatchVerifier>, log_id: &str, count_threshold: u64, due: bool) -> bool {
    let pending = match verifier.pending_count(log_id) {
        Ok(n) => n,
        Err(e) => {
            error!(log_id, error = %e, "could not read pending entries");
            return false;
        }
    };
    if pending == 0 || (pending < count_threshold && !due) {
        return false;
    }

    let verifier = verifier.clone();
    let id = log_id.to_string();
    match tokio::task::spawn_blocking(move || verifier.batch_pending(&id)).await {
        Ok(Ok(Some(batch))) => {
            debug!(batch_id = %batch.batch_id, pending, "scheduled batch built");
            true
        }
        Ok(Ok(None)) => false,
        Ok(Err(e)) => {
            error!(log_id, error = %e, "scheduled batch failed");
            false
        }
        Err(e) => {
            error!(log_id, error = %e, "scheduled batch task panicked");
            false
        }
    }
}
