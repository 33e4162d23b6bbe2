use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

use crate::monitoring::sample::Sample;
use crate::monitoring::window::{RecordOutcome, SharedWindow};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub dispatched: u64,
    pub failed: u64,
}

/// Drains the ingest queue and fans each sample out to its own task.
///
/// Fan-out is capped by a semaphore: the loop waits for a permit before
/// spawning, and the permit travels with the task. A stop signal observed
/// during that wait ends the loop without starting the pending sample.
/// Application order across samples is unspecified.
pub struct Dispatcher {
    rx: mpsc::Receiver<Sample>,
    window: SharedWindow,
    permits: Arc<Semaphore>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        rx: mpsc::Receiver<Sample>,
        window: SharedWindow,
        max_in_flight: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            rx,
            window,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            shutdown_rx,
        }
    }

    /// Runs until a stop is signalled or every producer is gone, then waits
    /// for the tasks it already started.
    pub async fn run(mut self) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let mut in_flight: JoinSet<RecordOutcome> = JoinSet::new();

        loop {
            if *self.shutdown_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;

                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped, dispatcher stopping");
                        break;
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    Self::reap(joined, &mut summary);
                }
                received = self.rx.recv() => {
                    let Some(sample) = received else {
                        debug!("Ingest queue closed, dispatcher stopping");
                        break;
                    };
                    // a stop while waiting for a permit drops the sample unstarted
                    let permit = tokio::select! {
                        biased;

                        _ = self.shutdown_rx.changed() => {
                            debug!("Stop requested while waiting for a permit, sample dropped");
                            break;
                        }
                        acquired = self.permits.clone().acquire_owned() => match acquired {
                            Ok(permit) => permit,
                            Err(_) => break,
                        },
                    };
                    let window = self.window.clone();
                    in_flight.spawn(async move {
                        let _permit = permit;
                        window.record(sample).await
                    });
                    summary.dispatched += 1;
                }
            }
        }

        let pending = in_flight.len();
        if pending > 0 {
            info!(pending, "Dispatcher stopped, draining in-flight samples");
        }
        while let Some(joined) = in_flight.join_next().await {
            Self::reap(joined, &mut summary);
        }

        info!(
            dispatched = summary.dispatched,
            failed = summary.failed,
            "Dispatcher finished"
        );
        summary
    }

    fn reap(joined: Result<RecordOutcome, JoinError>, summary: &mut DispatchSummary) {
        if let Err(e) = joined {
            summary.failed += 1;
            error!(error = %e, "Sample processing task failed");
        }
    }
}
