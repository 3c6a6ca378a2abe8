//! Periodic poll driver
//!
//! Polls are blocking filesystem work, so each one runs on the blocking
//! pool. The poller sits behind a mutex: ticks and `poll_now()` calls queue
//! up and at most one poll runs at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use resultsview_storage::RunIndex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{PollError, Result};
use crate::poller::{JobsPoller, PollReport};

pub struct PollScheduler<I: RunIndex + 'static> {
    poller: Arc<Mutex<JobsPoller<I>>>,
    index: Arc<I>,
    interval: Duration,
    initial_poll_done: Arc<AtomicBool>,
}

impl<I: RunIndex + 'static> Clone for PollScheduler<I> {
    fn clone(&self) -> Self {
        Self {
            poller: Arc::clone(&self.poller),
            index: Arc::clone(&self.index),
            interval: self.interval,
            initial_poll_done: Arc::clone(&self.initial_poll_done),
        }
    }
}

impl<I: RunIndex + 'static> PollScheduler<I> {
    /// Poll at the interval from the poller's configuration.
    pub fn new(poller: JobsPoller<I>) -> Self {
        let interval = poller.config().poll_interval();
        let index = Arc::clone(poller.index());
        Self {
            poller: Arc::new(Mutex::new(poller)),
            index,
            interval,
            initial_poll_done: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        // tokio intervals cannot be zero
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `true` once a poll has completed successfully.
    pub fn initial_poll_done(&self) -> bool {
        self.initial_poll_done.load(Ordering::Acquire)
    }

    /// Index the poller writes to, for readers.
    pub fn index(&self) -> &Arc<I> {
        &self.index
    }

    /// Poll immediately, waiting for any poll already in progress.
    pub async fn poll_now(&self) -> Result<PollReport> {
        let poller = Arc::clone(&self.poller);
        let report = tokio::task::spawn_blocking(move || poller.lock().poll())
            .await
            .map_err(PollError::scheduler)??;
        self.initial_poll_done.store(true, Ordering::Release);
        Ok(report)
    }

    /// Start polling on the current runtime. The first poll runs right away.
    pub fn start(&self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let scheduler = self.clone();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Polling every {:?}", scheduler.interval);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = scheduler.poll_now().await {
                            error!("Poll failed ({}), retrying next tick: {}", e.category(), e);
                        }
                    }
                }
            }
            info!("Poll scheduler stopped");
        });

        SchedulerHandle { cancel, task }
    }
}

/// Stops a running scheduler.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop ticking. A poll in progress completes first.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.task.await.map_err(PollError::scheduler)
    }
}
