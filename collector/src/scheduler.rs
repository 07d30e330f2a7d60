use crate::collector::{
    Collector,
    CycleReport,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;
use std::{
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{
        interval_at,
        Instant,
        MissedTickBehavior,
    },
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// A new cycle was started.
    Accepted,
    /// A cycle is already running; nothing was started.
    Busy,
}

/// A cycle that could not run at all, e.g. because the cluster list was
/// unreadable. Cleared by the next cycle that completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleAbort {
    pub at: DateTime<Utc>,
    pub error: String,
}

struct SchedulerInner {
    collector: Arc<Collector>,
    running: AtomicBool,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    ticker: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
    last_report: watch::Sender<Option<CycleReport>>,
    last_abort: Mutex<Option<CycleAbort>>,
}

/// Clears the running flag when a cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs collection cycles on a fixed interval and on demand, never more than
/// one at a time.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(collector: Arc<Collector>) -> Self {
        let (last_report, _) = watch::channel(None);
        Self {
            inner: Arc::new(SchedulerInner {
                collector,
                running: AtomicBool::new(false),
                in_flight: Mutex::new(None),
                ticker: Mutex::new(None),
                last_report,
                last_abort: Mutex::new(None),
            }),
        }
    }

    /// Start a cycle in the background unless one is already running.
    pub fn trigger_now(&self) -> TriggerOutcome {
        // Held until the handle is stored, so `shutdown` always sees the
        // newest cycle.
        let mut in_flight = lock(&self.inner.in_flight);
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return TriggerOutcome::Busy;
        }

        let inner = self.inner.clone();
        *in_flight = Some(tokio::spawn(async move {
            let _guard = CycleGuard(&inner.running);
            match inner.collector.run_cycle().await {
                Ok(report) => {
                    lock(&inner.last_abort).take();
                    inner.last_report.send_replace(Some(report));
                }
                Err(err) => {
                    error!("collection cycle aborted: {err}");
                    *lock(&inner.last_abort) = Some(CycleAbort {
                        at: Utc::now(),
                        error: err.to_string(),
                    });
                }
            }
        }));
        TriggerOutcome::Accepted
    }

    /// Run a cycle every `interval`, the first one `interval` from now.
    /// Restarting replaces the previous ticker.
    pub fn start(&self, interval: Duration) {
        self.stop();

        let token = CancellationToken::new();
        let scheduler = self.clone();
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(interval = ?interval, "collection scheduler started");
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if scheduler.trigger_now() == TriggerOutcome::Busy {
                            debug!("previous cycle still running, skipping tick");
                        }
                    }
                }
            }
            info!("collection scheduler stopped");
        });
        *lock(&self.inner.ticker) = Some((token, handle));
    }

    /// Stop ticking. A cycle that already started runs to completion.
    pub fn stop(&self) {
        if let Some((token, _)) = lock(&self.inner.ticker).as_ref() {
            token.cancel();
        }
    }

    /// Stop ticking and wait for the ticker and any running cycle to finish.
    pub async fn shutdown(&self) {
        let ticker = lock(&self.inner.ticker).take();
        if let Some((token, handle)) = ticker {
            token.cancel();
            if let Err(err) = handle.await {
                warn!("scheduler task failed: {err}");
            }
        }

        let in_flight = lock(&self.inner.in_flight).take();
        if let Some(handle) = in_flight {
            if let Err(err) = handle.await {
                warn!("collection task failed: {err}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn is_scheduled(&self) -> bool {
        lock(&self.inner.ticker)
            .as_ref()
            .is_some_and(|(token, _)| !token.is_cancelled())
    }

    /// Report of the most recent finished cycle.
    pub fn last_report(&self) -> Option<CycleReport> {
        self.inner.last_report.borrow().clone()
    }

    /// Set when the most recent cycle aborted before collecting anything.
    pub fn last_abort(&self) -> Option<CycleAbort> {
        lock(&self.inner.last_abort).clone()
    }

    /// Notified after every finished cycle.
    pub fn subscribe(&self) -> watch::Receiver<Option<CycleReport>> {
        self.inner.last_report.subscribe()
    }

    pub fn collector(&self) -> &Arc<Collector> {
        &self.inner.collector
    }
}
