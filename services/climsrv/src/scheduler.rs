//! Periodic activity scheduler
//!
//! Each activity gets its own tick loop driven by `tokio::time::interval`.
//! Handlers run as spawned tasks so slow network I/O never delays the next
//! tick; an in-progress flag skips ticks that arrive while the previous run
//! is still going. An activity registered with [`Scheduler::on_tick_yielding`]
//! also skips its ticks while another named activity is running.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct Activity {
    name: String,
    period: Duration,
    in_progress: AtomicBool,
    yields_to: Option<Arc<Activity>>,
    runs: AtomicU64,
    skipped: AtomicU64,
}

impl Activity {
    fn blocked_by_other(&self) -> bool {
        self.yields_to
            .as_ref()
            .is_some_and(|other| other.in_progress.load(Ordering::Acquire))
    }
}

/// Clears the in-progress flag even if the handler panics
struct RunGuard(Arc<Activity>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.runs.fetch_add(1, Ordering::Relaxed);
        self.0.in_progress.store(false, Ordering::Release);
    }
}

/// Snapshot of one activity's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityStatus {
    pub name: String,
    pub period: Duration,
    /// Finished runs
    pub runs: u64,
    /// Ticks dropped because a run was in progress, its own or one it yields to
    pub skipped: u64,
    pub running: bool,
}

pub struct Scheduler {
    token: CancellationToken,
    activities: Mutex<Vec<Arc<Activity>>>,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            activities: Mutex::new(Vec::new()),
            loops: Mutex::new(Vec::new()),
        }
    }

    /// Run `handler` every `period`, starting immediately
    ///
    /// Must be called from within a Tokio runtime.
    pub fn on_tick<F, Fut>(&self, name: &str, period: Duration, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(name, period, None, handler);
    }

    /// Like [`Self::on_tick`], but a tick is skipped while `other` is running
    ///
    /// `other` never waits for this activity. An unknown name is ignored.
    pub fn on_tick_yielding<F, Fut>(
        &self,
        name: &str,
        period: Duration,
        other: &str,
        handler: F,
    ) where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let yields_to = self
            .activities
            .lock()
            .iter()
            .find(|a| a.name == other)
            .cloned();
        if yields_to.is_none() {
            warn!("Activity {} yields to unknown activity {}", name, other);
        }
        self.register(name, period, yields_to, handler);
    }

    fn register<F, Fut>(
        &self,
        name: &str,
        period: Duration,
        yields_to: Option<Arc<Activity>>,
        handler: F,
    ) where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let activity = Arc::new(Activity {
            name: name.to_string(),
            period,
            in_progress: AtomicBool::new(false),
            yields_to,
            runs: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        });
        self.activities.lock().push(activity.clone());

        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(activity.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Activity {} every {:?}", activity.name, activity.period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if activity.blocked_by_other() {
                            activity.skipped.fetch_add(1, Ordering::Relaxed);
                            debug!("Activity {} yields, tick skipped", activity.name);
                            continue;
                        }
                        if activity.in_progress.swap(true, Ordering::AcqRel) {
                            activity.skipped.fetch_add(1, Ordering::Relaxed);
                            debug!("Activity {} still running, tick skipped", activity.name);
                            continue;
                        }
                        let guard = RunGuard(activity.clone());
                        let run = handler();
                        tokio::spawn(async move {
                            run.await;
                            drop(guard);
                        });
                    }
                    () = token.cancelled() => {
                        debug!("Activity {} stopped", activity.name);
                        break;
                    }
                }
            }
        });
        self.loops.lock().push(handle);
    }

    pub fn status(&self) -> Vec<ActivityStatus> {
        self.activities
            .lock()
            .iter()
            .map(|a| ActivityStatus {
                name: a.name.clone(),
                period: a.period,
                runs: a.runs.load(Ordering::Relaxed),
                skipped: a.skipped.load(Ordering::Relaxed),
                running: a.in_progress.load(Ordering::Acquire),
            })
            .collect()
    }

    /// Stop all tick loops; in-flight handlers finish on their own
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for the tick loops to exit after `stop`
    pub async fn join(&self) {
        let loops: Vec<JoinHandle<()>> = std::mem::take(&mut *self.loops.lock());
        for handle in loops {
            if let Err(e) = handle.await {
                debug!("Tick loop ended abnormally: {}", e);
            }
        }
    }
}
