use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cpo_core::{DaemonClient, DaemonQuery, paths};
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use crate::OverlayError;
use crate::notify::ChangeNotifier;

/// One delayed re-check. Owns its data so the task outlives the call that
/// scheduled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransition {
    pub file_path: String,
    pub folder_path: String,
}

impl PendingTransition {
    pub fn new(file_path: &str) -> Self {
        Self {
            file_path: paths::normalize(file_path),
            folder_path: paths::folder_of(file_path),
        }
    }
}

/// Runs delayed transition probes off the caller's thread and nudges the
/// shell afterwards. Dropping the scheduler cancels whatever is pending.
pub struct RefreshScheduler {
    runtime: Option<Runtime>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    client: DaemonClient,
    notifier: Arc<dyn ChangeNotifier>,
    delay: Duration,
    in_flight: Arc<Mutex<HashSet<String>>>,
    last_folder: Mutex<Option<String>>,
}

impl RefreshScheduler {
    pub fn new(
        client: DaemonClient,
        notifier: Arc<dyn ChangeNotifier>,
        delay: Duration,
    ) -> Result<Self, OverlayError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("cpo-refresh")
            .enable_time()
            .build()?;
        Ok(Self {
            runtime: Some(runtime),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            client,
            notifier,
            delay,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            last_folder: Mutex::new(None),
        })
    }

    /// Fire and forget. Returns `false` when nothing was scheduled, which
    /// includes a path whose previous refresh has not fired yet.
    pub fn schedule(&self, file_path: &str) -> bool {
        if file_path.is_empty() || self.cancel.is_cancelled() {
            return false;
        }
        let Some(runtime) = self.runtime.as_ref() else {
            return false;
        };
        let transition = PendingTransition::new(file_path);
        if !lock(&self.in_flight).insert(transition.file_path.clone()) {
            return false;
        }
        debug!(
            path = %transition.file_path,
            delay_ms = self.delay.as_millis() as u64,
            "scheduling refresh"
        );
        self.tracker.spawn_on(
            run_transition(
                transition,
                self.client.clone(),
                Arc::clone(&self.notifier),
                Arc::clone(&self.in_flight),
                self.cancel.clone(),
                self.delay,
            ),
            runtime.handle(),
        );
        true
    }

    /// Repaints `folder` right away unless it was the last folder repainted.
    pub fn notify_folder(&self, folder: &str) {
        if folder.is_empty() {
            return;
        }
        let folder = paths::normalize(folder);
        {
            let mut last = lock(&self.last_folder);
            if last.as_deref() == Some(folder.as_str()) {
                return;
            }
            *last = Some(folder.clone());
        }
        self.notifier.item_changed(&paths::to_native(&folder));
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.tracker.close();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_transition(
    transition: PendingTransition,
    client: DaemonClient,
    notifier: Arc<dyn ChangeNotifier>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    cancel: CancellationToken,
    delay: Duration,
) {
    tokio::select! {
        _ = cancel.cancelled() => {
            debug!(path = %transition.file_path, "refresh cancelled before probe");
            return;
        }
        _ = tokio::time::sleep(delay) => {}
    }

    // The answer is irrelevant; the repaint makes the shell ask again.
    let query = DaemonQuery::transition(transition.folder_path.clone());
    match tokio::task::spawn_blocking(move || client.probe(&query)).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => {
            debug!(path = %transition.file_path, error = %err, "transition probe failed")
        }
        Err(err) => debug!(path = %transition.file_path, error = %err, "transition probe aborted"),
    }

    // The repaint may ask for this path again, which must be able to schedule.
    lock(&in_flight).remove(&transition.file_path);
    if cancel.is_cancelled() {
        return;
    }
    notifier.item_changed(&paths::to_native(&transition.file_path));
}
