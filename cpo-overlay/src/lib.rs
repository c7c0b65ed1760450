pub mod config;
pub mod notify;
pub mod refresh;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use cpo_core::{DaemonClient, DaemonQuery, QueryError, SyncStatusCache, ingest_bytes, paths};
use cpo_integrations::OverlayVariant;
use cpo_integrations::ids::CONFLICT_MIN_PATH_LEN;
use thiserror::Error;
use tracing::{debug, warn};

pub use config::{OverlayConfig, ScopeRule};
pub use notify::{ChangeNotifier, ChannelNotifier, TracingNotifier};
pub use refresh::{PendingTransition, RefreshScheduler};

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("daemon client error: {0}")]
    Client(#[from] QueryError),
    #[error("failed to start refresh runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Answers one overlay handler's membership question for arbitrary paths.
///
/// Every instance owns its cache, its connectivity view and its pending
/// refreshes; nothing is shared between instances. No error escapes
/// [`StatusResolver::resolve`]: anything that goes wrong answers `false`.
pub struct StatusResolver {
    config: OverlayConfig,
    client: DaemonClient,
    cache: Mutex<SyncStatusCache>,
    root: Mutex<RootState>,
    scheduler: Option<RefreshScheduler>,
}

#[derive(Debug)]
struct RootState {
    path: Option<String>,
    last_attempt: Option<Instant>,
}

impl StatusResolver {
    pub fn new(
        config: OverlayConfig,
        notifier: Arc<dyn ChangeNotifier>,
    ) -> Result<Self, OverlayError> {
        let client = DaemonClient::with_base_url(&config.daemon_url, config.timeout)?;
        let scheduler = if config.variant.schedules_refresh() {
            Some(RefreshScheduler::new(
                client.clone(),
                notifier,
                config.refresh_delay,
            )?)
        } else {
            None
        };
        let root = RootState {
            path: config.monitored_root.as_deref().map(paths::normalize),
            last_attempt: None,
        };
        let resolver = Self {
            cache: Mutex::new(SyncStatusCache::new(config.freshness)),
            root: Mutex::new(root),
            client,
            scheduler,
            config,
        };

        if resolver.config.needs_root() {
            resolver.monitored_root();
        }
        if resolver.variant() == OverlayVariant::Conflict {
            resolver.populate_from_root();
        }
        debug!(
            variant = resolver.variant().as_str(),
            root = ?resolver.known_root(),
            "status resolver ready"
        );
        Ok(resolver)
    }

    pub fn variant(&self) -> OverlayVariant {
        self.config.variant
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn resolve(&self, path: &str) -> bool {
        match self.variant() {
            OverlayVariant::Conflict => self.resolve_conflict(path),
            OverlayVariant::Progress | OverlayVariant::Synced => self.resolve_listed(path),
        }
    }

    pub fn in_progress(&self, path: &str) -> bool {
        self.answer(OverlayVariant::Progress, path)
    }

    pub fn is_synchronized(&self, path: &str) -> bool {
        self.answer(OverlayVariant::Synced, path)
    }

    pub fn is_conflicted(&self, path: &str) -> bool {
        self.answer(OverlayVariant::Conflict, path)
    }

    /// The monitored root, asking the daemon if it is not known yet.
    ///
    /// A failed discovery is not retried until the freshness window has
    /// passed, so unknown-root lookups cost at most one request per window.
    pub fn monitored_root(&self) -> Option<String> {
        let now = Instant::now();
        {
            let mut state = self.lock_root();
            if let Some(root) = &state.path {
                return Some(root.clone());
            }
            if let Some(last) = state.last_attempt
                && now.saturating_duration_since(last) < self.config.freshness
            {
                return None;
            }
            state.last_attempt = Some(now);
        }
        match self.client.query_root() {
            Ok(root) => {
                let root = paths::normalize(&root);
                debug!(root = %root, "discovered monitored root");
                self.lock_root().path = Some(root.clone());
                Some(root)
            }
            Err(err) => {
                debug!(error = %err, "monitored root unavailable");
                None
            }
        }
    }

    /// Cached answer for `path` without touching the daemon or the clock.
    pub fn cached(&self, path: &str) -> Option<bool> {
        self.lock_cache().lookup(&self.key(path))
    }

    pub fn cached_entries(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn pending_refreshes(&self) -> usize {
        self.scheduler.as_ref().map_or(0, RefreshScheduler::pending)
    }

    fn answer(&self, expected: OverlayVariant, path: &str) -> bool {
        if self.variant() != expected {
            debug!(
                variant = self.variant().as_str(),
                asked = expected.as_str(),
                "resolver cannot answer for another variant"
            );
            return false;
        }
        self.resolve(path)
    }

    fn resolve_listed(&self, path: &str) -> bool {
        let key = self.key(path);
        self.invalidate();

        if let Some(listed) = self.lookup(&key) {
            if listed {
                self.schedule(path);
            }
            return listed;
        }

        let folder = paths::folder_of(path);
        if !self.in_scope(&folder) {
            debug!(path, folder = %folder, "path outside monitored scope");
            return false;
        }

        if let Some(listed) = self.refresh_folder(&folder)
            && let Some(scheduler) = &self.scheduler
        {
            scheduler.notify_folder(&folder);
            for file in &listed {
                scheduler.schedule(file);
            }
        }

        match self.lookup(&key) {
            Some(listed) => {
                if listed {
                    self.schedule(path);
                }
                listed
            }
            None => {
                if self.client.is_connected() {
                    self.schedule(path);
                }
                false
            }
        }
    }

    fn resolve_conflict(&self, path: &str) -> bool {
        if path.chars().count() < CONFLICT_MIN_PATH_LEN {
            return false;
        }
        let key = self.key(path);
        if self.invalidate() {
            self.populate_from_root();
        }
        self.lookup(&key).unwrap_or(false)
    }

    fn populate_from_root(&self) -> bool {
        self.monitored_root()
            .and_then(|root| self.refresh_folder(&root))
            .is_some()
    }

    // Queries the daemon for `folder` and folds the listing into the cache.
    // Returns the listed paths if the daemon answered.
    fn refresh_folder(&self, folder: &str) -> Option<Vec<String>> {
        let query = DaemonQuery::folder(self.variant().daemon_state(), folder);
        match self.client.query(&query) {
            Ok(body) => {
                let fold_case = self.config.fold_case;
                let mut listed = Vec::new();
                let mut pairs = Vec::new();
                let report = ingest_bytes(&body, folder, |path, state| {
                    pairs.push((paths::cache_key(&path, fold_case), state));
                    if state {
                        listed.push(path);
                    }
                });
                self.lock_cache().bulk_insert(pairs);
                debug!(
                    folder,
                    entries = report.emitted,
                    variant = self.variant().as_str(),
                    "ingested daemon listing"
                );
                Some(listed)
            }
            Err(err) if err.is_connectivity() => {
                warn!(folder, error = %err, "sync daemon unreachable, dropping cached state");
                self.lock_cache().maybe_invalidate(Instant::now(), false);
                None
            }
            Err(err) => {
                debug!(folder, error = %err, "daemon query failed");
                None
            }
        }
    }

    fn in_scope(&self, folder: &str) -> bool {
        if folder.is_empty() {
            return false;
        }
        match &self.config.scope {
            ScopeRule::Marker(marker) => {
                if self.config.fold_case {
                    folder.to_lowercase().contains(&marker.to_lowercase())
                } else {
                    folder.contains(marker.as_str())
                }
            }
            ScopeRule::MonitoredRoot => self
                .monitored_root()
                .is_some_and(|root| paths::is_within(folder, &root, self.config.fold_case)),
        }
    }

    fn schedule(&self, path: &str) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.schedule(path);
        }
    }

    fn invalidate(&self) -> bool {
        let connected = self.client.is_connected();
        self.lock_cache()
            .maybe_invalidate(Instant::now(), connected)
    }

    fn lookup(&self, key: &str) -> Option<bool> {
        self.lock_cache().lookup(key)
    }

    fn key(&self, path: &str) -> String {
        paths::cache_key(path, self.config.fold_case)
    }

    fn known_root(&self) -> Option<String> {
        self.lock_root().path.clone()
    }

    fn lock_root(&self) -> MutexGuard<'_, RootState> {
        self.root.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cache(&self) -> MutexGuard<'_, SyncStatusCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn seed<I>(&self, pairs: I)
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        self.lock_cache().bulk_insert(pairs);
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
