use std::time::Duration;

use cpo_core::default_base_url;
use cpo_integrations::OverlayVariant;
use cpo_integrations::ids::{DEFAULT_REFRESH_DELAY_MS, DEFAULT_TIMEOUT_MS, PROGRESS_SCOPE_MARKER};

/// Decides which folders are worth a daemon round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeRule {
    /// The folder must be the monitored root or lie beneath it.
    MonitoredRoot,
    /// The folder must contain this text anywhere.
    Marker(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    pub variant: OverlayVariant,
    pub daemon_url: String,
    pub timeout: Duration,
    pub freshness: Duration,
    pub refresh_delay: Duration,
    pub monitored_root: Option<String>,
    pub scope: ScopeRule,
    pub fold_case: bool,
}

impl OverlayConfig {
    pub fn for_variant(variant: OverlayVariant) -> Self {
        let scope = match variant {
            OverlayVariant::Progress => ScopeRule::Marker(PROGRESS_SCOPE_MARKER.to_string()),
            OverlayVariant::Synced | OverlayVariant::Conflict => ScopeRule::MonitoredRoot,
        };
        Self {
            variant,
            daemon_url: default_base_url(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            freshness: Duration::from_millis(variant.default_freshness_ms()),
            refresh_delay: Duration::from_millis(DEFAULT_REFRESH_DELAY_MS),
            monitored_root: None,
            scope,
            fold_case: cfg!(windows),
        }
    }

    pub fn from_env(variant: OverlayVariant) -> Self {
        let defaults = Self::for_variant(variant);
        let daemon_url = std::env::var("CPO_DAEMON_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.daemon_url);
        let timeout = Duration::from_millis(read_u64_env("CPO_TIMEOUT_MS", DEFAULT_TIMEOUT_MS));
        let freshness = Duration::from_millis(read_u64_env(
            "CPO_FRESHNESS_MS",
            variant.default_freshness_ms(),
        ));
        let refresh_delay = Duration::from_millis(read_u64_env(
            "CPO_REFRESH_DELAY_MS",
            DEFAULT_REFRESH_DELAY_MS,
        ));
        let monitored_root = std::env::var("CPO_MONITORED_ROOT")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let scope = match std::env::var("CPO_SCOPE_MARKER") {
            Ok(marker) if marker.trim().is_empty() => ScopeRule::MonitoredRoot,
            Ok(marker) => ScopeRule::Marker(marker),
            Err(_) => defaults.scope,
        };
        let fold_case = read_bool_env("CPO_FOLD_CASE", defaults.fold_case);

        Self {
            variant,
            daemon_url,
            timeout,
            freshness,
            refresh_delay,
            monitored_root,
            scope,
            fold_case,
        }
    }

    pub fn with_daemon_url(mut self, daemon_url: impl Into<String>) -> Self {
        self.daemon_url = daemon_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_refresh_delay(mut self, refresh_delay: Duration) -> Self {
        self.refresh_delay = refresh_delay;
        self
    }

    pub fn with_monitored_root(mut self, root: impl Into<String>) -> Self {
        self.monitored_root = Some(root.into());
        self
    }

    pub fn with_scope(mut self, scope: ScopeRule) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_fold_case(mut self, fold_case: bool) -> Self {
        self.fold_case = fold_case;
        self
    }

    /// Whether answering needs the monitored root at all.
    pub fn needs_root(&self) -> bool {
        self.variant == OverlayVariant::Conflict || self.scope == ScopeRule::MonitoredRoot
    }
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn read_bool_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_defaults_use_marker_and_short_window() {
        let config = OverlayConfig::for_variant(OverlayVariant::Progress);
        assert_eq!(
            config.scope,
            ScopeRule::Marker("Cloud Portal Office".to_string())
        );
        assert_eq!(config.freshness, Duration::from_millis(300));
        assert_eq!(config.refresh_delay, Duration::from_secs(5));
        assert_eq!(config.daemon_url, "http://127.0.0.1:63111");
        assert!(!config.needs_root());
    }

    #[test]
    fn synced_and_conflict_defaults_need_root() {
        let synced = OverlayConfig::for_variant(OverlayVariant::Synced);
        assert_eq!(synced.scope, ScopeRule::MonitoredRoot);
        assert_eq!(synced.freshness, Duration::from_millis(500));
        assert!(synced.needs_root());

        let conflict = OverlayConfig::for_variant(OverlayVariant::Conflict)
            .with_scope(ScopeRule::Marker("x".into()));
        assert!(conflict.needs_root());
    }

    #[test]
    fn builders_override_defaults() {
        let config = OverlayConfig::for_variant(OverlayVariant::Synced)
            .with_daemon_url("http://127.0.0.1:1")
            .with_monitored_root("C:/Cloud")
            .with_fold_case(true);
        assert_eq!(config.daemon_url, "http://127.0.0.1:1");
        assert_eq!(config.monitored_root.as_deref(), Some("C:/Cloud"));
        assert!(config.fold_case);
    }

    #[test]
    fn env_parsers_fall_back_to_defaults() {
        assert_eq!(read_u64_env("CPO_NO_SUCH_ENV_FOR_TEST", 42), 42);
        assert!(read_bool_env("CPO_NO_SUCH_BOOL_ENV_FOR_TEST", true));
        assert!(!read_bool_env("CPO_NO_SUCH_BOOL_ENV_FOR_TEST", false));
    }
}
