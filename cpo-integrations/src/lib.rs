pub mod ids;

use serde::{Deserialize, Serialize};

use ids::{
    PROGRESS_FRESHNESS_MS, STATE_CONFLICTED, STATE_PROGRESS, STATE_SYNCHRONIZED,
    SYNCED_FRESHNESS_MS,
};

/// Which badge an overlay handler paints. Each handler instance owns one
/// resolver for exactly one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayVariant {
    Progress,
    Synced,
    Conflict,
}

impl OverlayVariant {
    pub const ALL: [OverlayVariant; 3] = [Self::Progress, Self::Synced, Self::Conflict];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "progress" | "in_progress" | "in-progress" => Some(Self::Progress),
            "synced" | "synchronized" => Some(Self::Synced),
            "conflict" | "conflicted" => Some(Self::Conflict),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Synced => "synced",
            Self::Conflict => "conflict",
        }
    }

    /// Value of the daemon's `state` query parameter for this variant.
    pub fn daemon_state(self) -> &'static str {
        match self {
            Self::Progress => STATE_PROGRESS,
            Self::Synced => STATE_SYNCHRONIZED,
            Self::Conflict => STATE_CONFLICTED,
        }
    }

    pub fn default_freshness_ms(self) -> u64 {
        match self {
            Self::Progress => PROGRESS_FRESHNESS_MS,
            Self::Synced | Self::Conflict => SYNCED_FRESHNESS_MS,
        }
    }

    pub fn schedules_refresh(self) -> bool {
        matches!(self, Self::Progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_variant_aliases() {
        assert_eq!(
            OverlayVariant::parse("in-progress"),
            Some(OverlayVariant::Progress)
        );
        assert_eq!(
            OverlayVariant::parse("Synchronized"),
            Some(OverlayVariant::Synced)
        );
        assert_eq!(
            OverlayVariant::parse(" conflicted "),
            Some(OverlayVariant::Conflict)
        );
        assert_eq!(OverlayVariant::parse("cached"), None);
    }

    #[test]
    fn maps_variant_to_daemon_state() {
        assert_eq!(OverlayVariant::Progress.daemon_state(), "progress");
        assert_eq!(OverlayVariant::Synced.daemon_state(), "synchronized");
        assert_eq!(OverlayVariant::Conflict.daemon_state(), "conflicted");
    }

    #[test]
    fn only_progress_variant_schedules_refresh() {
        let scheduling: Vec<_> = OverlayVariant::ALL
            .into_iter()
            .filter(|variant| variant.schedules_refresh())
            .collect();
        assert_eq!(scheduling, vec![OverlayVariant::Progress]);
    }

    #[test]
    fn progress_cache_is_shorter_lived() {
        assert!(
            OverlayVariant::Progress.default_freshness_ms()
                < OverlayVariant::Synced.default_freshness_ms()
        );
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&OverlayVariant::Synced).unwrap();
        assert_eq!(json, "\"synced\"");
    }
}
