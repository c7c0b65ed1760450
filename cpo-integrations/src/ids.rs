pub const DAEMON_HOST: &str = "127.0.0.1";
pub const DAEMON_PORT: u16 = 63111;

pub const ENDPOINT_ROOT_FOLDER: &str = "/rootfolder";
pub const ENDPOINT_STATE: &str = "/";

pub const QUERY_STATE: &str = "state";
pub const QUERY_FOLDER: &str = "folder";
pub const QUERY_TRANSITION: &str = "transition";

pub const STATE_PROGRESS: &str = "progress";
pub const STATE_SYNCHRONIZED: &str = "synchronized";
pub const STATE_CONFLICTED: &str = "conflicted";

pub const PROGRESS_SCOPE_MARKER: &str = "Cloud Portal Office";

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REFRESH_DELAY_MS: u64 = 5_000;
pub const PROGRESS_FRESHNESS_MS: u64 = 300;
pub const SYNCED_FRESHNESS_MS: u64 = 500;

pub const CONFLICT_MIN_PATH_LEN: usize = 4;
