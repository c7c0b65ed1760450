use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cpo_integrations::ids::{
    DAEMON_HOST, DAEMON_PORT, DEFAULT_TIMEOUT_MS, ENDPOINT_ROOT_FOLDER, ENDPOINT_STATE,
    QUERY_FOLDER, QUERY_STATE, QUERY_TRANSITION, STATE_PROGRESS,
};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("daemon unreachable: {0}")]
    Connectivity(String),
    #[error("daemon returned {status}")]
    Status { status: StatusCode },
    #[error("root folder response carries no path")]
    MalformedRoot,
}

impl QueryError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, QueryError::Connectivity(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonQuery {
    state: String,
    folder: String,
    transition: bool,
}

impl DaemonQuery {
    pub fn folder(state: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            folder: folder.into(),
            transition: false,
        }
    }

    pub fn transition(folder: impl Into<String>) -> Self {
        Self {
            state: STATE_PROGRESS.to_string(),
            folder: folder.into(),
            transition: true,
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn target(&self) -> &str {
        &self.folder
    }

    pub fn is_transition(&self) -> bool {
        self.transition
    }

    fn apply(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair(QUERY_STATE, &self.state);
        if self.transition {
            pairs.append_pair(QUERY_TRANSITION, "true");
        }
        pairs.append_pair(QUERY_FOLDER, &self.folder);
    }
}

pub fn default_base_url() -> String {
    format!("http://{DAEMON_HOST}:{DAEMON_PORT}")
}

/// Blocking HTTP client for the local sync daemon.
///
/// Clones share the connection pool and the connectivity flag.
#[derive(Clone)]
pub struct DaemonClient {
    http: Client,
    base_url: Url,
    connected: Arc<AtomicBool>,
}

impl DaemonClient {
    pub fn new() -> Result<Self, QueryError> {
        Self::with_base_url(
            &default_base_url(),
            Duration::from_millis(DEFAULT_TIMEOUT_MS),
        )
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let http = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            // Optimistic until the first request says otherwise.
            connected: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Runs `query` and records the outcome in the connectivity flag.
    pub fn query(&self, query: &DaemonQuery) -> Result<Vec<u8>, QueryError> {
        let url = self.query_url(query)?;
        self.track(self.fetch(url))
    }

    /// Runs `query` without touching the connectivity flag.
    pub fn probe(&self, query: &DaemonQuery) -> Result<Vec<u8>, QueryError> {
        let url = self.query_url(query)?;
        self.fetch(url)
    }

    pub fn query_root(&self) -> Result<String, QueryError> {
        let url = self.endpoint(ENDPOINT_ROOT_FOLDER)?;
        let body = self.track(self.fetch(url))?;
        parse_root_folder(&body).ok_or(QueryError::MalformedRoot)
    }

    fn track(&self, result: Result<Vec<u8>, QueryError>) -> Result<Vec<u8>, QueryError> {
        // Any HTTP answer, error statuses included, proves the daemon is up.
        let connected = !matches!(&result, Err(err) if err.is_connectivity());
        self.connected.store(connected, Ordering::SeqCst);
        result
    }

    fn fetch(&self, url: Url) -> Result<Vec<u8>, QueryError> {
        debug!(%url, "querying sync daemon");
        let response = self
            .http
            .get(url)
            .send()
            .map_err(|err| QueryError::Connectivity(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Status { status });
        }
        let body = response
            .bytes()
            .map_err(|err| QueryError::Connectivity(err.to_string()))?;
        if body.is_empty() {
            return Err(QueryError::Connectivity("empty response body".into()));
        }
        Ok(body.to_vec())
    }

    fn query_url(&self, query: &DaemonQuery) -> Result<Url, QueryError> {
        let mut url = self.endpoint(ENDPOINT_STATE)?;
        query.apply(&mut url);
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, QueryError> {
        Ok(self.base_url.join(path)?)
    }
}

/// Extracts the monitored root from a `/rootfolder` body: the first string
/// value of the top-level object, looking one level into a nested object.
pub fn parse_root_folder(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let root = match &value {
        Value::String(path) => Some(path.clone()),
        Value::Object(map) => map.values().find_map(|value| match value {
            Value::String(path) => Some(path.clone()),
            Value::Object(inner) => inner
                .values()
                .find_map(|value| value.as_str().map(str::to_string)),
            _ => None,
        }),
        _ => None,
    };
    root.filter(|path| !path.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_query_encodes_state_and_folder() {
        let client = DaemonClient::new().unwrap();
        let url = client
            .query_url(&DaemonQuery::folder(
                "synchronized",
                "C:/Cloud Portal Office/Docs",
            ))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:63111/?state=synchronized&folder=C%3A%2FCloud+Portal+Office%2FDocs"
        );
    }

    #[test]
    fn transition_query_is_a_progress_probe() {
        let query = DaemonQuery::transition("Cloud/Docs/a.txt");
        assert_eq!(query.state(), "progress");
        assert!(query.is_transition());
        let client = DaemonClient::new().unwrap();
        let url = client.query_url(&query).unwrap();
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("state".to_string(), "progress".to_string()),
                ("transition".to_string(), "true".to_string()),
                ("folder".to_string(), "Cloud/Docs/a.txt".to_string()),
            ]
        );
    }

    #[test]
    fn root_folder_is_first_string_value() {
        assert_eq!(
            parse_root_folder(br#"{"root":"C:\\Users\\me\\Cloud Portal Office"}"#),
            Some(r"C:\Users\me\Cloud Portal Office".to_string())
        );
        assert_eq!(
            parse_root_folder(br#"{"folder":{"id":7,"path":"/home/me/Cloud"}}"#),
            Some("/home/me/Cloud".to_string())
        );
        assert_eq!(parse_root_folder(br#"{"root":""}"#), None);
        assert_eq!(parse_root_folder(br#"[1,2]"#), None);
        assert_eq!(parse_root_folder(b"not json"), None);
    }

    #[test]
    fn new_client_assumes_connectivity() {
        assert!(DaemonClient::new().unwrap().is_connected());
    }
}
