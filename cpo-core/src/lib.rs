pub mod cache;
mod client;
pub mod ingest;
pub mod paths;

pub use cache::SyncStatusCache;
pub use client::{DaemonClient, DaemonQuery, QueryError, default_base_url, parse_root_folder};
pub use ingest::{IngestReport, ingest, ingest_bytes};
