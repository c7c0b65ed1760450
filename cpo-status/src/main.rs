//! cpo-status: ask the overlay status resolver about paths from a terminal.
//!
//! Runs the same resolver the shell overlay handlers use, configured from
//! `CPO_*` environment variables (a `.env` file is honored).

use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use cpo_core::{DaemonClient, paths};
use cpo_integrations::OverlayVariant;
use cpo_overlay::{ChannelNotifier, OverlayConfig, ScopeRule, StatusResolver};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cpo-status")]
#[command(about = "Query Cloud Portal Office overlay status for paths")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer the overlay question for each path
    Check {
        /// Overlay variant: progress, synced or conflict
        #[arg(long, default_value = "synced", value_parser = parse_variant)]
        variant: OverlayVariant,

        /// Print a JSON array instead of tab-separated lines
        #[arg(long)]
        json: bool,

        /// Keep running this many seconds and print repaint notifications
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,

        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,
    },

    /// Print the monitored root reported by the daemon
    Root,

    /// Print the effective configuration as JSON
    Settings {
        #[arg(long, default_value = "synced", value_parser = parse_variant)]
        variant: OverlayVariant,
    },
}

#[derive(Debug, Serialize)]
struct PathStatus {
    path: String,
    variant: OverlayVariant,
    state: bool,
}

#[derive(Debug, Serialize)]
struct SettingsSnapshot {
    variant: OverlayVariant,
    daemon_url: String,
    timeout_ms: u64,
    freshness_ms: u64,
    refresh_delay_ms: u64,
    monitored_root: Option<String>,
    scope_marker: Option<String>,
    fold_case: bool,
}

impl From<&OverlayConfig> for SettingsSnapshot {
    fn from(config: &OverlayConfig) -> Self {
        Self {
            variant: config.variant,
            daemon_url: config.daemon_url.clone(),
            timeout_ms: config.timeout.as_millis() as u64,
            freshness_ms: config.freshness.as_millis() as u64,
            refresh_delay_ms: config.refresh_delay.as_millis() as u64,
            monitored_root: config.monitored_root.clone(),
            scope_marker: match &config.scope {
                ScopeRule::Marker(marker) => Some(marker.clone()),
                ScopeRule::MonitoredRoot => None,
            },
            fold_case: config.fold_case,
        }
    }
}

fn parse_variant(value: &str) -> Result<OverlayVariant, String> {
    OverlayVariant::parse(value)
        .ok_or_else(|| format!("unknown variant `{value}` (expected progress, synced or conflict)"))
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            variant,
            json,
            watch,
            paths,
        } => run_check(variant, json, watch, &paths),
        Commands::Root => run_root(),
        Commands::Settings { variant } => {
            let config = OverlayConfig::from_env(variant);
            println!(
                "{}",
                serde_json::to_string_pretty(&SettingsSnapshot::from(&config))?
            );
            Ok(())
        }
    }
}

fn run_check(
    variant: OverlayVariant,
    json: bool,
    watch: Option<u64>,
    targets: &[String],
) -> anyhow::Result<()> {
    let config = OverlayConfig::from_env(variant);
    debug!(daemon = %config.daemon_url, variant = variant.as_str(), "starting check");
    let (tx, rx) = mpsc::channel();
    let resolver = StatusResolver::new(config, Arc::new(ChannelNotifier::new(tx)))
        .context("failed to build status resolver")?;

    let statuses: Vec<PathStatus> = targets
        .iter()
        .map(|path| PathStatus {
            path: path.clone(),
            variant,
            state: resolver.resolve(path),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        for status in &statuses {
            println!("{}\t{}", status.path, status.state);
        }
    }

    if let Some(secs) = watch {
        let deadline = Instant::now() + Duration::from_secs(secs);
        info!(pending = resolver.pending_refreshes(), "watching for repaint notifications");
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(remaining) {
                Ok(path) => println!("changed\t{path}"),
                Err(_) => break,
            }
        }
    }
    Ok(())
}

fn run_root() -> anyhow::Result<()> {
    let config = OverlayConfig::from_env(OverlayVariant::Synced);
    let client = DaemonClient::with_base_url(&config.daemon_url, config.timeout)
        .context("invalid daemon url")?;
    let root = client
        .query_root()
        .with_context(|| format!("failed to query monitored root from {}", config.daemon_url))?;
    println!("{}", paths::normalize(&root));
    Ok(())
}
