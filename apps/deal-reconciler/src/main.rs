//! Deal Reconciler Binary
//!
//! Streams live manager deals for a set of accounts and logs each window
//! update with per-symbol totals.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin deal-reconciler -- [config.yaml]
//! ```
//!
//! # Environment Variables
//!
//! - `DEAL_RECONCILER_CONFIG`: Config file path (default: config.yaml)
//! - `RUST_LOG`: Log filter (default: the configured level)
//! - `OTEL_*`: See the telemetry module

use std::io::ErrorKind;
use std::sync::Arc;

use anyhow::Context;
use deal_reconciler::application::ports::ConnectionDirectoryPort;
use deal_reconciler::application::services::{StreamClient, StreamEvent, StreamRegistry};
use deal_reconciler::domain::deal::DealField;
use deal_reconciler::infrastructure::config::{Config, ConfigError, DEFAULT_CONFIG_PATH, load_config};
use deal_reconciler::infrastructure::{ApiClient, DirectoryApi, WsDealFeed, metrics, telemetry};
use futures::StreamExt;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Another component may already have installed a provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    load_dotenv();

    let config = load_startup_config()?;
    let _telemetry_guard =
        telemetry::init_with_config(config.observability.tracing.clone().with_env_overrides())?;

    tracing::info!(
        rest = %config.sources.rest_base_url,
        ws = %config.sources.ws_base_url,
        "Starting Deal Reconciler"
    );

    if config.observability.metrics.enabled {
        metrics::init_metrics(config.observability.metrics.listen_address)
            .context("failed to initialize metrics")?;
    }

    let client = ApiClient::new(&config.sources.rest_base_url, config.sources.request_timeout())?;
    let accounts = resolve_accounts(&config, &DirectoryApi::new(client)).await?;
    if accounts.is_empty() {
        tracing::warn!("No manager accounts to stream");
    }

    let feed = Arc::new(WsDealFeed::new(&config.sources.ws_base_url));
    let registry = StreamRegistry::new(
        feed,
        config
            .stream
            .client_config(config.reconciliation.manager_volume_divisor),
    );

    let watchers: Vec<_> = accounts
        .iter()
        .map(|account| tokio::spawn(watch_stream(registry.get_or_start(account))))
        .collect();
    tracing::info!(streams = watchers.len(), "Live streams started");

    shutdown_signal().await;

    registry.stop_all().await;
    for watcher in watchers {
        watcher.abort();
    }

    tracing::info!("Deal Reconciler stopped");
    Ok(())
}

/// Config path from the first argument or `DEAL_RECONCILER_CONFIG`. A missing
/// file means defaults.
fn load_startup_config() -> anyhow::Result<Config> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DEAL_RECONCILER_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    match load_config(Some(&path)) {
        Ok(config) => Ok(config),
        Err(ConfigError::ReadError { source, .. }) if source.kind() == ErrorKind::NotFound => {
            eprintln!("Config file '{path}' not found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e).context("failed to load configuration"),
    }
}

/// Configured accounts, or every connected manager account.
async fn resolve_accounts(
    config: &Config,
    directory: &impl ConnectionDirectoryPort,
) -> anyhow::Result<Vec<String>> {
    if !config.stream.accounts.is_empty() {
        return Ok(config.stream.accounts.clone());
    }

    let accounts = directory
        .list_manager_accounts()
        .await
        .context("failed to list manager accounts")?;
    Ok(accounts
        .into_iter()
        .filter(|a| a.connected)
        .map(|a| a.identifier)
        .collect())
}

/// Log state changes and per-symbol totals for one stream.
async fn watch_stream<F>(client: Arc<StreamClient<F>>)
where
    F: deal_reconciler::application::ports::LiveDealFeedPort + 'static,
{
    let mut updates = Box::pin(client.updates());
    while let Some(event) = updates.next().await {
        match event {
            StreamEvent::StateChanged(state) => {
                tracing::info!(account = client.account_id(), state = ?state, "Stream state changed");
            }
            StreamEvent::WindowUpdated(window) => {
                tracing::info!(account = client.account_id(), deals = window.len(), "Live window updated");
                for group in client.group_snapshot(&window, &[DealField::Symbol]) {
                    let totals = group.totals();
                    tracing::info!(
                        account = client.account_id(),
                        symbol = %group.key_label(),
                        deals = group.count(),
                        volume = %totals.volume,
                        profit = %totals.profit,
                        "Live symbol totals"
                    );
                }
            }
        }
    }
}

/// Load .env from the current directory or the nearest ancestor.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
