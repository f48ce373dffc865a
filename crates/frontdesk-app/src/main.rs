//! Frontdesk application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Open SQLite storage and restore persisted threads
//! 3. Pick the webhook notifier (HTTP when a URL is configured)
//! 4. Serve the axum API

mod cli;

use std::sync::Arc;

use clap::Parser;

use frontdesk_api::auth::load_or_generate_token;
use frontdesk_api::routes;
use frontdesk_api::state::AppState;
use frontdesk_core::config::FrontdeskConfig;
use frontdesk_routing::{HttpWebhookNotifier, NoopNotifier, WebhookNotifier};
use frontdesk_storage::Database;

use crate::cli::{expand_home, CliArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = FrontdeskConfig::load_or_default(&config_file);
    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.server.port = args.resolve_port(config.server.port);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Frontdesk v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    if args.init_config {
        config.save(&config_file)?;
        tracing::info!(path = %config_file.display(), "Configuration written");
        return Ok(());
    }
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join("frontdesk.db");
    let database = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Webhook.
    let notifier: Arc<dyn WebhookNotifier> = match HttpWebhookNotifier::from_config(&config.webhook)? {
        Some(http) => {
            tracing::info!(url = config.webhook.url.as_deref().unwrap_or(""), "Webhook notifications enabled");
            Arc::new(http)
        }
        None => {
            tracing::info!("No webhook URL configured, notifications disabled");
            Arc::new(NoopNotifier)
        }
    };

    let api_token = load_or_generate_token(&data_dir.join("api_token"));
    let state = AppState::new(config, database, notifier, api_token)?;

    if let Err(e) = routes::start_server(state).await {
        tracing::error!(error = %e, "API server stopped");
        return Err(e.into());
    }
    Ok(())
}
