//! PINOVARA ODK sync server binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use pinovara_core::AttachmentKind;
use pinovara_core::config::AppConfig;
use pinovara_odk::PgRemoteSource;
use pinovara_server::{AppState, create_router};
use pinovara_storage::AttachmentStores;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PINOVARA - ODK attachment sync service
#[derive(Parser, Debug)]
#[command(name = "pinovarad")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "PINOVARA_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Sync one organization and print the JSON report(s)
    Sync {
        /// Local organization ID
        #[arg(long)]
        organization: i64,
        /// Attachment kind (document, photo, signature); all kinds when omitted
        #[arg(long)]
        kind: Option<AttachmentKind>,
        /// Email recorded as the uploader of new records
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `sync` output stays pipeable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("PINOVARA ODK sync v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    let metadata = pinovara_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    let stores = AttachmentStores::from_config(&config.uploads)
        .await
        .context("failed to initialize upload directories")?;
    stores
        .health_check()
        .await
        .context("upload directory health check failed")?;
    tracing::info!("Upload directories ready");

    let remote = Arc::new(PgRemoteSource::new(&config.odk));
    let state = AppState::new(config.clone(), metadata, stores, remote);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::Sync {
            organization,
            kind,
            user,
        } => {
            let output = match kind {
                Some(kind) => serde_json::to_string_pretty(
                    &state.sync.sync_organization(kind, organization, &user).await,
                ),
                None => serde_json::to_string_pretty(
                    &state.sync.sync_all_kinds(organization, &user).await,
                ),
            }
            .context("failed to encode report")?;
            println!("{output}");
            Ok(())
        }
    }
}

/// Merge the optional TOML file with `PINOVARA_` environment variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    // PINOVARA_CONFIG only names the file.
    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with("PINOVARA_") && key != "PINOVARA_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: pinovarad --config /path/to/config.toml\n  \
             2. Environment variables: PINOVARA_SERVER__BIND=0.0.0.0:3001 \
             PINOVARA_UPLOADS__PHOTOS=/srv/uploads/fotos pinovarad\n\n\
             See config/server.example.toml for example configuration.\n\
             Set PINOVARA_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    figment
        .merge(Env::prefixed("PINOVARA_").split("__"))
        .extract()
        .context("failed to load configuration")
}

async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = state
        .config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", state.config.server.bind))?;

    let app = create_router(state);

    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
