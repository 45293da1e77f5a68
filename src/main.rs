//! sitebridge - signed-request gateway for remote content automation

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitebridge::{
    config::{Args, LogFormat},
    content::{MemoryContentRepository, MemoryMediaStore, StaticUserDirectory},
    create_router,
    identity::{FileSettings, IdentityStore},
    keys::{HttpKeyProvider, HttpKeyProviderConfig},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("sitebridge={},tower_http=info", args.log_level).into());
    match args.log_format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  sitebridge v{}", env!("CARGO_PKG_VERSION"));
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Namespace: /{}", args.namespace);
    info!("======================================");

    let settings = Arc::new(FileSettings::open(args.settings_path()).await?);
    info!("Settings: {}", settings.path().display());

    // Activation: make sure the identifier exists before serving challenges
    let identity = IdentityStore::new(settings.clone(), &args.namespace);
    identity.ensure_identifier().await?;
    info!(key = identity.key(), "Installation identifier ready");

    let keys = Arc::new(HttpKeyProvider::new(
        HttpKeyProviderConfig::new(&args.key_endpoint).with_request_timeout(args.key_fetch_timeout()),
    )?);
    info!("Key endpoint: {}", keys.endpoint());

    let users = match &args.users_file {
        Some(path) => {
            let directory = StaticUserDirectory::from_file(path).await?;
            info!("Loaded users from {}", path.display());
            directory
        }
        None => StaticUserDirectory::default(),
    };

    let repo = Arc::new(MemoryContentRepository::new(&args.site_url));
    let media = Arc::new(MemoryMediaStore::new(args.media_base_url()));

    let state = Arc::new(
        AppState::new(
            &args.namespace,
            settings,
            keys,
            repo,
            media,
            Arc::new(users),
        )
        .with_update_scope(args.update_scope()),
    );
    info!("Update scope: {:?}", state.sync.update_scope());

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!("Listening on {}", args.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("sitebridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
