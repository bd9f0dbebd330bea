//! NLPers - blog, file archive and site settings for the NLPers community

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nlpers::{
    api::{self, AppState},
    cache::create_cache,
    cli::{self, CliArgs, Command},
    config::Config,
    db,
    services::Services,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nlpers=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    // Load configuration
    let config = Config::load_with_env(&args.config_file)?;
    tracing::info!("Configuration loaded from {}", args.config_file.display());

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database ready ({} migrations applied)", applied);

    // Initialize cache
    let cache = create_cache(&config.cache).await?;
    tracing::info!("Cache initialized");

    let services = Services::new(pool, cache, &config);

    match args.command() {
        Command::Serve => serve(services, config).await,
        task => cli::run_task(&services, task).await,
    }
}

async fn serve(services: Services, config: Config) -> Result<()> {
    let (settings, created) = services.settings.ensure_exists().await?;
    if created {
        tracing::info!("Created default site settings");
    }
    if settings.maintenance_mode {
        tracing::warn!("Maintenance mode is on");
    }

    tokio::fs::create_dir_all(&config.upload.path).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = api::build_router(AppState::new(services, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
