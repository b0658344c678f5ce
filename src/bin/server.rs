use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use notihub::db::store::{PgStore, Store};
use notihub::dispatch::{DispatchService, DispatchWorkerPool};
use notihub::notifications::senders::SenderRegistry;
use notihub::server::config::ServerConfig;
use notihub::web::{AppState, create_axum_router};

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-channel notification routing and dispatch service", long_about = None)]
struct Args {}

fn init_logging() {
    // File: JSON, daily rotation. Stdout: human readable.
    let file_appender = rolling::daily("logs", "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _args = Args::parse();
    dotenv().ok();
    init_logging();

    let config = Arc::new(ServerConfig::from_env()?);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;
    info!("database connected and migrated");

    let store: Arc<dyn Store> = Arc::new(PgStore::new(
        pool,
        config.credentials_encryption_key.clone(),
    ));
    let senders = Arc::new(SenderRegistry::with_defaults());
    let dispatcher = Arc::new(DispatchService::new(
        store.clone(),
        senders,
        config.dispatch_options(),
    ));
    let worker_pool = Arc::new(DispatchWorkerPool::start(
        dispatcher.clone(),
        config.dispatch_worker_count,
        config.dispatch_queue_size,
    ));
    info!(
        workers = config.dispatch_worker_count,
        queue = config.dispatch_queue_size,
        "dispatch worker pool started"
    );

    let state = Arc::new(AppState {
        store,
        dispatcher,
        worker_pool,
        config: config.clone(),
    });
    let router = create_axum_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "HTTP server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
