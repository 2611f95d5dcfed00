use anyhow::{Context, Result};
use dotenvy::dotenv;
use history::{HistoryCache, SqliteHistoryStore, Sweeper};
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webhook::{router, AppState, Config, Dispatcher};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env::var("RUST_LOG").unwrap_or_else(|_| {
            "voice_webhook=info,webhook=info,history=info,llm=info,tower_http=info".into()
        })))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store = SqliteHistoryStore::open(&config.db_path).with_context(|| {
        format!("failed to open history database {}", config.db_path.display())
    })?;
    let cache = Arc::new(HistoryCache::new(Arc::new(store), config.cache.clone()));
    let sweeper = Sweeper::new(cache.clone(), config.sweeper.clone()).spawn();

    let client = llm::Client::new(config.llm.clone())?;
    info!(model = %client.model(), url = %config.llm.url, "Inference endpoint configured");

    let dispatcher = Dispatcher::new(cache, Arc::new(client), config.context_exchanges);
    let app = router(AppState {
        dispatcher: Arc::new(dispatcher),
    });

    let addr = config.addr();
    info!("Server listening on {}", addr);
    info!("History database: {}", config.db_path.display());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
