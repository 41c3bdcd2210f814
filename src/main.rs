use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use promptcache::config::{self, Config};
use promptcache::database::SqliteStore;
use promptcache::llm::OpenAiClient;
use promptcache::server::Server;
use promptcache::service::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Read before the subscriber exists so RUST_LOG may come from .env.
    let dotenv = config::load_dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match dotenv {
        Ok(Some(path)) => info!(path = %path.display(), "loaded environment file"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "ignoring unreadable .env file"),
    }

    let config = Config::parse();
    config.validate()?;
    info!(?config, "starting promptcache");

    let generator = OpenAiClient::new(config.openai_config()?)
        .context("failed to build upstream client")?;
    let store = SqliteStore::open(&config.database_path).with_context(|| {
        format!("failed to open database {}", config.database_path.display())
    })?;
    let state = AppState::new(config.cache_config(), Arc::new(store), Arc::new(generator));
    let router = Arc::new(service::router(Arc::new(state)));

    let server = Server::bind(&config.bind).await?;
    server
        .run_until(
            move |req| {
                let router = Arc::clone(&router);
                async move { router.route(req).await }
            },
            shutdown_signal(),
        )
        .await?;

    info!("promptcache stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
