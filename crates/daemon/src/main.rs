#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weather_relay_core::{CacheStore, FsCacheStore, OriginGate};
use weather_relay_daemon::{
    config::{self, Args, RelayConfig},
    http::{self, AppState},
    poller,
    upstream::{HttpUpstream, Upstream},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before parsing so API_KEY may come from .env.
    let dotenv = config::load_dotenv();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&args.log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) => debug!("no .env file loaded: {e}"),
    }

    let config = RelayConfig::from_args(args)?;
    info!(?config, "weather relay starting");

    let store: Arc<dyn CacheStore> = Arc::new(
        FsCacheStore::open(&config.cache_dir)
            .with_context(|| format!("opening cache dir {}", config.cache_dir.display()))?,
    );
    let upstream: Arc<dyn Upstream> = Arc::new(HttpUpstream::new(config.fetch_timeout)?);

    let pollers = poller::spawn_all(
        config.resources()?,
        upstream,
        Arc::clone(&store),
        config.fetch_timeout,
    );

    let app = http::router(AppState::new(store, OriginGate::default()));

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("binding {}", config.listen))?;
    info!(listen = %config.listen, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for p in pollers {
        let name = p.name();
        p.shutdown().await;
        debug!(resource = %name, "poller joined");
    }
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown requested");
}
