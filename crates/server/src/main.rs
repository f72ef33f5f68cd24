// crates/server/src/main.rs
//! gitscout server binary.
//!
//! Loads config, connects Postgres (running migrations), wires the GitHub
//! and GLM clients, starts the periodic discovery scheduler, and serves
//! the Axum app until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use gitscout_core::llm::{GlmClient, LlmProvider};
use gitscout_db::Database;
use gitscout_github::GitHubClient;
use gitscout_server::config::Config;
use gitscout_server::crypto::{Encryptor, JwtManager};
use gitscout_server::ingest::Scheduler;
use gitscout_server::{create_app, AppState, Stores};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_env().context("loading config")?;

    let db = Database::connect(&config.database_url)
        .await
        .context("connecting to database")?;

    if config.redis_url.is_some() {
        // The shared limiter is not built into this deployment; the
        // in-memory fallback applies either way.
        warn!("REDIS_URL is set but unused; rate limiting stays in-memory");
    }

    let github = Arc::new(GitHubClient::new(
        config.github_client_id.clone(),
        config.github_client_secret.clone(),
    ));

    let llm: Option<Arc<dyn LlmProvider>> = match &config.glm_api_key {
        Some(key) => Some(Arc::new(GlmClient::new(key.clone()))),
        None => {
            info!("GLM_API_KEY not set; deep dives are disabled");
            None
        }
    };

    let encryptor = Encryptor::from_hex_key(&config.encrypt_key).context("loading encrypt key")?;
    let jwt = JwtManager::new(&config.jwt_secret);

    let port = config.port;
    let env = config.env.clone();
    let discovery_interval = config.discovery_interval;

    let state = AppState::new(
        config,
        Stores::from_database(db),
        github,
        llm,
        encryptor,
        jwt,
    );

    let scheduler = match discovery_interval {
        Some(interval) => {
            Some(Scheduler::new(state.discovery.clone(), interval).start())
        }
        None => {
            info!("discovery scheduler disabled (DISCOVERY_INTERVAL=0)");
            None
        }
    };

    let app = create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(port, env = %env, "starting server");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
