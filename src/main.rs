use anyhow::{Context, Result};
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use models::container::ContainerName;
use services::{signer::SharedKeySigner, storage_service::LocalBlobStore};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("review_store=info,tower_http=info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting review-store with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db = db::connect(&cfg.database_url).await?;

    // --- Handle migration mode ---
    db::run_migrations(&db).await?;
    if migrate {
        tracing::info!("Database migration complete.");
        db.close().await;
        return Ok(()); // exit after migration
    }

    // --- Initialize credential core ---
    let signer = match cfg.signing_key.as_deref() {
        Some(key) => SharedKeySigner::from_base64(key).context("loading REVIEW_STORE_SIGNING_KEY")?,
        None => {
            tracing::warn!(
                "REVIEW_STORE_SIGNING_KEY not set; using an ephemeral key, issued URLs stop working on restart"
            );
            SharedKeySigner::ephemeral()
        }
    };
    let container = ContainerName::parse(&cfg.container)
        .with_context(|| format!("invalid container name `{}`", cfg.container))?;

    let store = Arc::new(LocalBlobStore::new(
        db.clone(),
        cfg.storage_dir.clone(),
        signer,
    ));
    let state = AppState::new(
        db.clone(),
        store.clone(),
        store,
        container,
        cfg.public_base_url.clone(),
        cfg.storage_timeout,
    );

    // --- Build router ---
    let app = routes::routes::app(state, &cfg.cors_origins);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
