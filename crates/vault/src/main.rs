//! `propvault` — vault binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise telemetry (JSON logs, optional OTLP export).
//! 3. Decode the master secret into a [`KeyDeriver`]. A bad secret is fatal here.
//! 4. Prepare the identity-provider verifier and the record store. Both
//!    connect lazily on first use.
//! 5. Build the Axum router and serve, over TLS if configured.

mod auth;
mod config;
mod crypto;
mod records;
mod server;
mod storage;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use auth::{AuthGate, IntrospectionVerifier};
use config::Config;
use crypto::{FieldCipher, KeyDeriver};
use records::Records;
use server::state::AppState;
use storage::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        tls = cfg.tls_paths().is_some(),
        "propvault starting"
    );

    // -----------------------------------------------------------------------
    // 3. Master secret
    // -----------------------------------------------------------------------
    let deriver = KeyDeriver::from_base64(cfg.master_secret.expose())
        .context("MASTER_SECRET could not be loaded")?;
    let cipher = FieldCipher::new(deriver);

    // -----------------------------------------------------------------------
    // 4. External collaborators
    // -----------------------------------------------------------------------
    let verifier = IntrospectionVerifier::new(
        &cfg.idp_introspection_url,
        &cfg.idp_client_id,
        cfg.idp_client_secret.expose(),
    )?;
    let store = SqliteStore::new(cfg.database_path.clone());

    // -----------------------------------------------------------------------
    // 5. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(
        AuthGate::new(Arc::new(verifier)),
        Records::new(cipher, Arc::new(store)),
    );
    let router = server::router::build(state);
    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();

    match cfg.tls_paths() {
        Some((cert_path, key_path)) => {
            let tls_config = server::tls::load_server_config(cert_path, key_path)?;
            server::tls::serve(addr, tls_config, router, shutdown_signal()).await?;
        }
        None => {
            info!(addr = %addr, "listening");
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    telemetry::shutdown();
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        // Without a signal handler, run until killed.
        Err(_) => std::future::pending::<()>().await,
    }
}
