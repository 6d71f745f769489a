//! TLS listener setup using rustls.
//!
//! When `TLS_CERT_PATH` and `TLS_KEY_PATH` are configured the service
//! terminates TLS itself; otherwise it serves plain HTTP and expects a
//! terminating proxy in front.

use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use rustls::ServerConfig;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

/// Build a [`rustls::ServerConfig`] from PEM-encoded certificate and private key bytes.
///
/// # Errors
///
/// Returns an error if the certificate or key cannot be parsed, or if rustls
/// rejects the configuration.
pub fn build_server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<ServerConfig>> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse TLS certificate chain")?;
    if certs.is_empty() {
        anyhow::bail!("no certificates found in PEM data");
    }

    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_pem))
        .context("failed to read TLS private key")?
        .context("no private key found in PEM data")?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .context("failed to select TLS protocol versions")?
    .with_no_client_auth()
    .with_single_cert(certs, key)
    .context("failed to build rustls ServerConfig")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Read the PEM files at `cert_path` and `key_path` and build a server config.
///
/// # Errors
///
/// Returns an error if either file cannot be read or parsed.
pub fn load_server_config(cert_path: &str, key_path: &str) -> Result<Arc<ServerConfig>> {
    let cert_pem = std::fs::read(cert_path)
        .with_context(|| format!("failed to read TLS certificate from {cert_path}"))?;
    let key_pem = std::fs::read(key_path)
        .with_context(|| format!("failed to read TLS private key from {key_path}"))?;
    build_server_config(&cert_pem, &key_pem)
}

/// Accept loop: terminate TLS on each connection and hand it to `router`.
///
/// Stops accepting once `shutdown` resolves. A failed handshake or connection
/// only affects that connection.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound.
pub async fn serve<F>(
    addr: SocketAddr,
    config: Arc<ServerConfig>,
    router: Router,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let acceptor = TlsAcceptor::from(config);
    info!(addr = %addr, "listening (tls)");

    tokio::pin!(shutdown);
    loop {
        let (tcp, peer_addr) = tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("tls listener stopped");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "accept error");
                    continue;
                }
            },
        };
        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(router.clone());
        tokio::spawn(async move {
            let tls = match acceptor.accept(tcp).await {
                Ok(s) => s,
                Err(e) => {
                    debug!(%peer_addr, error = %e, "tls handshake failed");
                    return;
                }
            };
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(tls), service)
                .await
            {
                debug!(%peer_addr, error = %e, "connection closed with error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CERT_PEM: &[u8] = include_bytes!("testdata/localhost.crt");
    const KEY_PEM: &[u8] = include_bytes!("testdata/localhost.key");

    #[test]
    fn builds_config_from_pem() {
        let config = build_server_config(CERT_PEM, KEY_PEM).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[tokio::test]
    async fn serve_returns_when_shutdown_resolves() {
        let config = build_server_config(CERT_PEM, KEY_PEM).unwrap();
        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            serve(addr, config, Router::new(), std::future::ready(())),
        )
        .await
        .expect("serve did not stop");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn serve_keeps_accepting_until_shutdown() {
        let config = build_server_config(CERT_PEM, KEY_PEM).unwrap();
        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(addr, config, Router::new(), async {
            let _ = rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!server.is_finished());

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("serve did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_empty_cert_pem() {
        let result = build_server_config(b"", b"");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_garbage_pem() {
        let result = build_server_config(b"not a pem", b"also not a pem");
        assert!(result.is_err());
    }

    #[test]
    fn missing_files_are_reported() {
        let err = load_server_config("/nonexistent/tls.crt", "/nonexistent/tls.key").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tls.crt"));
    }
}
