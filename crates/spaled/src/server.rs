//! Listener wiring for the webhook.
//!
//! Plain HTTP is served by axum directly. HTTPS accepts TCP connections,
//! completes the rustls handshake, and hands each connection to hyper with
//! the same router as its service. On shutdown both listeners stop
//! accepting and let in-flight requests finish.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use rustls::ServerConfig;
use spale_cluster::KubeCluster;
use spale_core::WebhookConfig;
use spale_webhook::{DecisionEngine, EngineSettings, build_router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{error, info, warn};

use crate::tls;

/// How long HTTPS connections may keep serving after shutdown is requested.
const CONNECTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the webhook until SIGINT/SIGTERM or a listener fails.
pub async fn run(config: WebhookConfig) -> anyhow::Result<()> {
    info!(
        port = config.port,
        tls_port = config.tls_port,
        tls = config.tls_enabled,
        ratio = %config.spot_ratio,
        "spale webhook starting"
    );

    // ── Cluster client ─────────────────────────────────────────

    // The kube client builds its TLS config from the process-level provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cluster = KubeCluster::connect()
        .await
        .context("failed to build Kubernetes client")?;
    info!("kubernetes client ready");

    let engine = DecisionEngine::new(cluster, EngineSettings::from_config(&config));
    let router = build_router(engine, Duration::from_secs(config.request_timeout_secs));

    // TLS material is loaded before anything starts listening.
    let tls_config = if config.tls_enabled {
        Some(tls::server_config(&config.tls_cert, &config.tls_key)?)
    } else {
        None
    };

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // ── Listeners ──────────────────────────────────────────────

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let http = serve_http(http_addr, router.clone(), shutdown_rx.clone());

    match tls_config {
        Some(tls_config) => {
            let https_addr = SocketAddr::from(([0, 0, 0, 0], config.tls_port));
            let listener = TcpListener::bind(https_addr)
                .await
                .with_context(|| format!("failed to bind HTTPS listener on {https_addr}"))?;
            info!(addr = %https_addr, "HTTPS listener started");
            let https = serve_https(listener, router, tls_config, shutdown_rx);
            tokio::try_join!(http, https)?;
        }
        None => http.await?,
    }

    info!("spale webhook stopped");
    Ok(())
}

async fn serve_http(
    addr: SocketAddr,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
    info!(%addr, "HTTP listener started");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { stopped(&mut shutdown).await })
        .await
        .context("HTTP listener failed")
}

async fn serve_https(
    listener: TcpListener,
    router: Router,
    tls_config: Arc<ServerConfig>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let acceptor = TlsAcceptor::from(tls_config);
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                let (stream, peer_addr) = accept_result.context("HTTPS accept failed")?;
                let acceptor = acceptor.clone();
                let router = router.clone();
                let mut shutdown = shutdown.clone();

                connections.spawn(async move {
                    let stream = match acceptor.accept(stream).await {
                        Ok(stream) => stream,
                        Err(e) => {
                            warn!(%peer_addr, error = %e, "TLS handshake failed");
                            return;
                        }
                    };

                    let svc = service_fn(move |req: hyper::Request<Incoming>| router.clone().oneshot(req));
                    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), svc);
                    tokio::pin!(conn);

                    let mut stopping = false;
                    loop {
                        tokio::select! {
                            result = conn.as_mut() => {
                                if let Err(e) = result {
                                    error!(%peer_addr, error = %e, "HTTPS connection error");
                                }
                                break;
                            }
                            _ = stopped(&mut shutdown), if !stopping => {
                                stopping = true;
                                conn.as_mut().graceful_shutdown();
                            }
                        }
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = stopped(&mut shutdown) => {
                info!(open = connections.len(), "HTTPS listener shutting down");
                break;
            }
        }
    }

    let drained = tokio::time::timeout(CONNECTION_DRAIN_TIMEOUT, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(remaining = connections.len(), "HTTPS connections did not drain in time");
        connections.abort_all();
    }

    Ok(())
}

/// Resolves once shutdown is requested or the sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
