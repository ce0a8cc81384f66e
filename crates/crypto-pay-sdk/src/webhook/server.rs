//! Axum HTTP endpoint for Crypto Pay webhook deliveries.
//!
//! [`WebhookServer`] turns a [`WebhookReceiver`] into axum routes. The
//! routes can be merged into an application's own router, or served
//! standalone through [`WebhookServer::bind`], over plain HTTP or TLS.
//!
//! # Examples
//!
//! ```rust,no_run
//! use crypto_pay_sdk::webhook::{UpdateDispatcher, WebhookReceiver, WebhookServer};
//! use crypto_pay_sdk::{ApiToken, RecognizedUpdateTypes, SubscriptionRegistry, WebhookConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WebhookConfig::new("0.0.0.0", "/crypto-pay/updates").with_port(8080);
//! let dispatcher = UpdateDispatcher::new(
//!     RecognizedUpdateTypes::default(),
//!     SubscriptionRegistry::new(),
//! );
//! let receiver = WebhookReceiver::new(&config, &ApiToken::new("42:QWERTY"), dispatcher);
//!
//! let server = WebhookServer::bind(&config, receiver).await?;
//! println!("listening on {}", server.local_addr());
//! server.serve(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{ConfigError, ServerError, WebhookError};
use crate::webhook::config::{TlsConfig, WebhookConfig};
use crate::webhook::receiver::{WebhookReceiver, WebhookRequest};

// ============================================================================
// Router
// ============================================================================

#[derive(Clone)]
struct ServerState {
    receiver: Arc<WebhookReceiver>,
    max_body_size: usize,
    read_timeout: Duration,
}

/// Axum front end for a [`WebhookReceiver`].
#[derive(Clone)]
pub struct WebhookServer {
    state: ServerState,
}

impl WebhookServer {
    /// Create a server front end using the body limits from `config`.
    pub fn new(config: &WebhookConfig, receiver: WebhookReceiver) -> Self {
        Self {
            state: ServerState {
                receiver: Arc::new(receiver),
                max_body_size: config.max_body_size,
                read_timeout: config.read_timeout(),
            },
        }
    }

    /// Router containing only the webhook route.
    ///
    /// Merge it into an application router with [`Router::merge`]; requests
    /// for other paths then reach the application's own routes. Nesting
    /// under a prefix is not supported since the receiver matches the full
    /// request path.
    ///
    /// # Panics
    ///
    /// Panics if the receiver path is not a literal axum route, which
    /// [`WebhookConfig::validate`] rejects. [`bind`](Self::bind) validates
    /// first; callers building the server by hand should do the same.
    pub fn routes(&self) -> Router {
        self.base_router()
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Router answering `400 Bad Request` for anything but the webhook route.
    pub fn standalone_router(&self) -> Router {
        self.base_router()
            .fallback(route_mismatch)
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    fn base_router(&self) -> Router<ServerState> {
        // Every method is routed so that non-POST requests get the same 400
        // as a path mismatch instead of axum's 405
        Router::new().route(self.state.receiver.path(), any(handle_webhook))
    }

    /// Validate `config`, load TLS material if configured, and bind the socket.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` for invalid configuration or unreadable
    /// TLS material, and `ServerError::Bind` if the socket cannot be bound.
    /// No socket is opened when configuration fails.
    pub async fn bind(
        config: &WebhookConfig,
        receiver: WebhookReceiver,
    ) -> Result<BoundWebhookServer, ServerError> {
        config.validate()?;
        let tls = config.tls.as_ref().map(load_tls_acceptor).transpose()?;
        let addr = config.socket_addr()?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                address: addr.to_string(),
                message: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ServerError::Bind {
            address: addr.to_string(),
            message: e.to_string(),
        })?;

        info!(
            address = %local_addr,
            path = %config.path,
            tls = tls.is_some(),
            verification = config.update_verification,
            "Webhook server bound"
        );

        Ok(BoundWebhookServer {
            listener,
            local_addr,
            router: Self::new(config, receiver).standalone_router(),
            tls,
            read_timeout: config.read_timeout(),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }
}

impl std::fmt::Debug for WebhookServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookServer")
            .field("path", &self.state.receiver.path())
            .field("max_body_size", &self.state.max_body_size)
            .field("read_timeout", &self.state.read_timeout)
            .finish()
    }
}

async fn handle_webhook(State(state): State<ServerState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match read_body(body, state.max_body_size, state.read_timeout).await {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    let request = WebhookRequest::new(
        parts.method,
        parts.uri.path(),
        header_map(&parts.headers),
        body,
    );

    state.receiver.receive(request).await.into_response()
}

async fn route_mismatch(method: Method, uri: Uri) -> Response {
    debug!(method = %method, path = %uri.path(), "No webhook route for request");
    WebhookError::RouteMismatch.into_response()
}

/// Buffer the full body, bounded by size and time.
async fn read_body(body: Body, max_size: usize, timeout: Duration) -> Result<Bytes, WebhookError> {
    let collected = tokio::time::timeout(timeout, Limited::new(body, max_size).collect())
        .await
        .map_err(|_| WebhookError::BodyTimeout {
            seconds: timeout.as_secs(),
        })?;

    match collected {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(WebhookError::PayloadTooLarge { max_size })
        }
        Err(e) => Err(WebhookError::BodyRead {
            message: e.to_string(),
        }),
    }
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            // Non-UTF-8 values cannot be a valid hex signature anyway
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

// ============================================================================
// TLS
// ============================================================================

/// Build a TLS acceptor from PEM files on disk.
pub(crate) fn load_tls_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor, ConfigError> {
    let cert_pem = std::fs::read(&tls.certificate_path).map_err(|e| ConfigError::Tls {
        message: format!(
            "failed to read certificate {}: {}",
            tls.certificate_path.display(),
            e
        ),
    })?;
    let key_pem = Zeroizing::new(std::fs::read(&tls.private_key_path).map_err(|e| {
        ConfigError::Tls {
            message: format!(
                "failed to read private key {}: {}",
                tls.private_key_path.display(),
                e
            ),
        }
    })?);

    let certs = CertificateDer::pem_slice_iter(&cert_pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::Tls {
            message: format!("failed to parse certificates: {e}"),
        })?;
    if certs.is_empty() {
        return Err(ConfigError::Tls {
            message: format!(
                "no certificates found in {}",
                tls.certificate_path.display()
            ),
        });
    }

    let key = PrivateKeyDer::from_pem_slice(&key_pem).map_err(|e| ConfigError::Tls {
        message: format!("failed to parse private key: {e}"),
    })?;

    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| ConfigError::Tls {
                message: format!("protocol version error: {e}"),
            })?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| ConfigError::Tls {
                message: format!("server config error: {e}"),
            })?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

// ============================================================================
// Serving
// ============================================================================

/// Webhook server with its socket bound, ready to serve.
pub struct BoundWebhookServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    router: Router,
    tls: Option<TlsAcceptor>,
    read_timeout: Duration,
    shutdown_timeout: Duration,
}

impl BoundWebhookServer {
    /// Address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Check if connections are served over TLS.
    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Serve until `shutdown` completes.
    ///
    /// After the signal no new connections are accepted. In-flight requests
    /// get up to the configured shutdown timeout to finish.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (signal_tx, signal_rx) = watch::channel(false);
        let signal = async move {
            shutdown.await;
            info!("Shutdown signal received, stopping webhook server");
            let _ = signal_tx.send(true);
        };

        match self.tls {
            Some(acceptor) => {
                serve_tls(
                    self.listener,
                    self.router,
                    acceptor,
                    signal,
                    signal_rx,
                    self.read_timeout,
                    self.shutdown_timeout,
                )
                .await;
                Ok(())
            }
            None => {
                serve_plain(
                    self.listener,
                    self.router,
                    signal,
                    signal_rx,
                    self.shutdown_timeout,
                )
                .await
            }
        }
    }
}

impl std::fmt::Debug for BoundWebhookServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundWebhookServer")
            .field("local_addr", &self.local_addr)
            .field("tls", &self.tls.is_some())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish_non_exhaustive()
    }
}

/// Resolves once shutdown was signalled, never if the sender went away first.
async fn signalled(mut signal_rx: watch::Receiver<bool>) {
    let stopped = signal_rx.wait_for(|stop| *stop).await.is_ok();
    if !stopped {
        std::future::pending::<()>().await;
    }
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    signal: impl Future<Output = ()> + Send + 'static,
    signal_rx: watch::Receiver<bool>,
    shutdown_timeout: Duration,
) -> Result<(), ServerError> {
    let server = async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await
    };
    let deadline = async move {
        signalled(signal_rx).await;
        tokio::time::sleep(shutdown_timeout).await;
    };

    tokio::select! {
        result = server => result.map_err(|e| ServerError::Serve {
            message: e.to_string(),
        }),
        _ = deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, dropping in-flight requests"
            );
            Ok(())
        }
    }
}

async fn serve_tls(
    listener: TcpListener,
    router: Router,
    acceptor: TlsAcceptor,
    signal: impl Future<Output = ()> + Send + 'static,
    signal_rx: watch::Receiver<bool>,
    handshake_timeout: Duration,
    shutdown_timeout: Duration,
) {
    let mut connections = JoinSet::new();
    let mut stop = std::pin::pin!(signalled(signal_rx.clone()));
    tokio::spawn(signal);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        continue;
                    }
                };

                connections.spawn(serve_tls_connection(
                    stream,
                    peer,
                    acceptor.clone(),
                    router.clone(),
                    signal_rx.clone(),
                    handshake_timeout,
                ));
            }
        }
    }

    drop(listener);

    let drained = tokio::time::timeout(shutdown_timeout, async {
        while connections.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            timeout_seconds = shutdown_timeout.as_secs(),
            "Graceful shutdown timed out, dropping in-flight requests"
        );
        connections.abort_all();
    }
}

async fn serve_tls_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    router: Router,
    signal_rx: watch::Receiver<bool>,
    handshake_timeout: Duration,
) {
    let tls_stream = match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => tls_stream,
        Ok(Err(e)) => {
            debug!(peer = %peer, error = %e, "TLS handshake failed");
            return;
        }
        Err(_) => {
            debug!(peer = %peer, "TLS handshake timed out");
            return;
        }
    };

    let builder = auto::Builder::new(TokioExecutor::new());
    let connection =
        builder.serve_connection(TokioIo::new(tls_stream), TowerToHyperService::new(router));
    let mut connection = std::pin::pin!(connection);
    let mut stop = std::pin::pin!(signalled(signal_rx));
    let mut draining = false;

    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    debug!(peer = %peer, error = %e, "Connection closed with error");
                }
                break;
            }
            _ = &mut stop, if !draining => {
                connection.as_mut().graceful_shutdown();
                draining = true;
            }
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
