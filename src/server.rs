//! HTTP transport and graceful shutdown.
//!
//! Each hyper request is converted into a kernel [`Request`] that remembers
//! the peer address, dispatched on tokio's blocking pool (the kernel is
//! synchronous), and the negotiated [`Response`](crate::Response) leaves
//! through an [`HttpEmitter`]. Methods the kernel does not know are answered
//! by [`Dispatcher::reject_method`], so they still get an `Allow` header.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or Ctrl-C the server:
//! 1. Stops `listener.accept()` immediately; no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], so `main` can exit cleanly.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::diagnostic;
use crate::dispatch::Dispatcher;
use crate::emit::{Emitter, HttpEmitter};
use crate::error::{Error, Result};
use crate::method::Method;
use crate::request::{Request, parse_query};
use crate::response::Response;
use crate::status::Status;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use portico::Server;
    ///
    /// assert!(Server::bind("127.0.0.1:3000").is_ok());
    /// assert!(Server::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address `{addr}`: {e}")))?;
        Ok(Self { addr })
    }

    /// Serves until SIGTERM or Ctrl-C, then drains in-flight connections.
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_until(listener, dispatcher, shutdown_signal()).await
    }

    /// Serves on an already-bound listener until `shutdown` resolves.
    pub async fn serve_until<S>(
        self,
        listener: TcpListener,
        dispatcher: Dispatcher,
        shutdown: S,
    ) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let dispatcher = Arc::new(dispatcher);
        let local = listener.local_addr().unwrap_or(self.addr);
        info!(addr = %local, "portico listening");

        let mut connections = JoinSet::new();
        let mut shutdown = pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                biased;
                () = &mut shutdown => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => continue,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(Arc::clone(&dispatcher), stream, peer));
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            }
        }

        info!(in_flight = connections.len(), "shutdown requested, draining connections");
        while connections.join_next().await.is_some() {}

        info!("portico stopped");
        Ok(())
    }
}

// ── Request handling ──────────────────────────────────────────────────────────

/// Serves every request on one connection, HTTP/1.1 or HTTP/2.
async fn serve_connection(dispatcher: Arc<Dispatcher>, stream: TcpStream, peer: SocketAddr) {
    let svc = service_fn(move |req| handle(Arc::clone(&dispatcher), peer, req));
    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), svc)
        .await
    {
        warn!(%peer, "connection error: {e}");
    }
}

/// A converted request, split by whether the kernel can route its method.
enum Inbound {
    Routable(Request),
    /// Method name outside [`Method`]. The request carries a placeholder
    /// method and is only used to pick the 405/404 and negotiate it.
    Unsupported(String, Request),
}

/// One hyper request → one hyper response. Every failure is turned into a
/// response here, so hyper never sees an error.
async fn handle(
    dispatcher: Arc<Dispatcher>,
    peer: SocketAddr,
    req: hyper::Request<hyper::body::Incoming>,
) -> std::result::Result<http::Response<Full<Bytes>>, Infallible> {
    let response = match convert(req, peer).await {
        Ok(Inbound::Routable(req)) => run_blocking(dispatcher, move |d| d.dispatch(req)).await,
        Ok(Inbound::Unsupported(method, req)) => {
            run_blocking(dispatcher, move |d| Ok(d.reject_method(&method, &req))).await
        }
        Err(response) => response,
    };

    let mut emitter = HttpEmitter::new();
    let emitted = emitter.emit(response).ok().and_then(|()| emitter.take());
    Ok(emitted.unwrap_or_else(|| {
        let mut fallback = http::Response::new(Full::new(Bytes::new()));
        *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    }))
}

/// Builds the kernel request, tagged with the peer it came from.
async fn convert(
    req: hyper::Request<hyper::body::Incoming>,
    peer: SocketAddr,
) -> std::result::Result<Inbound, Response> {
    let (parts, body) = req.into_parts();

    let (method, unsupported) = match Method::try_from(&parts.method) {
        Ok(method) => (method, None),
        Err(_) => (Method::Get, Some(parts.method.as_str().to_owned())),
    };

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(e) => {
            warn!(%peer, "failed to read request body: {e}");
            return Err(Response::builder().status(Status::BadRequest).text("Bad Request"));
        }
    };

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned()))
        })
        .collect();
    let query = parts.uri.query().map(parse_query).unwrap_or_default();

    let req = Request::new(method, parts.uri.path().to_owned(), query, headers, body).with_remote_addr(peer);
    Ok(match unsupported {
        None => Inbound::Routable(req),
        Some(name) => Inbound::Unsupported(name, req),
    })
}

/// Runs `job` on the blocking pool. An `Err` becomes the diagnostic page.
async fn run_blocking<F>(dispatcher: Arc<Dispatcher>, job: F) -> Response
where
    F: FnOnce(&Dispatcher) -> Result<Response> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || job(&dispatcher)).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => diagnostic::render(&err),
        Err(join) => {
            error!("dispatch task failed: {join}");
            Response::builder().status(Status::InternalServerError).text("Internal Server Error")
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// SIGINT on Unix, Ctrl-C elsewhere. A handler that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
