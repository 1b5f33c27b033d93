//! Main HTTP listener.
//!
//! # Responsibilities
//! - Accept connections and serve HTTP/1.1 and HTTP/2 (with upgrades)
//! - Hand each request to the router with its peer address attached
//! - On shutdown: stop accepting, drain in-flight connections within the
//!   shutdown timeout, then close whatever is left
//!
//! # Design Decisions
//! - Own accept loop on `hyper-util` so every connection task is owned by
//!   a `JoinSet` and can be aborted when the drain deadline passes
//! - The accept loop checks for shutdown before every accept; with a
//!   lifecycle attached, a connection accepted once `Draining` is published
//!   is dropped unserved

use axum::{extract::ConnectInfo, Router};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::{conn::auto, graceful::GracefulShutdown},
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tower::ServiceExt;
use tracing::Instrument;

use crate::lifecycle::state::{LifecycleState, StateCell};

/// How connection draining ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every connection finished within the timeout.
    Graceful,
    /// The timeout passed and `aborted` connections were closed.
    Forced { aborted: usize },
}

/// HTTP server for the request pipeline.
pub struct HttpServer {
    app: Router,
    shutdown_timeout: Duration,
    lifecycle: Option<StateCell>,
}

impl HttpServer {
    pub fn new(app: Router, shutdown_timeout: Duration) -> Self {
        Self {
            app,
            shutdown_timeout,
            lifecycle: None,
        }
    }

    /// Stop accepting as soon as `state` reaches `Draining`, even before
    /// the shutdown message arrives.
    #[must_use]
    pub fn with_lifecycle(mut self, state: StateCell) -> Self {
        self.lifecycle = Some(state);
        self
    }

    fn draining(&self) -> bool {
        self.lifecycle
            .as_ref()
            .is_some_and(|state| state.get() >= LifecycleState::Draining)
    }

    /// Serve `listener` until a shutdown message arrives, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> DrainOutcome {
        let builder = auto::Builder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        let mut connections = JoinSet::new();

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }

        loop {
            if self.draining() {
                tracing::info!("Draining, closing listener");
                break;
            }

            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown received, closing listener");
                    break;
                }

                Some(_) = connections.join_next(), if !connections.is_empty() => {}

                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(conn) => conn,
                        Err(err) => {
                            tracing::warn!(error = %err, "Accept failed");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            continue;
                        }
                    };

                    if self.draining() {
                        tracing::debug!(remote = %remote, "Connection refused while draining");
                        drop(stream);
                        break;
                    }

                    let app = self.app.clone();
                    let service = hyper::service::service_fn(move |mut req: hyper::Request<Incoming>| {
                        req.extensions_mut().insert(ConnectInfo(remote));
                        app.clone().oneshot(req)
                    });

                    let conn = builder
                        .serve_connection_with_upgrades(TokioIo::new(stream), service)
                        .into_owned();
                    let conn = graceful.watch(conn);
                    let span = tracing::info_span!("conn", remote = %remote);

                    connections.spawn(
                        async move {
                            if let Err(err) = conn.await {
                                tracing::debug!(error = %err, "Connection closed with error");
                            }
                        }
                        .instrument(span),
                    );
                }
            }
        }

        drop(listener);
        self.drain(graceful, connections).await
    }

    async fn drain(&self, graceful: GracefulShutdown, mut connections: JoinSet<()>) -> DrainOutcome {
        tracing::info!(
            in_flight = connections.len(),
            timeout_secs = self.shutdown_timeout.as_secs_f64(),
            "Draining connections"
        );

        let outcome = match tokio::time::timeout(self.shutdown_timeout, graceful.shutdown()).await {
            Ok(()) => DrainOutcome::Graceful,
            Err(_) => {
                let aborted = connections.len();
                tracing::warn!(aborted, "Shutdown timeout elapsed, closing remaining connections (degraded shutdown)");
                connections.abort_all();
                DrainOutcome::Forced { aborted }
            }
        };

        while connections.join_next().await.is_some() {}
        tracing::info!("HTTP server stopped");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn app() -> Router {
        Router::new().route("/", get(|| async { "ok" }))
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = broadcast::channel(1);
        let task = tokio::spawn(HttpServer::new(app(), Duration::from_secs(1)).run(listener, rx));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf).starts_with("HTTP/1.1 200"));

        tx.send(()).unwrap();
        assert_eq!(task.await.unwrap(), DrainOutcome::Graceful);
    }

    #[tokio::test]
    async fn test_connection_dropped_once_draining() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = StateCell::new();
        state.advance(LifecycleState::Draining);

        // No shutdown message is ever sent; the published state alone stops
        // the accept loop.
        let (_tx, rx) = broadcast::channel(1);
        let server = HttpServer::new(app(), Duration::from_secs(1)).with_lifecycle(state);
        let task = tokio::spawn(server.run(listener, rx));

        if let Ok(mut stream) = TcpStream::connect(addr).await {
            let _ = stream
                .write_all(b"GET / HTTP/1.1\r\nHost: test\r\n\r\n")
                .await;
            let mut buf = Vec::new();
            let _ = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut buf))
                .await
                .expect("connection left open while draining");
            assert!(buf.is_empty(), "served while draining");
        }

        let outcome = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("server kept running while draining")
            .unwrap();
        assert_eq!(outcome, DrainOutcome::Graceful);
    }
}
