//! In-memory connector — serves fake instances over `tokio::io::duplex`.
//!
//! [`RouterConnector`] maps socket paths to axum routers. Connecting to a
//! mapped path opens an in-memory pipe whose far end is driven by hyper's
//! HTTP/1.1 server with that router; connecting to any other path is
//! refused. Every connect call is recorded so tests can assert the exact
//! failover order.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use sockrelay_core::{BoxConnection, BoxFuture, Connector};
use tokio::io::DuplexStream;
use tower::ServiceExt;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Connector that routes socket paths to in-process fake instances.
#[derive(Default)]
pub struct RouterConnector {
    instances: HashMap<PathBuf, Router>,
    attempts: Mutex<Vec<PathBuf>>,
}

impl RouterConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `router` behind `socket`.
    pub fn instance(mut self, socket: impl Into<PathBuf>, router: Router) -> Self {
        self.instances.insert(socket.into(), router);
        self
    }

    /// Every path passed to `connect`, in call order.
    pub fn attempts(&self) -> Vec<PathBuf> {
        self.attempts
            .lock()
            .expect("attempt log poisoned")
            .clone()
    }
}

impl Connector for RouterConnector {
    fn connect<'a>(&'a self, socket: &'a Path) -> BoxFuture<'a, io::Result<BoxConnection>> {
        self.attempts
            .lock()
            .expect("attempt log poisoned")
            .push(socket.to_path_buf());
        let router = self.instances.get(socket).cloned();

        Box::pin(async move {
            let router = router.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("no instance listening on {}", socket.display()),
                )
            })?;
            let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
            tokio::spawn(serve_pipe(server, router));
            Ok::<_, io::Error>(Box::new(client) as BoxConnection)
        })
    }
}

async fn serve_pipe(pipe: DuplexStream, router: Router) {
    let service = hyper::service::service_fn(move |request: hyper::Request<Incoming>| {
        router.clone().oneshot(request)
    });
    if let Err(e) = hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(pipe), service)
        .await
    {
        tracing::debug!(error = %e, "fake instance connection ended with error");
    }
}
