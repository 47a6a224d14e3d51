//! Transport — one request/response attempt against one instance socket.
//!
//! Every attempt opens a fresh connection through a [`Connector`], performs a
//! single HTTP/1.1 `PUT /` exchange with `hyper`, and closes the connection
//! again. Nothing is pooled or reused between attempts.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{self, HeaderValue};
use hyper::{Method, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::BoxFuture;

/// Path every envelope is sent to.
pub const REQUEST_PATH: &str = "/";

/// Host header value; instances are addressed by socket, not by name.
pub const REQUEST_HOST: &str = "localhost";

/// A byte stream to one instance.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Owned, type-erased connection returned by a [`Connector`].
pub type BoxConnection = Box<dyn Connection>;

/// Opens byte-stream connections to named socket endpoints.
///
/// The default is [`UnixConnector`]. Tests substitute in-memory
/// implementations so no real sockets are needed.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, socket: &'a Path) -> BoxFuture<'a, io::Result<BoxConnection>>;
}

/// Dials real Unix domain sockets.
#[derive(Debug, Clone, Default)]
pub struct UnixConnector {
    connect_timeout: Option<Duration>,
}

impl UnixConnector {
    /// Connector without a dial timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector that gives up dialing after `timeout`.
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
        }
    }
}

impl Connector for UnixConnector {
    fn connect<'a>(&'a self, socket: &'a Path) -> BoxFuture<'a, io::Result<BoxConnection>> {
        Box::pin(async move {
            let dial = UnixStream::connect(socket);
            let stream = match self.connect_timeout {
                Some(timeout) => tokio::time::timeout(timeout, dial).await.map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("connect timed out after {timeout:?}"),
                    )
                })??,
                None => dial.await?,
            };
            Ok::<_, io::Error>(Box::new(stream) as BoxConnection)
        })
    }
}

/// Why a single attempt failed. Every variant names the socket involved.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("failed to connect to socket {path}: {source}", path = .socket.display())]
    Connect {
        socket: PathBuf,
        source: io::Error,
    },

    #[error("failed to execute request to socket {path}: {source}", path = .socket.display())]
    Request {
        socket: PathBuf,
        source: hyper::Error,
    },

    #[error("failed to read response body from socket {path}: {source}", path = .socket.display())]
    ReadBody {
        socket: PathBuf,
        source: hyper::Error,
    },

    #[error("request to socket {path} failed with status {status}: {body}", path = .socket.display())]
    Status {
        socket: PathBuf,
        status: u16,
        body: String,
    },

    #[error(
        "failed to decode response from socket {path}: {source}. Body: {body}",
        path = .socket.display()
    )]
    Decode {
        socket: PathBuf,
        source: serde_json::Error,
        body: String,
    },
}

impl AttemptError {
    /// The socket this attempt was made against.
    pub fn socket(&self) -> &Path {
        match self {
            Self::Connect { socket, .. }
            | Self::Request { socket, .. }
            | Self::ReadBody { socket, .. }
            | Self::Status { socket, .. }
            | Self::Decode { socket, .. } => socket.as_path(),
        }
    }
}

/// Aborts the connection task when the attempt ends, closing the stream on
/// every exit path.
struct ConnectionTask(JoinHandle<()>);

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Perform one exchange: send `envelope` to `socket` and decode the reply.
///
/// Succeeds only on `200 OK` with a body that is a JSON string literal; the
/// decoded string's bytes are returned.
pub async fn exchange(
    connector: &dyn Connector,
    socket: &Path,
    envelope: Bytes,
) -> Result<Vec<u8>, AttemptError> {
    let request_err = |source| AttemptError::Request {
        socket: socket.to_path_buf(),
        source,
    };

    let stream = connector
        .connect(socket)
        .await
        .map_err(|source| AttemptError::Connect {
            socket: socket.to_path_buf(),
            source,
        })?;

    let (mut sender, conn) =
        hyper::client::conn::http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream))
            .await
            .map_err(request_err)?;

    let label = socket.display().to_string();
    let _task = ConnectionTask(tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(socket = %label, error = %e, "connection closed with error");
        }
    }));

    let mut request = hyper::Request::new(Full::new(envelope));
    *request.method_mut() = Method::PUT;
    *request.uri_mut() = Uri::from_static(REQUEST_PATH);
    let headers = request.headers_mut();
    headers.insert(header::HOST, HeaderValue::from_static(REQUEST_HOST));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    let response = sender.send_request(request).await.map_err(request_err)?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|source| AttemptError::ReadBody {
            socket: socket.to_path_buf(),
            source,
        })?
        .to_bytes();

    debug!(socket = %socket.display(), status = status.as_u16(), bytes = body.len(), "attempt response");

    if status != StatusCode::OK {
        return Err(AttemptError::Status {
            socket: socket.to_path_buf(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    let decoded: String =
        serde_json::from_slice(&body).map_err(|source| AttemptError::Decode {
            socket: socket.to_path_buf(),
            source,
            body: String::from_utf8_lossy(&body).into_owned(),
        })?;

    Ok(decoded.into_bytes())
}
