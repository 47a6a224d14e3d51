//! On-disk socket layout for end-to-end tests.
//!
//! [`SocketTree`] owns a temporary sockets root and creates instance
//! subdirectories inside it: live instances served by `axum::serve` on a
//! real Unix socket, dead sockets nobody accepts on, and decoy files.

use std::path::{Path, PathBuf};

use axum::Router;
use tempfile::TempDir;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

/// Socket file name used unless [`SocketTree::with_socket_name`] is called.
pub const TEST_SOCKET_NAME: &str = "idproxy.sock";

/// A temporary `<root>/<instance-id>/<socket-name>` layout.
///
/// Servers are aborted and the directory is deleted when this value is
/// dropped.
pub struct SocketTree {
    root: TempDir,
    socket_name: String,
    servers: Vec<JoinHandle<()>>,
}

impl SocketTree {
    pub fn new() -> Self {
        Self::with_socket_name(TEST_SOCKET_NAME)
    }

    pub fn with_socket_name(name: &str) -> Self {
        Self {
            root: TempDir::new().expect("failed to create sockets root"),
            socket_name: name.to_string(),
            servers: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn socket_name(&self) -> &str {
        &self.socket_name
    }

    /// Path the socket of instance `id` lives at.
    pub fn socket_path(&self, id: &str) -> PathBuf {
        self.root().join(id).join(&self.socket_name)
    }

    /// Start a live instance serving `router`. Must be called inside a tokio
    /// runtime.
    pub fn add_instance(&mut self, id: &str, router: Router) -> PathBuf {
        let path = self.prepare(id);
        let listener = UnixListener::bind(&path).expect("failed to bind instance socket");
        self.servers.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::debug!(error = %e, "fake instance server stopped");
            }
        }));
        path
    }

    /// Leave a socket file behind with nothing accepting on it.
    pub fn add_dead_socket(&mut self, id: &str) -> PathBuf {
        let path = self.prepare(id);
        let listener =
            std::os::unix::net::UnixListener::bind(&path).expect("failed to bind dead socket");
        drop(listener);
        path
    }

    /// Put a regular file where the socket of instance `id` would be.
    pub fn add_plain_file(&mut self, id: &str) -> PathBuf {
        let path = self.prepare(id);
        std::fs::write(&path, b"not a socket").expect("failed to write decoy file");
        path
    }

    fn prepare(&self, id: &str) -> PathBuf {
        let dir = self.root().join(id);
        std::fs::create_dir_all(&dir).expect("failed to create instance directory");
        dir.join(&self.socket_name)
    }
}

impl Default for SocketTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SocketTree {
    fn drop(&mut self) {
        for server in &self.servers {
            server.abort();
        }
    }
}
