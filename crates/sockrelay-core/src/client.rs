//! Client handle — registry refresh and round-robin dispatch with failover.
//!
//! A [`Client`] is created once at startup and shared (typically behind an
//! [`Arc`]) by every caller. It owns:
//!
//! - the immutable discovery settings (sockets root, socket file name),
//! - the [`SocketRegistry`] of known instance sockets,
//! - the [`RotationCursor`] that spreads calls across instances,
//! - the [`Connector`] used to reach each socket.
//!
//! ## Dispatch
//!
//! ```text
//!             ┌────────────┐  next index   ┌────────────┐
//!   start ───▶│ SelectNext │──────────────▶│ Attempting │──── ok ───▶ Success
//!             └─────▲──────┘               └─────┬──────┘
//!                   │        attempt error       │
//!                   └────────────────────────────┘
//!             rotation exhausted ───▶ Exhausted (last error only)
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use sockrelay_config::{AppConfig, DEFAULT_SOCKET_NAME, DEFAULT_SOCKETS_ROOT};

use crate::discovery::{DiscoveryError, discover_sockets};
use crate::envelope::Envelope;
use crate::registry::SocketRegistry;
use crate::rotation::{Rotation, RotationCursor};
use crate::transport::{self, AttemptError, Connector, UnixConnector};

/// Errors returned by [`Client::execute_authorized_request`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no sockets available")]
    NoSockets,

    #[error("failed to marshal request envelope: {0}")]
    Marshal(#[source] serde_json::Error),

    /// Every known socket was tried; only the final attempt's error is kept.
    #[error("all instances failed. last error: {0}")]
    AllInstancesFailed(#[source] AttemptError),
}

/// Per-dispatch failover state.
enum AttemptState {
    SelectNext,
    Attempting(usize),
    Success(Vec<u8>),
    Exhausted,
}

/// Process-wide handle for reaching a pool of equivalent instances.
pub struct Client {
    sockets_root: PathBuf,
    socket_name: String,
    registry: SocketRegistry,
    cursor: RotationCursor,
    connector: Arc<dyn Connector>,
}

impl Client {
    /// Create a client that dials real Unix sockets.
    pub fn new(sockets_root: impl Into<PathBuf>, socket_name: impl Into<String>) -> Self {
        Self::with_connector(sockets_root, socket_name, Arc::new(UnixConnector::new()))
    }

    /// Create a client for `/tmp/idproxy_sockets/<id>/idproxy.sock`.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SOCKETS_ROOT, DEFAULT_SOCKET_NAME)
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        let connector = match config.transport.connect_timeout() {
            Some(timeout) => UnixConnector::with_connect_timeout(timeout),
            None => UnixConnector::new(),
        };
        Self::with_connector(
            config.discovery.sockets_root.clone(),
            &config.discovery.socket_name,
            Arc::new(connector),
        )
    }

    /// Create a client with a custom connector (e.g. an in-memory test double).
    pub fn with_connector(
        sockets_root: impl Into<PathBuf>,
        socket_name: impl Into<String>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            sockets_root: sockets_root.into(),
            socket_name: socket_name.into(),
            registry: SocketRegistry::new(),
            cursor: RotationCursor::new(),
            connector,
        }
    }

    pub fn sockets_root(&self) -> &Path {
        &self.sockets_root
    }

    pub fn socket_name(&self) -> &str {
        &self.socket_name
    }

    /// Snapshot of the known sockets in rotation order.
    pub fn sockets(&self) -> Vec<PathBuf> {
        self.registry.snapshot().to_vec()
    }

    /// Number of dispatch calls that have advanced the rotation so far.
    pub fn rotation_cursor(&self) -> u64 {
        self.cursor.current()
    }

    /// Scan the sockets root and merge any new sockets into the registry.
    ///
    /// Returns how many sockets were added. On error the registry is left
    /// untouched.
    pub async fn refresh(&self) -> Result<usize, DiscoveryError> {
        let found = discover_sockets(&self.sockets_root, &self.socket_name).await?;
        let added = self.add_sockets(found);
        debug!(
            root = %self.sockets_root.display(),
            added,
            known = self.registry.len(),
            "socket registry refreshed"
        );
        Ok(added)
    }

    /// Merge socket paths into the registry directly, skipping duplicates.
    pub fn add_sockets<I>(&self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.registry.merge(paths)
    }

    /// Send `payload` for `destination` to one instance, failing over across
    /// all known sockets.
    ///
    /// The registry must have been populated beforehand (see
    /// [`Client::refresh`]); an empty registry fails with
    /// [`DispatchError::NoSockets`] without touching the filesystem.
    pub async fn execute_authorized_request<T: Serialize>(
        &self,
        destination: &str,
        payload: &T,
    ) -> Result<Vec<u8>, DispatchError> {
        let sockets = self.registry.snapshot();
        if sockets.is_empty() {
            return Err(DispatchError::NoSockets);
        }

        let body = Envelope::new(destination, payload)
            .to_bytes()
            .map_err(DispatchError::Marshal)?;

        let mut rotation = Rotation::new(self.cursor.advance(), sockets.len());
        debug!(
            destination,
            sockets = sockets.len(),
            start = rotation.start(),
            "dispatching request"
        );

        let mut last_error = None;
        let mut state = AttemptState::SelectNext;
        loop {
            state = match state {
                AttemptState::SelectNext => match rotation.next() {
                    Some(index) => AttemptState::Attempting(index),
                    None => AttemptState::Exhausted,
                },
                AttemptState::Attempting(index) => {
                    let socket = &sockets[index];
                    match transport::exchange(self.connector.as_ref(), socket, body.clone()).await
                    {
                        Ok(bytes) => AttemptState::Success(bytes),
                        Err(e) => {
                            warn!(
                                socket = %socket.display(),
                                remaining = rotation.len(),
                                error = %e,
                                "instance attempt failed"
                            );
                            last_error = Some(e);
                            AttemptState::SelectNext
                        }
                    }
                }
                AttemptState::Success(bytes) => return Ok(bytes),
                AttemptState::Exhausted => {
                    return Err(match last_error {
                        Some(e) => DispatchError::AllInstancesFailed(e),
                        None => DispatchError::NoSockets,
                    });
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxFuture;
    use crate::transport::BoxConnection;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::os::unix::net::UnixListener;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Refuses every connection and records the order of attempts.
    #[derive(Default)]
    struct RefusingConnector {
        attempts: Mutex<Vec<PathBuf>>,
    }

    impl RefusingConnector {
        fn attempts(&self) -> Vec<PathBuf> {
            self.attempts.lock().unwrap().clone()
        }
    }

    impl Connector for RefusingConnector {
        fn connect<'a>(&'a self, socket: &'a Path) -> BoxFuture<'a, io::Result<BoxConnection>> {
            self.attempts.lock().unwrap().push(socket.to_path_buf());
            Box::pin(async {
                Err::<BoxConnection, _>(io::Error::from(io::ErrorKind::ConnectionRefused))
            })
        }
    }

    fn refusing_client() -> (Client, Arc<RefusingConnector>) {
        let connector = Arc::new(RefusingConnector::default());
        let client = Client::with_connector("/unused", "x.sock", connector.clone());
        (client, connector)
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_defaults() {
        let client = Client::with_defaults();
        assert_eq!(client.sockets_root(), Path::new("/tmp/idproxy_sockets"));
        assert_eq!(client.socket_name(), "idproxy.sock");
        assert!(client.sockets().is_empty());
        assert_eq!(client.rotation_cursor(), 0);
    }

    #[test]
    fn test_from_config() {
        let mut config = AppConfig::default();
        config.discovery.sockets_root = PathBuf::from("/srv/pool");
        config.discovery.socket_name = "api.sock".to_string();
        let client = Client::from_config(&config);
        assert_eq!(client.sockets_root(), Path::new("/srv/pool"));
        assert_eq!(client.socket_name(), "api.sock");
    }

    #[tokio::test]
    async fn test_empty_registry_fails_without_advancing() {
        let (client, connector) = refusing_client();
        let err = client
            .execute_authorized_request("http://x/", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoSockets));
        assert_eq!(err.to_string(), "no sockets available");
        assert_eq!(client.rotation_cursor(), 0);
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_marshal_error_is_not_retried() {
        use std::collections::HashMap;

        let (client, connector) = refusing_client();
        client.add_sockets(paths(&["/s/a", "/s/b"]));

        let mut payload = HashMap::new();
        payload.insert(vec![1u8], 1);
        let err = client
            .execute_authorized_request("http://x/", &payload)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Marshal(_)));
        assert!(connector.attempts().is_empty());
        assert_eq!(client.rotation_cursor(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_attempt_only() {
        let (client, connector) = refusing_client();
        client.add_sockets(paths(&["/s/a", "/s/b"]));

        // Cursor 0: a, then b.
        let err = client
            .execute_authorized_request("http://x/", &"p")
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("all instances failed. last error: failed to connect to socket /s/b:"));
        assert!(!text.contains("/s/a"));

        // Cursor 1: b, then a.
        let err = client
            .execute_authorized_request("http://x/", &"p")
            .await
            .unwrap_err();
        match err {
            DispatchError::AllInstancesFailed(last) => {
                assert_eq!(last.socket(), Path::new("/s/a"));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(connector.attempts(), paths(&["/s/a", "/s/b", "/s/b", "/s/a"]));
        assert_eq!(client.rotation_cursor(), 2);
    }

    #[tokio::test]
    async fn test_cursor_advances_once_per_call() {
        let (client, connector) = refusing_client();
        client.add_sockets(paths(&["/s/a", "/s/b", "/s/c"]));

        for _ in 0..4 {
            let _ = client.execute_authorized_request("http://x/", &1).await;
        }
        assert_eq!(client.rotation_cursor(), 4);
        // Starts rotate a, b, c, a.
        let starts: Vec<_> = connector.attempts().chunks(3).map(|c| c[0].clone()).collect();
        assert_eq!(starts, paths(&["/s/a", "/s/b", "/s/c", "/s/a"]));
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut listeners = Vec::new();
        for id in ["1", "2"] {
            let dir = tmp.path().join(id);
            std::fs::create_dir(&dir).unwrap();
            listeners.push(UnixListener::bind(dir.join("idproxy.sock")).unwrap());
        }

        let client = Client::new(tmp.path(), "idproxy.sock");
        assert_eq!(client.refresh().await.unwrap(), 2);
        let first = client.sockets();
        assert_eq!(client.refresh().await.unwrap(), 0);
        assert_eq!(client.sockets(), first);
    }

    #[tokio::test]
    async fn test_refresh_appends_new_instances() {
        let tmp = TempDir::new().unwrap();
        let first_dir = tmp.path().join("1");
        std::fs::create_dir(&first_dir).unwrap();
        let _l1 = UnixListener::bind(first_dir.join("idproxy.sock")).unwrap();

        let client = Client::new(tmp.path(), "idproxy.sock");
        client.refresh().await.unwrap();
        let before = client.sockets();

        let second_dir = tmp.path().join("2");
        std::fs::create_dir(&second_dir).unwrap();
        let _l2 = UnixListener::bind(second_dir.join("idproxy.sock")).unwrap();

        assert_eq!(client.refresh().await.unwrap(), 1);
        let after = client.sockets();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], second_dir.join("idproxy.sock"));
    }

    #[tokio::test]
    async fn test_refresh_never_shrinks() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("1");
        std::fs::create_dir(&dir).unwrap();
        let sock = dir.join("idproxy.sock");
        let listener = UnixListener::bind(&sock).unwrap();

        let client = Client::new(tmp.path(), "idproxy.sock");
        client.refresh().await.unwrap();

        drop(listener);
        std::fs::remove_file(&sock).unwrap();

        assert_eq!(client.refresh().await.unwrap(), 0);
        assert_eq!(client.sockets(), vec![sock]);
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_registry_untouched() {
        let tmp = TempDir::new().unwrap();
        let client = Client::new(tmp.path().join("missing"), "idproxy.sock");
        client.add_sockets(paths(&["/s/a"]));

        let err = client.refresh().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::ReadRoot { .. }));
        assert_eq!(client.sockets(), paths(&["/s/a"]));
    }

    #[tokio::test]
    async fn test_unreadable_instance_dir_keeps_known_sockets() {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("a");
        std::fs::create_dir(&first).unwrap();
        let _l1 = UnixListener::bind(first.join("idproxy.sock")).unwrap();

        let client = Client::new(tmp.path(), "idproxy.sock");
        assert_eq!(client.refresh().await.unwrap(), 1);
        let before = client.sockets();

        // A new readable instance plus one that cannot be listed.
        let second = tmp.path().join("b");
        std::fs::create_dir(&second).unwrap();
        let _l2 = UnixListener::bind(second.join("idproxy.sock")).unwrap();
        let locked = tmp.path().join("c");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, Permissions::from_mode(0o000)).unwrap();
        if std::fs::read_dir(&locked).is_ok() {
            std::fs::set_permissions(&locked, Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = client.refresh().await;
        std::fs::set_permissions(&locked, Permissions::from_mode(0o755)).unwrap();

        match result.unwrap_err() {
            DiscoveryError::ReadInstanceDir { dir, .. } => assert_eq!(dir, locked),
            other => panic!("expected instance dir error, got {other:?}"),
        }
        assert_eq!(client.sockets(), before);
    }
}
