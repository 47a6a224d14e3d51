#![deny(unsafe_code)]

//! SockRelay core client library.
//!
//! Forwards requests to one of several equivalent local instances that are
//! reachable only through Unix domain sockets laid out as
//! `<root>/<instance-id>/<socket-name>`. Instances are discovered on demand,
//! kept in a deduplicated registry, and tried in round-robin order with
//! failover to the next instance whenever an attempt fails.
//!
//! ```no_run
//! use sockrelay_core::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::with_defaults();
//! client.refresh().await?;
//!
//! let body = serde_json::json!({ "key": "value" });
//! let bytes = client
//!     .execute_authorized_request("https://example.com/api", &body)
//!     .await?;
//! # let _ = bytes;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future used by object-safe async traits
/// such as [`transport::Connector`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The client handle: refresh and dispatch.
pub mod client;
/// Filesystem scan for instance sockets.
pub mod discovery;
/// JSON request envelope sent to every instance.
pub mod envelope;
/// Deduplicated, insertion-ordered socket list.
pub mod registry;
/// Round-robin cursor and failover order.
pub mod rotation;
/// Single request/response attempt over one socket.
pub mod transport;

pub use client::{Client, DispatchError};
pub use discovery::{DiscoveryError, discover_sockets};
pub use envelope::Envelope;
pub use registry::SocketRegistry;
pub use rotation::{Rotation, RotationCursor};
pub use transport::{AttemptError, BoxConnection, Connection, Connector, UnixConnector};
