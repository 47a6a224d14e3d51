#![deny(unsafe_code)]

//! Shared test utilities for the SockRelay workspace.
//!
//! Provides fake instances, in-memory and on-disk socket fixtures, config
//! builders, and tracing helpers so that individual crate tests stay concise
//! and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! sockrelay-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod connector;
pub mod instance;
pub mod socket_tree;
pub mod tracing_setup;

pub use connector::RouterConnector;
pub use socket_tree::SocketTree;
