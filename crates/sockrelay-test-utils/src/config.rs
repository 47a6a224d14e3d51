//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::Path;

use sockrelay_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .sockets_root(tree.root())
///     .socket_name("api.sock")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn sockets_root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.discovery.sockets_root = root.as_ref().to_path_buf();
        self
    }

    pub fn socket_name(mut self, name: &str) -> Self {
        self.config.discovery.socket_name = name.to_string();
        self
    }

    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.transport.connect_timeout_ms = Some(ms);
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
