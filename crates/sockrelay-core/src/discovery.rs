//! Socket discovery — scans the sockets root for instance sockets.
//!
//! Each instance owns one subdirectory of the root and exposes exactly one
//! socket file with a well-known name inside it. Only that single level of
//! nesting is recognized; files directly under the root are ignored.

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Errors from scanning the sockets root.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("failed to list socket root {path}: {source}", path = .root.display())]
    ReadRoot {
        root: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to list instance directory {path}: {source}", path = .dir.display())]
    ReadInstanceDir {
        dir: PathBuf,
        source: std::io::Error,
    },
}

/// Find every `<root>/<subdir>/<socket_name>` entry that is a Unix socket.
///
/// Fails fast: if any instance directory cannot be listed, the whole scan
/// fails and no partial results are returned. The order of the returned
/// paths follows the directory listing and is not guaranteed.
pub async fn discover_sockets(
    root: &Path,
    socket_name: &str,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let root_err = |source| DiscoveryError::ReadRoot {
        root: root.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(root).await.map_err(root_err)?;
    let mut sockets = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(root_err)? {
        let file_type = entry.file_type().await.map_err(root_err)?;
        if !file_type.is_dir() {
            continue;
        }
        scan_instance_dir(&entry.path(), socket_name, &mut sockets).await?;
    }

    debug!(root = %root.display(), found = sockets.len(), "socket discovery finished");
    Ok(sockets)
}

async fn scan_instance_dir(
    dir: &Path,
    socket_name: &str,
    sockets: &mut Vec<PathBuf>,
) -> Result<(), DiscoveryError> {
    let dir_err = |source| DiscoveryError::ReadInstanceDir {
        dir: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(dir_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(dir_err)? {
        if entry.file_name() != socket_name {
            continue;
        }
        let file_type = entry.file_type().await.map_err(dir_err)?;
        if !file_type.is_dir() && file_type.is_socket() {
            sockets.push(entry.path());
        }
    }
    Ok(())
}
