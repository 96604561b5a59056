//! Fallback file transport
//!
//! Moves files against a task's storage resource directly, without the live
//! agent. Used while the agent is not reachable.

mod mounted;

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Error, Result};

pub use mounted::MountedStorage;

/// Batch file operations against `(storage_host, path)` locations
#[async_trait]
pub trait FileTransport: Send + Sync {
    /// Create a directory (and parents) on the storage host
    async fn make_dir(&self, storage_host: &str, remote_dir: &str) -> Result<()>;

    /// Upload a local file into `remote_dir`, returning the remote path
    async fn upload(&self, storage_host: &str, local_file: &Path, remote_dir: &str) -> Result<String>;

    /// Names of the entries directly inside `remote_dir`
    async fn list(&self, storage_host: &str, remote_dir: &str) -> Result<Vec<String>>;

    /// Download `remote_dir/file_name` into `local_dir`, returning the local path
    async fn download(
        &self,
        storage_host: &str,
        remote_dir: &str,
        file_name: &str,
        local_dir: &Path,
    ) -> Result<PathBuf>;

    /// Raw bytes of `remote_dir/file_name`
    async fn cat(&self, storage_host: &str, remote_dir: &str, file_name: &str) -> Result<Vec<u8>>;
}

/// `dir/name` when `name` is a single plain path segment
///
/// Names come from plan documents and remote listings, so anything that
/// would land outside `dir` is refused.
pub fn local_entry(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(segment)), None) => Ok(dir.join(segment)),
        _ => Err(Error::NotSupported(format!(
            "'{}' does not name an entry inside {}",
            name,
            dir.display()
        ))),
    }
}
