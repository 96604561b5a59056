//! Storage hosts reachable through a local mount point
//!
//! `<root>/<storage_host>/<remote path>` maps onto the shared filesystem the
//! compute resource writes its working directories to.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::error::{Error, Result};

use super::FileTransport;

/// [`FileTransport`] over locally mounted storage hosts
#[derive(Debug, Clone)]
pub struct MountedStorage {
    root: PathBuf,
}

impl MountedStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a remote location, refusing anything that leaves the mount
    fn resolve(&self, storage_host: &str, parts: &[&str]) -> Result<PathBuf> {
        let mut path = self.root.join(checked_segment(storage_host)?);
        for part in parts {
            for component in Path::new(part).components() {
                match component {
                    Component::Normal(name) => path.push(name),
                    Component::RootDir | Component::CurDir => {}
                    Component::ParentDir | Component::Prefix(_) => {
                        return Err(Error::NotSupported(format!(
                            "path '{}' escapes the storage mount",
                            part
                        )))
                    }
                }
            }
        }
        Ok(path)
    }
}

fn checked_segment(name: &str) -> Result<&str> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." || name == "." {
        return Err(Error::NotSupported(format!("invalid storage host '{}'", name)));
    }
    Ok(name)
}

fn file_name_of(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::NotSupported(format!("'{}' has no file name", path.display())))
}

#[async_trait]
impl FileTransport for MountedStorage {
    async fn make_dir(&self, storage_host: &str, remote_dir: &str) -> Result<()> {
        let dir = self.resolve(storage_host, &[remote_dir])?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::IoWrite { path: dir, source: e })
    }

    async fn upload(&self, storage_host: &str, local_file: &Path, remote_dir: &str) -> Result<String> {
        let name = file_name_of(local_file)?;
        let dir = self.resolve(storage_host, &[remote_dir])?;
        fs::create_dir_all(&dir).await.map_err(|e| Error::IoWrite {
            path: dir.clone(),
            source: e,
        })?;

        let target = dir.join(name);
        fs::copy(local_file, &target).await.map_err(|e| Error::IoRead {
            path: local_file.to_path_buf(),
            source: e,
        })?;
        debug!(host = %storage_host, target = %target.display(), "Uploaded through storage mount");

        Ok(format!("{}/{}", remote_dir.trim_end_matches('/'), name))
    }

    async fn list(&self, storage_host: &str, remote_dir: &str) -> Result<Vec<String>> {
        let dir = self.resolve(storage_host, &[remote_dir])?;
        let mut entries = fs::read_dir(&dir).await.map_err(|e| Error::IoRead {
            path: dir.clone(),
            source: e,
        })?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn download(
        &self,
        storage_host: &str,
        remote_dir: &str,
        file_name: &str,
        local_dir: &Path,
    ) -> Result<PathBuf> {
        let source = self.resolve(storage_host, &[remote_dir, file_name])?;
        let name = file_name_of(&source)?.to_string();
        fs::create_dir_all(local_dir).await.map_err(|e| Error::IoWrite {
            path: local_dir.to_path_buf(),
            source: e,
        })?;

        let target = local_dir.join(name);
        fs::copy(&source, &target).await.map_err(|e| Error::IoRead {
            path: source.clone(),
            source: e,
        })?;
        Ok(target)
    }

    async fn cat(&self, storage_host: &str, remote_dir: &str, file_name: &str) -> Result<Vec<u8>> {
        let source = self.resolve(storage_host, &[remote_dir, file_name])?;
        fs::read(&source).await.map_err(|e| Error::IoRead { path: source, source: e })
    }
}
