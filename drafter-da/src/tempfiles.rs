//! Temp resource manager
//!
//! **[DA-TMP-010]** Scoped creation/deletion of transient upload storage.
//! A stored upload must be deleted exactly once regardless of whether the
//! owning task succeeded, failed, or timed out; release is idempotent,
//! attempted on every exit path, and its own failure is logged rather than
//! re-thrown so it can never mask the original outcome.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Manages per-upload transient storage under one root directory
#[derive(Debug, Clone)]
pub struct TempResourceManager {
    root: PathBuf,
}

/// Handle to one stored upload
#[derive(Debug, Clone)]
pub struct TempResource {
    /// Per-upload directory (removed on release)
    dir: PathBuf,
    /// Stored file path inside `dir`
    path: PathBuf,
}

impl TempResource {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TempResourceManager {
    /// Create a manager rooted at `root`, creating the directory if missing
    pub fn new(root: impl Into<PathBuf>) -> ApiResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store upload bytes under a fresh scoped directory
    ///
    /// The original file name is preserved (sanitized to its final path
    /// component) so extension-sensitive tooling sees the declared format.
    pub async fn store(&self, file_name: &str, bytes: &[u8]) -> ApiResult<TempResource> {
        let safe_name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid file name: {}", file_name)))?;

        let dir = self.root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(safe_name);
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Stored upload");
        Ok(TempResource { dir, path })
    }

    /// Release a stored upload
    ///
    /// Idempotent; failures are logged and swallowed so release can run on
    /// error paths without masking the original outcome.
    pub async fn release(&self, resource: &TempResource) {
        match tokio::fs::remove_dir_all(&resource.dir).await {
            Ok(()) => {
                tracing::debug!(dir = %resource.dir.display(), "Released temp resource");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    dir = %resource.dir.display(),
                    error = %e,
                    "Failed to release temp resource"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_release() {
        let root = tempfile::tempdir().unwrap();
        let manager = TempResourceManager::new(root.path().join("uploads")).unwrap();

        let resource = manager.store("plan.dxf", b"0\nSECTION\n").await.unwrap();
        assert!(resource.path().exists());
        assert_eq!(resource.path().file_name().unwrap(), "plan.dxf");

        manager.release(&resource).await;
        assert!(!resource.path().exists());

        // Double release is a no-op
        manager.release(&resource).await;
    }

    #[tokio::test]
    async fn test_path_traversal_is_stripped() {
        let root = tempfile::tempdir().unwrap();
        let manager = TempResourceManager::new(root.path().join("uploads")).unwrap();

        let resource = manager.store("../../etc/plan.dxf", b"data").await.unwrap();
        assert!(resource.path().starts_with(manager.root()));
        assert_eq!(resource.path().file_name().unwrap(), "plan.dxf");
        manager.release(&resource).await;
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let root = tempfile::tempdir().unwrap();
        let manager = TempResourceManager::new(root.path().join("uploads")).unwrap();
        let err = manager.store("", b"data").await.unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }
}
