//! Filesystem-backed runtime.

use async_trait::async_trait;
use path_clean::PathClean;
use std::path::{Path, PathBuf};

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

/// Runtime that reads from the local filesystem.
///
/// Relative paths are resolved against `cwd`.
#[derive(Debug, Clone)]
pub struct NativeRuntime {
    cwd: PathBuf,
}

impl NativeRuntime {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path).clean()
        }
    }
}

#[async_trait]
impl Runtime for NativeRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = self.resolve_path(path);
        tokio::task::spawn_blocking(move || {
            std::fs::read(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::FileNotFound(path.clone())
                } else {
                    RuntimeError::Io(format!("Failed to read {}: {}", path.display(), e))
                }
            })
        })
        .await
        .map_err(|e| RuntimeError::Other(format!("Task join error: {}", e)))?
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let path = self.resolve_path(path);
        tokio::task::spawn_blocking(move || {
            let meta = std::fs::metadata(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RuntimeError::FileNotFound(path.clone())
                } else {
                    RuntimeError::Io(format!("Failed to stat {}: {}", path.display(), e))
                }
            })?;
            Ok(FileMetadata {
                size: meta.len(),
                is_dir: meta.is_dir(),
                is_file: meta.is_file(),
            })
        })
        .await
        .map_err(|e| RuntimeError::Other(format!("Task join error: {}", e)))?
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_relative_to_cwd() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/a.js"), "export const a = 1;").unwrap();

        let runtime = NativeRuntime::new(temp.path());
        let bytes = runtime.read_file(Path::new("src/a.js")).await.unwrap();

        assert_eq!(bytes, b"export const a = 1;");
        assert!(runtime.is_file(Path::new("src/a.js")).await);
        assert!(!runtime.is_file(Path::new("src")).await);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp = TempDir::new().unwrap();
        let runtime = NativeRuntime::new(temp.path());

        let err = runtime.read_file(Path::new("nope.js")).await.unwrap_err();
        assert!(matches!(err, RuntimeError::FileNotFound(_)));
    }
}
