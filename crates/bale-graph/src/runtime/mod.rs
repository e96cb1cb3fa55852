//! Platform runtime abstraction.
//!
//! The resolver and graph builder never touch the filesystem directly. They go
//! through the `Runtime` trait, so a build can run against the real disk
//! ([`native::NativeRuntime`]) or against an immutable in-memory snapshot
//! ([`memory::MemoryRuntime`]).

pub mod memory;
pub mod native;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Other runtime error
    #[error("Runtime error: {0}")]
    Other(String),
}

/// File metadata
#[derive(Debug, Clone, Copy)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Whether this is a file
    pub is_file: bool,
}

/// Platform runtime trait
///
/// Implementations must behave as a consistent snapshot for the duration of a
/// build: two reads of the same path return the same bytes.
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    /// Read a file
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Get file metadata
    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    /// Check if a path exists
    fn exists(&self, path: &Path) -> bool;

    /// Convenience wrapper over [`Runtime::metadata`] used by resolution probes.
    async fn is_file(&self, path: &Path) -> bool {
        self.metadata(path).await.map(|m| m.is_file).unwrap_or(false)
    }
}
