//! In-memory snapshot runtime.
//!
//! Holds an immutable map of file paths to contents. Directories are implied
//! by the files beneath them. Used to build from a fixed snapshot (and by the
//! test suites, which also use it to count reads).

use async_trait::async_trait;
use dashmap::DashMap;
use path_clean::PathClean;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

#[derive(Debug, Clone)]
pub struct MemoryRuntime {
    root: PathBuf,
    files: Arc<FxHashMap<PathBuf, Arc<[u8]>>>,
    reads: Arc<DashMap<PathBuf, usize>>,
}

impl MemoryRuntime {
    /// Create an empty snapshot rooted at `root`. Relative paths given to the
    /// builder methods and to reads are resolved against it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        Self {
            root: root.clean(),
            files: Arc::new(FxHashMap::default()),
            reads: Arc::new(DashMap::new()),
        }
    }

    /// Add a file to the snapshot.
    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl AsRef<[u8]>) -> Self {
        let path = self.normalize(path.as_ref());
        Arc::make_mut(&mut self.files).insert(path, Arc::from(content.as_ref()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// How many times `path` was read through this runtime.
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        let path = self.normalize(path.as_ref());
        self.reads.get(&path).map(|count| *count).unwrap_or(0)
    }

    fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.clean()
        } else {
            self.root.join(path).clean()
        }
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        let path = self.normalize(path);
        match self.files.get(&path) {
            Some(content) => {
                *self.reads.entry(path).or_insert(0) += 1;
                Ok(content.to_vec())
            }
            None if self.is_dir(&path) => Err(RuntimeError::Io(format!(
                "{} is a directory",
                path.display()
            ))),
            None => Err(RuntimeError::FileNotFound(path)),
        }
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        let path = self.normalize(path);
        if let Some(content) = self.files.get(&path) {
            return Ok(FileMetadata {
                size: content.len() as u64,
                is_dir: false,
                is_file: true,
            });
        }
        if self.is_dir(&path) {
            return Ok(FileMetadata {
                size: 0,
                is_dir: true,
                is_file: false,
            });
        }
        Err(RuntimeError::FileNotFound(path))
    }

    fn exists(&self, path: &Path) -> bool {
        let path = self.normalize(path);
        self.files.contains_key(&path) || self.is_dir(&path)
    }
}
