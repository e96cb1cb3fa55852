//! Shared test utilities for bale-graph integration tests.

#![allow(dead_code)]

use bale_graph::{
    BuildCache, CancellationToken, ExternalPolicy, GraphBuilder, GraphResult, ModuleGraph,
    ModuleResolver, NativeRuntime, ResolveOptions,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Write `files` (path, content) under a fresh temporary directory.
pub fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    for (path, content) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(&full, content).expect("write fixture");
    }
    dir
}

/// Resolver and cache shared by every graph of one simulated build.
pub struct Session {
    pub resolver: Arc<ModuleResolver>,
    pub cache: Arc<BuildCache>,
    pub runtime: Arc<NativeRuntime>,
}

impl Session {
    pub fn new(root: &Path) -> Self {
        let runtime = Arc::new(NativeRuntime::new(root));
        Self {
            resolver: Arc::new(ModuleResolver::new(ResolveOptions::new(root), runtime.clone())),
            cache: Arc::new(BuildCache::new()),
            runtime,
        }
    }

    pub async fn graph(
        &self,
        entry: &str,
        policy: ExternalPolicy,
        conditions: &[&str],
    ) -> GraphResult<ModuleGraph> {
        GraphBuilder::new(self.resolver.clone(), self.cache.clone(), self.runtime.clone())
            .external_policy(policy)
            .conditions(conditions.iter().map(|c| c.to_string()).collect())
            .build(&[entry.into()], &CancellationToken::new())
            .await
    }
}
