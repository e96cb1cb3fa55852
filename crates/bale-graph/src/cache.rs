//! Build-wide module cache.
//!
//! Every target of a build shares one [`BuildCache`]. The first task that needs
//! a module reads and analyzes it; concurrent requesters for the same
//! [`ModuleId`] await that single computation through a per-key
//! [`OnceCell`]. Failures are cached too, so a broken module is parsed once and
//! reported to every target that reaches it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::analysis::{ModuleRecord, analyze_module};
use crate::cancel::CancellationToken;
use crate::dependency_chain::DependencyChain;
use crate::error::{GraphError, GraphResult};
use crate::module_id::{ModuleId, SourceKind};
use crate::runtime::{Runtime, RuntimeError};

/// BLAKE3 digest of a module's source bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

type ModuleSlot = Arc<OnceCell<GraphResult<Arc<ModuleRecord>>>>;

/// Compute-once module records shared across targets.
#[derive(Debug, Default)]
pub struct BuildCache {
    modules: DashMap<ModuleId, ModuleSlot>,
    analyses: DashMap<ModuleId, usize>,
    total_analyses: AtomicUsize,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record for `id`, analyzing it on first request.
    ///
    /// A cancelled load leaves the slot empty; every other outcome, success or
    /// failure, is stored and returned to all later callers.
    pub async fn get_or_analyze(
        &self,
        id: &ModuleId,
        kind: SourceKind,
        runtime: &dyn Runtime,
        cancel: &CancellationToken,
    ) -> GraphResult<Arc<ModuleRecord>> {
        // The map guard must be released before awaiting the cell.
        let slot = self.modules.entry(id.clone()).or_default().clone();

        let outcome = slot
            .get_or_try_init(|| async {
                match self.load(id, kind, runtime, cancel).await {
                    Err(GraphError::Cancelled) => Err(GraphError::Cancelled),
                    other => Ok(other),
                }
            })
            .await?;
        outcome.clone()
    }

    /// The cached record for `id`, if it was analyzed successfully.
    pub fn get(&self, id: &ModuleId) -> Option<Arc<ModuleRecord>> {
        let slot = self.modules.get(id)?.clone();
        slot.get().and_then(|outcome| outcome.as_ref().ok().cloned())
    }

    /// Number of times `id` was analyzed in this build.
    pub fn analysis_count(&self, id: &ModuleId) -> usize {
        self.analyses.get(id).map(|count| *count).unwrap_or(0)
    }

    /// Number of analyses across all modules.
    pub fn total_analyses(&self) -> usize {
        self.total_analyses.load(Ordering::Relaxed)
    }

    /// Number of module identities with a settled outcome.
    pub fn len(&self) -> usize {
        self.modules
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn load(
        &self,
        id: &ModuleId,
        kind: SourceKind,
        runtime: &dyn Runtime,
        cancel: &CancellationToken,
    ) -> GraphResult<Arc<ModuleRecord>> {
        cancel.check()?;
        let Some(path) = id.path() else {
            return Err(GraphError::ReadFailure {
                module: id.clone(),
                message: "package references have no source".to_string(),
                chain: DependencyChain::default(),
            });
        };

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GraphError::Cancelled),
            read = runtime.read_file(path) => read.map_err(|err| read_failure(id, &err))?,
        };
        let source = String::from_utf8(bytes).map_err(|err| GraphError::ReadFailure {
            module: id.clone(),
            message: format!("source is not valid UTF-8: {err}"),
            chain: DependencyChain::default(),
        })?;

        *self.analyses.entry(id.clone()).or_insert(0) += 1;
        self.total_analyses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(module = %id, bytes = source.len(), "analyzing module");

        let owned_id = id.clone();
        let record = tokio::task::spawn_blocking(move || {
            analyze_module(owned_id, kind, Arc::from(source))
        })
        .await
        .map_err(|err| GraphError::ParseFailure {
            module: id.clone(),
            messages: vec![format!("analysis task failed: {err}")],
            chain: DependencyChain::default(),
        })??;

        cancel.check()?;
        Ok(Arc::new(record))
    }
}

fn read_failure(id: &ModuleId, err: &RuntimeError) -> GraphError {
    GraphError::ReadFailure {
        module: id.clone(),
        message: err.to_string(),
        chain: DependencyChain::default(),
    }
}
