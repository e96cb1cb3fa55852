//! Breadth-first graph construction.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::analysis::ModuleRecord;
use crate::cache::BuildCache;
use crate::cancel::CancellationToken;
use crate::error::{GraphError, GraphResult};
use crate::graph::{GraphEdge, GraphNode, ModuleGraph, discovery_chain};
use crate::module_id::{ModuleId, SourceKind};
use crate::resolver::{ModuleResolver, Resolution};
use crate::runtime::Runtime;

/// What happens to third-party packages a target imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExternalPolicy {
    /// Keep packages as runtime imports; they become leaf nodes.
    #[default]
    Exclude,
    /// Resolve packages to files and traverse them like source modules.
    Inline,
}

/// Builds the [`ModuleGraph`] of one target.
///
/// The builder is cheap to clone; resolver, cache and runtime are shared by
/// every target of a build.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    resolver: Arc<ModuleResolver>,
    cache: Arc<BuildCache>,
    runtime: Arc<dyn Runtime>,
    policy: ExternalPolicy,
    conditions: Vec<String>,
}

struct Pending {
    id: ModuleId,
    kind: SourceKind,
}

impl GraphBuilder {
    pub fn new(
        resolver: Arc<ModuleResolver>,
        cache: Arc<BuildCache>,
        runtime: Arc<dyn Runtime>,
    ) -> Self {
        Self {
            resolver,
            cache,
            runtime,
            policy: ExternalPolicy::Exclude,
            conditions: vec!["import".to_string(), "default".to_string()],
        }
    }

    pub fn external_policy(mut self, policy: ExternalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `package.json` export conditions, in priority order, used when
    /// packages are inlined.
    pub fn conditions(mut self, conditions: Vec<String>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Walk the import graph from `entries` (paths relative to the root).
    ///
    /// Modules are analyzed concurrently one breadth-first level at a time
    /// and linked in discovery order, so the resulting graph does not depend
    /// on task scheduling.
    pub async fn build(
        &self,
        entries: &[PathBuf],
        cancel: &CancellationToken,
    ) -> GraphResult<ModuleGraph> {
        let mut nodes: IndexMap<ModuleId, GraphNode> = IndexMap::new();
        let mut entry_ids: Vec<ModuleId> = Vec::new();
        let mut queue: VecDeque<Pending> = VecDeque::new();

        for entry in entries {
            let id = self.resolver.resolve_entry(entry).await?;
            if nodes.contains_key(&id) {
                continue;
            }
            entry_ids.push(id.clone());
            nodes.insert(id.clone(), placeholder(id.clone(), SourceKind::Internal, None));
            queue.push_back(Pending {
                id,
                kind: SourceKind::Internal,
            });
        }

        while !queue.is_empty() {
            cancel.check()?;
            let wave: Vec<Pending> = queue.drain(..).collect();
            let records = self.analyze_wave(&wave, cancel).await;

            for (pending, outcome) in wave.into_iter().zip(records) {
                let record = match outcome {
                    Ok(record) => record,
                    Err(err) if err.is_cancelled() => return Err(err),
                    Err(err) => return Err(err.with_chain(discovery_chain(&nodes, &pending.id))),
                };
                let edges = self.link(&record, &mut nodes, &mut queue).await?;
                if let Some(node) = nodes.get_mut(&pending.id) {
                    node.record = Some(record);
                    node.edges = edges;
                }
            }
        }

        let graph = ModuleGraph::from_nodes(nodes, entry_ids)?;
        tracing::debug!(
            modules = graph.len(),
            cycles = graph.cycles().len(),
            policy = ?self.policy,
            "module graph built"
        );
        Ok(graph)
    }

    async fn analyze_wave(
        &self,
        wave: &[Pending],
        cancel: &CancellationToken,
    ) -> Vec<GraphResult<Arc<ModuleRecord>>> {
        let mut tasks = JoinSet::new();
        for (index, pending) in wave.iter().enumerate() {
            let cache = Arc::clone(&self.cache);
            let runtime = Arc::clone(&self.runtime);
            let cancel = cancel.clone();
            let id = pending.id.clone();
            let kind = pending.kind;
            tasks.spawn(async move {
                let outcome = cache.get_or_analyze(&id, kind, runtime.as_ref(), &cancel).await;
                (index, outcome)
            });
        }

        let mut results: Vec<GraphResult<Arc<ModuleRecord>>> =
            (0..wave.len()).map(|_| Err(GraphError::Cancelled)).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => results[index] = outcome,
                Err(err) => tracing::warn!(error = %err, "module analysis task aborted"),
            }
        }
        results
    }

    /// Resolve the imports of `record`, registering newly discovered modules.
    async fn link(
        &self,
        record: &ModuleRecord,
        nodes: &mut IndexMap<ModuleId, GraphNode>,
        queue: &mut VecDeque<Pending>,
    ) -> GraphResult<Vec<GraphEdge>> {
        let importer = &record.id;
        let mut edges = Vec::with_capacity(record.imports.len());

        for import in &record.imports {
            let resolution = match self.resolver.resolve(&import.specifier, importer).await {
                Ok(resolution) => resolution,
                Err(err) if import.type_only => {
                    tracing::warn!(
                        specifier = %import.specifier,
                        importer = %importer,
                        error = %err,
                        "type-only import left unresolved"
                    );
                    continue;
                }
                Err(err) => return Err(err.with_chain(discovery_chain(nodes, importer))),
            };

            let (target, kind) = match resolution {
                Resolution::Module { id, kind } => (id, Some(kind)),
                Resolution::Builtin { specifier } => (ModuleId::package(specifier), None),
                Resolution::Package { specifier } => {
                    if self.policy == ExternalPolicy::Inline && !import.type_only {
                        let id = self
                            .resolver
                            .resolve_package(&specifier, importer, &self.conditions)
                            .await
                            .map_err(|err| err.with_chain(discovery_chain(nodes, importer)))?;
                        (id, Some(SourceKind::External))
                    } else {
                        (ModuleId::package(specifier), None)
                    }
                }
            };

            if !nodes.contains_key(&target) {
                let node_kind = kind.unwrap_or(SourceKind::External);
                nodes.insert(
                    target.clone(),
                    placeholder(target.clone(), node_kind, Some(importer.clone())),
                );
                if let Some(kind) = kind {
                    queue.push_back(Pending {
                        id: target.clone(),
                        kind,
                    });
                }
            }

            edges.push(GraphEdge {
                specifier: import.specifier.clone(),
                target,
                type_only: import.type_only,
            });
        }
        Ok(edges)
    }
}

fn placeholder(id: ModuleId, kind: SourceKind, parent: Option<ModuleId>) -> GraphNode {
    GraphNode {
        id,
        kind,
        record: None,
        edges: Vec::new(),
        parent,
    }
}
