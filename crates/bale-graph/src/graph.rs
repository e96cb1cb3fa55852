//! The per-target dependency graph.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::analysis::ModuleRecord;
use crate::dependency_chain::DependencyChain;
use crate::error::{GraphError, GraphResult};
use crate::module_id::{ModuleId, SourceKind};
use crate::order::{Components, evaluation_order};

/// Which import edges a traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFilter {
    /// Edges that survive into emitted JavaScript.
    Value,
    /// Value edges plus type-only edges (declaration emission).
    All,
}

impl EdgeFilter {
    fn admits(self, edge: &GraphEdge) -> bool {
        match self {
            Self::Value => !edge.type_only,
            Self::All => true,
        }
    }
}

/// One resolved import specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub specifier: String,
    pub target: ModuleId,
    pub type_only: bool,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: ModuleId,
    pub kind: SourceKind,
    /// `None` for package references left external.
    pub record: Option<Arc<ModuleRecord>>,
    /// Resolved imports in the module's import record order.
    pub edges: Vec<GraphEdge>,
    /// The module this one was first discovered from.
    pub parent: Option<ModuleId>,
}

impl GraphNode {
    pub fn is_external_reference(&self) -> bool {
        self.record.is_none()
    }

    pub fn edges(&self, filter: EdgeFilter) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |edge| filter.admits(edge))
    }
}

/// Modules reachable from a target's entries, in breadth-first discovery
/// order, with deterministic evaluation orders precomputed.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    nodes: IndexMap<ModuleId, GraphNode>,
    entries: Vec<ModuleId>,
    value_order: Vec<ModuleId>,
    full_order: Vec<ModuleId>,
    cycles: Vec<Vec<ModuleId>>,
}

impl ModuleGraph {
    /// Assemble a graph from discovered nodes.
    ///
    /// Fails with [`GraphError::CycleDeadlock`] when no total evaluation order
    /// can be produced.
    pub fn from_nodes(nodes: IndexMap<ModuleId, GraphNode>, entries: Vec<ModuleId>) -> GraphResult<Self> {
        let value_edges = dense_edges(&nodes, EdgeFilter::Value);
        let full_edges = dense_edges(&nodes, EdgeFilter::All);
        let roots: Vec<usize> = entries
            .iter()
            .filter_map(|entry| nodes.get_index_of(entry))
            .collect();

        let to_ids = |indices: Vec<usize>| -> Vec<ModuleId> {
            indices
                .into_iter()
                .filter_map(|index| nodes.get_index(index).map(|(id, _)| id.clone()))
                .collect()
        };
        let deadlock = |unordered: crate::order::Unordered| GraphError::CycleDeadlock {
            modules: to_ids(unordered.0),
        };

        let value_order = to_ids(evaluation_order(&value_edges, &roots).map_err(deadlock)?);
        let full_order = to_ids(evaluation_order(&full_edges, &roots).map_err(deadlock)?);
        let cycles: Vec<Vec<ModuleId>> = Components::compute(&value_edges)
            .cycles()
            .into_iter()
            .map(to_ids)
            .collect();

        if !cycles.is_empty() {
            tracing::debug!(count = cycles.len(), "import cycles scheduled by evaluation order");
        }

        Ok(Self {
            nodes,
            entries,
            value_order,
            full_order,
            cycles,
        })
    }

    pub fn entries(&self) -> &[ModuleId] {
        &self.entries
    }

    pub fn is_entry(&self, id: &ModuleId) -> bool {
        self.entries.contains(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &ModuleId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn record(&self, id: &ModuleId) -> Option<&Arc<ModuleRecord>> {
        self.nodes.get(id)?.record.as_ref()
    }

    /// The module `specifier` resolves to when imported from `importer`.
    pub fn import_target(&self, importer: &ModuleId, specifier: &str) -> Option<&ModuleId> {
        self.nodes
            .get(importer)?
            .edges
            .iter()
            .find(|edge| edge.specifier == specifier)
            .map(|edge| &edge.target)
    }

    /// Runtime evaluation order over value edges: dependencies first.
    pub fn evaluation_order(&self) -> &[ModuleId] {
        &self.value_order
    }

    pub fn order(&self, filter: EdgeFilter) -> &[ModuleId] {
        match filter {
            EdgeFilter::Value => &self.value_order,
            EdgeFilter::All => &self.full_order,
        }
    }

    /// Modules with a record that are reachable through `filter` edges, in
    /// evaluation order.
    pub fn modules(&self, filter: EdgeFilter) -> impl Iterator<Item = &Arc<ModuleRecord>> {
        self.order(filter).iter().filter_map(|id| self.record(id))
    }

    /// Package references left external, in discovery order.
    pub fn external_references(&self) -> impl Iterator<Item = &ModuleId> {
        self.nodes
            .values()
            .filter(|node| node.is_external_reference())
            .map(|node| &node.id)
    }

    /// Import cycles over value edges.
    pub fn cycles(&self) -> &[Vec<ModuleId>] {
        &self.cycles
    }

    /// The discovery chain from an entry to `id`.
    pub fn chain_to(&self, id: &ModuleId) -> DependencyChain {
        discovery_chain(&self.nodes, id)
    }

    /// Modules importing `id` through value edges.
    pub fn importers(&self, id: &ModuleId) -> Vec<&ModuleId> {
        self.nodes
            .values()
            .filter(|node| node.edges(EdgeFilter::Value).any(|edge| &edge.target == id))
            .map(|node| &node.id)
            .collect()
    }
}

/// Follow BFS parents from `id` back to the entry that discovered it.
pub(crate) fn discovery_chain(nodes: &IndexMap<ModuleId, GraphNode>, id: &ModuleId) -> DependencyChain {
    let mut path = vec![id.clone()];
    let mut current = id;
    while let Some(parent) = nodes.get(current).and_then(|node| node.parent.as_ref()) {
        if path.contains(parent) {
            break;
        }
        path.push(parent.clone());
        current = parent;
    }
    path.reverse();
    DependencyChain::new(path)
}

fn dense_edges(nodes: &IndexMap<ModuleId, GraphNode>, filter: EdgeFilter) -> Vec<Vec<usize>> {
    let index_of: FxHashMap<&ModuleId, usize> =
        nodes.keys().enumerate().map(|(index, id)| (id, index)).collect();
    nodes
        .values()
        .map(|node| {
            let mut deps: Vec<usize> = Vec::new();
            for edge in node.edges(filter) {
                if let Some(&target) = index_of.get(&edge.target) {
                    if !deps.contains(&target) {
                        deps.push(target);
                    }
                }
            }
            deps
        })
        .collect()
}
