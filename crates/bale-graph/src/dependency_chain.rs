//! Import chains from an entry point to a module.
//!
//! Chains explain why a module is part of a target: diagnostics attach the
//! chain leading to the module that failed to resolve or parse.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::ModuleId;

/// A chain of imports from an entry point to a target module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyChain {
    /// Module identities from entry to target.
    pub path: Vec<ModuleId>,
}

impl DependencyChain {
    pub fn new(path: Vec<ModuleId>) -> Self {
        Self { path }
    }

    /// Number of import hops (path length - 1).
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// The entry point (first module in the chain).
    pub fn entry_point(&self) -> Option<&ModuleId> {
        self.path.first()
    }

    /// The target (last module in the chain).
    pub fn target(&self) -> Option<&ModuleId> {
        self.path.last()
    }

    /// Extend the chain by one hop.
    pub fn then(&self, next: ModuleId) -> Self {
        let mut path = self.path.clone();
        path.push(next);
        Self { path }
    }

    /// Check if this chain contains a cycle (same module appears twice).
    pub fn has_cycle(&self) -> bool {
        let mut seen = FxHashSet::default();
        self.path.iter().any(|module| !seen.insert(module))
    }

    /// Format the chain as a human-readable string.
    ///
    /// Example: "entry.js -> utils.js -> helper.js"
    pub fn format_chain(&self) -> String {
        self.path
            .iter()
            .map(|id| id.path_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl fmt::Display for DependencyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_chain())
    }
}
