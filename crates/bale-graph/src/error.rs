use thiserror::Error;

use crate::dependency_chain::DependencyChain;
use crate::module_id::ModuleId;

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised while resolving, analyzing, ordering or linking modules.
///
/// Errors are `Clone` because a failed analysis is cached alongside successful
/// ones: every target that reaches the same broken module sees the same error
/// without re-reading the file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Failed to resolve '{specifier}'{}: {reason}", importer_suffix(.importer))]
    UnresolvedImport {
        specifier: String,
        importer: Option<ModuleId>,
        reason: String,
        chain: DependencyChain,
    },

    #[error("Failed to parse '{module}': {}", .messages.join("; "))]
    ParseFailure {
        module: ModuleId,
        messages: Vec<String>,
        chain: DependencyChain,
    },

    #[error("Failed to read '{module}': {message}")]
    ReadFailure {
        module: ModuleId,
        message: String,
        chain: DependencyChain,
    },

    #[error("'{importer}' imports '{name}' from '{module}', which does not export it")]
    MissingExport {
        module: ModuleId,
        name: String,
        importer: ModuleId,
    },

    #[error("Cyclic modules could not be ordered: {}", format_modules(.modules))]
    CycleDeadlock { modules: Vec<ModuleId> },

    #[error("Build cancelled")]
    Cancelled,
}

impl GraphError {
    /// Attach the import chain leading to the failing module.
    pub fn with_chain(mut self, new_chain: DependencyChain) -> Self {
        match &mut self {
            Self::UnresolvedImport { chain, .. }
            | Self::ParseFailure { chain, .. }
            | Self::ReadFailure { chain, .. } => *chain = new_chain,
            Self::MissingExport { .. } | Self::CycleDeadlock { .. } | Self::Cancelled => {}
        }
        self
    }

    /// Import chain from an entry to the failing module, when known.
    pub fn chain(&self) -> Option<&DependencyChain> {
        match self {
            Self::UnresolvedImport { chain, .. }
            | Self::ParseFailure { chain, .. }
            | Self::ReadFailure { chain, .. } => Some(chain),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn importer_suffix(importer: &Option<ModuleId>) -> String {
    match importer {
        Some(importer) => format!(" from '{importer}'"),
        None => String::new(),
    }
}

fn format_modules(modules: &[ModuleId]) -> String {
    modules
        .iter()
        .map(ModuleId::path_string)
        .collect::<Vec<_>>()
        .join(", ")
}
