//! Per-target build errors.
//!
//! Every failure a target can hit is a [`BuildError`]. Errors are collected
//! per target instead of aborting the build; [`ErrorClass`] tells the
//! orchestrator and the reporting layer how far a failure reaches.

use std::fmt;

use bale_graph::{DependencyChain, GraphError, ModuleId};

/// Failure taxonomy shared by reports and diagnostics codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// A specifier, file or imported name could not be resolved.
    UnresolvedImport,
    /// A module's syntax was rejected.
    ParseFailure,
    /// Declaration synthesis could not determine a signature.
    TypeInferenceFailure,
    /// No evaluation order exists; fatal to the whole build.
    CycleDeadlock,
    /// Code generation or an output transform failed.
    GenerationFailure,
    Cancelled,
}

impl ErrorClass {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnresolvedImport => "UNRESOLVED_IMPORT",
            Self::ParseFailure => "PARSE_FAILURE",
            Self::TypeInferenceFailure => "TYPE_INFERENCE_FAILURE",
            Self::CycleDeadlock => "CYCLE_DEADLOCK",
            Self::GenerationFailure => "GENERATION_FAILURE",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether the failure stops value-level output for its target.
    ///
    /// Declaration failures only cost the target its declaration document.
    pub fn is_fatal_to_target(&self) -> bool {
        !matches!(self, Self::TypeInferenceFailure)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A failure reported for one target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// Resolution, parsing, linking or ordering failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Cannot synthesize declarations for '{module}': {}", .messages.join("; "))]
    TypeInference {
        module: ModuleId,
        messages: Vec<String>,
        chain: DependencyChain,
    },

    #[error("Failed to generate '{unit}': {message}")]
    Generation {
        unit: String,
        module: Option<ModuleId>,
        message: String,
    },
}

impl BuildError {
    pub fn generation(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            unit: unit.into(),
            module: None,
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Graph(err) => match err {
                GraphError::UnresolvedImport { .. }
                | GraphError::ReadFailure { .. }
                | GraphError::MissingExport { .. } => ErrorClass::UnresolvedImport,
                GraphError::ParseFailure { .. } => ErrorClass::ParseFailure,
                GraphError::CycleDeadlock { .. } => ErrorClass::CycleDeadlock,
                GraphError::Cancelled => ErrorClass::Cancelled,
            },
            Self::TypeInference { .. } => ErrorClass::TypeInferenceFailure,
            Self::Generation { .. } => ErrorClass::GenerationFailure,
        }
    }

    /// The module the failure is attributed to, when there is one.
    pub fn module(&self) -> Option<&ModuleId> {
        match self {
            Self::Graph(err) => match err {
                GraphError::UnresolvedImport { importer, .. } => importer.as_ref(),
                GraphError::ParseFailure { module, .. }
                | GraphError::ReadFailure { module, .. } => Some(module),
                GraphError::MissingExport { importer, .. } => Some(importer),
                GraphError::CycleDeadlock { modules } => modules.first(),
                GraphError::Cancelled => None,
            },
            Self::TypeInference { module, .. } => Some(module),
            Self::Generation { module, .. } => module.as_ref(),
        }
    }

    /// Import chain from an entry point to the failing module.
    pub fn chain(&self) -> Option<&DependencyChain> {
        match self {
            Self::Graph(err) => err.chain(),
            Self::TypeInference { chain, .. } => Some(chain),
            Self::Generation { .. } => None,
        }
        .filter(|chain| !chain.is_empty())
    }
}

impl miette::Diagnostic for BuildError {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new(self.class().code()))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        let chain = self.chain().map(|chain| format!("\nImport chain: {chain}"));
        let help = match self.class() {
            ErrorClass::UnresolvedImport => format!(
                "Check that the file exists, or mark the package external.{}",
                chain.unwrap_or_default()
            ),
            ErrorClass::ParseFailure => {
                format!("Fix the syntax error in the module.{}", chain.unwrap_or_default())
            }
            ErrorClass::TypeInferenceFailure => format!(
                "Add explicit type annotations to exported declarations.{}",
                chain.unwrap_or_default()
            ),
            ErrorClass::CycleDeadlock => {
                "This is a bug in the evaluation order. Please report it.".to_string()
            }
            ErrorClass::GenerationFailure | ErrorClass::Cancelled => return None,
        };
        Some(Box::new(help))
    }
}
