#![cfg_attr(docsrs, feature(doc_cfg))]

//! # bale-bundler
//!
//! Multi-target build engine on top of the `bale-graph` foundation.
//!
//! One [`BuildPlan`] lists several [`Target`]s over the same source tree. The
//! [`Bundler`] builds every target's dependency graph against one shared
//! module cache (each module is read and analyzed at most once per build),
//! then generates each target in a bounded worker pool:
//!
//! - **Separate ESM / CJS** library targets emit one module per source module
//!   and optionally one declaration document, shared between library targets
//!   with the same entries.
//! - **Bundle** targets concatenate every reachable module into one file,
//!   tree-shaken and collision-free, exposed as an ES module or, for browser
//!   targets, as a single global.
//!
//! Output passes through an ordered transform pipeline (wrap, minify, source
//! maps). Failures are collected per target; one failing target never stops
//! its siblings.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use bale_bundler::{BuildPlan, Bundler, CancellationToken, NativeRuntime, Target};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let plan = BuildPlan::new("/project")
//!     .target(Target::esm("esm").entry("src/index.ts").declarations(true))
//!     .target(Target::cjs("cjs").entry("src/index.ts").declarations(true))
//!     .target(Target::bundle("browser").entry("src/index.ts").global_name("MyLib"));
//!
//! let bundler = Bundler::new(Arc::new(NativeRuntime::new("/project")));
//! let report = bundler.build(&plan, &CancellationToken::new()).await?;
//!
//! for target in &report.targets {
//!     for artifact in &target.artifacts {
//!         println!("{}", artifact.path.display());
//!     }
//! }
//! if !report.is_success() {
//!     eprintln!("{}", report.summary());
//! }
//! # Ok(()) }
//! ```

// Re-export everything from the foundation crate
pub use bale_graph::*;

pub mod artifact;
pub mod codegen;
pub mod declarations;
pub mod diagnostics;
pub mod minify;
pub mod orchestrator;
pub mod plan;
pub mod target;
pub mod transform;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use artifact::{Artifact, ArtifactKind, SourceMapFile};
pub use codegen::{BundleExport, BundleInterface, ExportValue, ExternalModule, GeneratedUnit};
pub use declarations::{DeclarationCache, DeclarationResult};
pub use diagnostics::{BuildError, ErrorClass};
pub use minify::MinifyLevel;
pub use orchestrator::{BuildReport, BuildStats, Bundler, TargetReport};
pub use plan::BuildPlan;
pub use target::{ExportConditions, OutputFormat, Platform, Target};
pub use transform::{Pipeline, Stage};

/// Error types for bale-bundler operations.
///
/// These abort a whole build. Failures scoped to one target are
/// [`BuildError`]s collected in that target's report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The build plan cannot be executed.
    #[error("Invalid build plan: {0}")]
    InvalidPlan(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A build-wide graph failure (no evaluation order exists).
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// The build was cancelled; no artifacts were published.
    #[error("Build cancelled")]
    Cancelled,

    /// A worker task failed to complete.
    #[error("Build task failed: {0}")]
    Task(String),
}

/// Result type alias for bale-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::InvalidPlan(_) => "INVALID_PLAN",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Graph(GraphError::CycleDeadlock { .. }) => "CYCLE_DEADLOCK",
            Error::Graph(_) => "GRAPH_ERROR",
            Error::Cancelled => "CANCELLED",
            Error::Task(_) => "TASK_FAILURE",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::InvalidPlan(msg) => Some(Box::new(format!(
                "Check the target list handed to the bundler.\nError: {}",
                msg
            ))),
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your configuration values.\nError: {}",
                msg
            ))),
            Error::Graph(GraphError::CycleDeadlock { .. }) => Some(Box::new(
                "No evaluation order could be produced for a module cycle. This is a bug; please report it.",
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic;

    #[test]
    fn test_error_codes() {
        let err = Error::InvalidPlan("no targets".into());
        assert_eq!(err.code().unwrap().to_string(), "INVALID_PLAN");
        assert!(err.to_string().contains("no targets"));

        let err = Error::from(GraphError::CycleDeadlock {
            modules: vec![ModuleId::file("/app/a.js")],
        });
        assert_eq!(err.code().unwrap().to_string(), "CYCLE_DEADLOCK");
        assert!(err.help().is_some());

        assert_eq!(Error::Cancelled.code().unwrap().to_string(), "CANCELLED");
    }
}
