//! # bale-graph
//!
//! Module resolution, per-module analysis, dependency graphs and tree-shaking
//! for the bale build engine.
//!
//! ## Overview
//!
//! `bale-graph` turns a set of entry points into a [`ModuleGraph`]:
//!
//! - **Resolution**: [`ModuleResolver`] maps import specifiers to [`ModuleId`]s
//!   (relative paths, aliases, extension inference, index files, packages)
//! - **Analysis**: [`analysis::analyze_module`] parses a module once and records
//!   its imports, exports, top-level bindings and statement side effects
//! - **Caching**: [`BuildCache`] guarantees every module identity is read and
//!   analyzed at most once per build, even when targets race for it
//! - **Graphs**: [`GraphBuilder`] walks the import graph breadth-first and
//!   [`ModuleGraph`] orders it deterministically, condensing cycles
//! - **Linking and shaking**: [`linker`] resolves exports through re-export
//!   chains and [`TreeShaker`] marks the statements a bundle has to keep
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   specifiers   ┌──────────────┐
//! │ GraphBuilder │ ─────────────▶ │ModuleResolver│
//! └──────┬───────┘                └──────────────┘
//!        │ ModuleId
//!        ▼
//! ┌──────────────┐   at most once ┌──────────────┐
//! │  BuildCache  │ ─────────────▶ │analyze_module│
//! └──────┬───────┘                └──────────────┘
//!        │ Arc<ModuleRecord>
//!        ▼
//! ┌──────────────┐                ┌──────────────┐
//! │ ModuleGraph  │ ─────────────▶ │  TreeShaker  │
//! │ (SCC order)  │                │  (linker)    │
//! └──────────────┘                └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bale_graph::{BuildCache, CancellationToken, ExternalPolicy, GraphBuilder, MemoryRuntime,
//!     ModuleResolver, ResolveOptions};
//!
//! # async fn example() -> Result<(), bale_graph::GraphError> {
//! let runtime = Arc::new(
//!     MemoryRuntime::new("/app")
//!         .with_file("src/index.js", "import { x } from './x.js'; console.log(x);")
//!         .with_file("src/x.js", "export const x = 1;"),
//! );
//! let resolver = Arc::new(ModuleResolver::new(ResolveOptions::new("/app"), runtime.clone()));
//! let cache = Arc::new(BuildCache::new());
//!
//! let graph = GraphBuilder::new(resolver, cache, runtime)
//!     .external_policy(ExternalPolicy::Exclude)
//!     .build(&["src/index.js".into()], &CancellationToken::new())
//!     .await?;
//!
//! for id in graph.evaluation_order() {
//!     println!("{id}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod builder;
pub mod cache;
pub mod cancel;
pub mod dependency_chain;
pub mod error;
pub mod graph;
pub mod linker;
pub mod module_id;
pub mod order;
pub mod resolver;
pub mod runtime;
pub mod shaker;
pub mod sourcemap;

pub use analysis::{
    BindingIdx, BindingOrigin, DefaultExportKind, ExportRecord, ImportRecord, ImportedName,
    LocalBinding, ModuleRecord, ReferenceEdit, ReferenceSite, StatementKind, StatementRecord,
    analyze_declaration, analyze_module,
};
pub use builder::{ExternalPolicy, GraphBuilder};
pub use cache::{BuildCache, ContentHash};
pub use cancel::CancellationToken;
pub use dependency_chain::DependencyChain;
pub use error::{GraphError, GraphResult};
pub use graph::{EdgeFilter, GraphEdge, GraphNode, ModuleGraph};
pub use linker::{
    ExportTable, ModuleSet, ResolvedExport, export_table, resolve_binding, resolve_export,
    resolve_import,
};
pub use module_id::{ModuleId, SourceKind};
pub use resolver::{ModuleResolver, Resolution, ResolveOptions};
pub use shaker::{ShakeResult, TreeShaker};
pub use sourcemap::{LineIndex, Mapping, SourceEntry, TokenMap};

// Re-export runtime types
pub use runtime::memory::MemoryRuntime;
pub use runtime::native::NativeRuntime;
pub use runtime::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

// Re-export OXC foundation types for consistent version usage across workspace
pub mod oxc {
    //! OXC foundation types re-exported for workspace consistency.
    //!
    //! The bundler crate reaches the parser, codegen, minifier and declaration
    //! emitter through this module so every crate shares one OXC version.

    /// Arena allocator for AST nodes
    pub use oxc_allocator::Allocator;

    /// Span types for source location tracking
    pub use oxc_span::{GetSpan, SourceType, Span};

    /// AST node types
    pub use oxc_ast::ast;

    /// AST visitor trait
    pub use oxc_ast_visit::Visit;

    /// JavaScript/TypeScript parser
    pub use oxc_parser::{Parser, ParserReturn};

    /// Semantic analysis (scopes, symbols, references)
    pub use oxc_semantic::{Semantic, SemanticBuilder, SemanticBuilderReturn, SymbolFlags};

    /// Code generator (AST to string)
    pub use oxc_codegen::{Codegen, CodegenOptions, CodegenReturn};

    /// JavaScript minifier
    pub use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};

    /// Isolated declarations (.d.ts generation)
    pub use oxc_isolated_declarations::{IsolatedDeclarations, IsolatedDeclarationsOptions};

    /// Source map builder and parsed maps
    pub use oxc_sourcemap::{SourceMap, SourceMapBuilder};
}
