//! Per-module analysis records.
//!
//! A [`ModuleRecord`] is the result of parsing a module exactly once. It is
//! immutable and shared (`Arc`) between every target that includes the
//! module; code generation works purely from the record and never re-parses.

use std::sync::Arc;

use oxc_span::Span;
use rustc_hash::FxHashSet;

use crate::cache::ContentHash;
use crate::module_id::{ModuleId, SourceKind};
use crate::sourcemap::{LineIndex, TokenMap};

/// Index into [`ModuleRecord::bindings`].
pub type BindingIdx = usize;

/// Which export of the imported module a binding refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImportedName {
    Default,
    Named(String),
    Namespace,
}

impl ImportedName {
    pub fn from_name(name: &str) -> Self {
        if name == "default" {
            Self::Default
        } else {
            Self::Named(name.to_string())
        }
    }

    /// Export name looked up in the target module (`None` for namespaces).
    pub fn export_name(&self) -> Option<&str> {
        match self {
            Self::Default => Some("default"),
            Self::Named(name) => Some(name),
            Self::Namespace => None,
        }
    }
}

/// One distinct import specifier of a module, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub specifier: String,
    /// Only referenced from type positions; erased from emitted JavaScript.
    pub type_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingOrigin {
    /// Declared by the top-level statement at this index.
    Declared { statement: usize },
    /// Bound by an import declaration.
    Import {
        record: usize,
        imported: ImportedName,
    },
}

/// A top-level binding of a module.
#[derive(Debug, Clone)]
pub struct LocalBinding {
    pub name: String,
    pub origin: BindingOrigin,
    /// Span of the declaring identifier (`None` for synthesized bindings).
    pub declaration: Option<Span>,
    /// Written to after declaration.
    pub reassigned: bool,
    /// Interfaces, type aliases and `import type` bindings.
    pub type_only: bool,
    /// Holds an anonymous default export; named after the module.
    pub synthetic: bool,
}

impl LocalBinding {
    pub fn is_import(&self) -> bool {
        matches!(self.origin, BindingOrigin::Import { .. })
    }
}

/// One export entry of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportRecord {
    /// `export const x`, `export { x as y }`, `export default f`.
    Local { exported: String, binding: BindingIdx },
    /// `export { x as y } from './m'`, `export * as ns from './m'`.
    ReExport {
        exported: String,
        record: usize,
        imported: ImportedName,
    },
    /// `export * from './m'`.
    Star { record: usize },
}

impl ExportRecord {
    pub fn exported_name(&self) -> Option<&str> {
        match self {
            Self::Local { exported, .. } | Self::ReExport { exported, .. } => Some(exported),
            Self::Star { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultExportKind {
    /// `export default function f() {}` / `export default class C {}`.
    Declaration,
    /// `export default function () {}` / `export default class {}`.
    Anonymous,
    /// `export default <expression>;`
    Expression,
    /// `export default x;` where `x` is never reassigned. Emits nothing.
    Alias,
}

/// Top-level statement shape, as far as emission cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Import { record: usize },
    /// `export ... from` and `export * from`.
    ReExport { record: usize },
    /// `export { a, b as c };`
    ExportList,
    /// `export <declaration>`; the declaration starts at `declaration_start`.
    ExportDeclaration { declaration_start: u32 },
    ExportDefault {
        kind: DefaultExportKind,
        body_start: u32,
    },
    Plain,
}

/// Syntactic position of an identifier that may need rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSite {
    Plain,
    /// `{ a }` in an object literal or pattern; renaming must expand it.
    Shorthand,
    /// Callee of a call expression (`a()`).
    Callee,
}

/// An occurrence of a top-level binding inside a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceEdit {
    pub span: Span,
    pub binding: BindingIdx,
    pub site: ReferenceSite,
    pub is_declaration: bool,
}

#[derive(Debug, Clone)]
pub struct StatementRecord {
    pub span: Span,
    pub kind: StatementKind,
    pub declares: Vec<BindingIdx>,
    /// Bindings read or written anywhere inside the statement, deduplicated.
    pub references: Vec<BindingIdx>,
    /// Identifier occurrences of top-level bindings, sorted by position.
    pub edits: Vec<ReferenceEdit>,
    /// The quoted specifier of an import or re-export.
    pub source_span: Option<Span>,
    pub has_side_effects: bool,
}

/// Everything later phases need to know about one module.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub id: ModuleId,
    pub kind: SourceKind,
    pub content_hash: ContentHash,
    /// Original text as read.
    pub source: Arc<str>,
    /// JavaScript the statements index into (transpiled for TypeScript).
    pub code: Arc<str>,
    /// Maps positions in `code` back to `source`; `None` when identical.
    pub code_map: Option<TokenMap>,
    pub line_index: LineIndex,
    pub imports: Vec<ImportRecord>,
    pub bindings: Vec<LocalBinding>,
    pub exports: Vec<ExportRecord>,
    pub statements: Vec<StatementRecord>,
    /// Free variables (unresolved references).
    pub globals: FxHashSet<String>,
    /// Names declared in nested scopes.
    pub nested_names: FxHashSet<String>,
    pub has_side_effects: bool,
    /// Analyzed from declaration (`.d.ts`) text.
    pub is_declaration: bool,
}

impl ModuleRecord {
    pub fn import_index(&self, specifier: &str) -> Option<usize> {
        self.imports.iter().position(|r| r.specifier == specifier)
    }

    pub fn binding(&self, idx: BindingIdx) -> &LocalBinding {
        &self.bindings[idx]
    }

    /// Specifiers that survive into emitted JavaScript.
    pub fn value_imports(&self) -> impl Iterator<Item = (usize, &ImportRecord)> {
        self.imports.iter().enumerate().filter(|(_, r)| !r.type_only)
    }

    pub fn find_export(&self, name: &str) -> impl Iterator<Item = &ExportRecord> {
        self.exports
            .iter()
            .filter(move |e| e.exported_name() == Some(name))
    }

    pub fn star_exports(&self) -> impl Iterator<Item = usize> + '_ {
        self.exports.iter().filter_map(|e| match e {
            ExportRecord::Star { record } => Some(*record),
            _ => None,
        })
    }

    /// Names taken at module scope (top-level bindings).
    pub fn top_level_names(&self) -> impl Iterator<Item = &str> {
        self.bindings
            .iter()
            .filter(|b| !b.synthetic)
            .map(|b| b.name.as_str())
    }

    /// Source text of `span` in [`ModuleRecord::code`].
    pub fn slice(&self, span: Span) -> &str {
        &self.code[span.start as usize..span.end as usize]
    }
}
