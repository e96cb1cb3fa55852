//! Per-module analysis.
//!
//! Parses a module exactly once and reduces it to a [`ModuleRecord`]:
//! import specifiers, top-level bindings, exports, and per-statement
//! declarations, references and side effects. TypeScript and JSX sources are
//! transpiled first; the record indexes into the transpiled JavaScript and
//! keeps a map back to the original text.

mod collect;
mod record;
pub mod side_effects;
mod transpile;

pub use record::{
    BindingIdx, BindingOrigin, DefaultExportKind, ExportRecord, ImportRecord, ImportedName,
    LocalBinding, ModuleRecord, ReferenceEdit, ReferenceSite, StatementKind, StatementRecord,
};

use std::path::Path;
use std::sync::Arc;

use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;

use crate::cache::ContentHash;
use crate::dependency_chain::DependencyChain;
use crate::error::{GraphError, GraphResult};
use crate::module_id::{ModuleId, SourceKind};
use crate::sourcemap::{LineIndex, TokenMap};

/// Extensions whose sources go through the TypeScript/JSX transform.
const TRANSPILED_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "jsx"];

/// Analyze the source of a module.
///
/// The source type follows the module path's extension; `.d.ts` files are
/// analyzed as declarations.
pub fn analyze_module(id: ModuleId, kind: SourceKind, source: Arc<str>) -> GraphResult<ModuleRecord> {
    let path = id.path().map(Path::to_path_buf).unwrap_or_default();
    let file_name = path.to_string_lossy();
    if file_name.ends_with(".d.ts") || file_name.ends_with(".d.mts") || file_name.ends_with(".d.cts") {
        return analyze_declaration(id, kind, source);
    }

    let content_hash = ContentHash::of(source.as_bytes());
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    if TRANSPILED_EXTENSIONS.contains(&extension) {
        let source_type = SourceType::from_path(&path).unwrap_or_else(|_| SourceType::tsx());
        let transpiled = transpile::transpile(&source, &path, source_type)
            .map_err(|messages| parse_failure(&id, messages))?;
        let code: Arc<str> = Arc::from(transpiled.code);
        build_record(
            id,
            kind,
            content_hash,
            source,
            code,
            Some(transpiled.map),
            Some(&transpiled.specifiers),
            false,
        )
    } else {
        let code = source.clone();
        build_record(id, kind, content_hash, source, code, None, None, false)
    }
}

/// Analyze declaration (`.d.ts`) text produced for a module.
///
/// The record keeps `id` so declaration documents link through the same
/// graph edges as the module's JavaScript.
pub fn analyze_declaration(
    id: ModuleId,
    kind: SourceKind,
    text: Arc<str>,
) -> GraphResult<ModuleRecord> {
    let content_hash = ContentHash::of(text.as_bytes());
    let code = text.clone();
    build_record(id, kind, content_hash, text, code, None, None, true)
}

#[allow(clippy::too_many_arguments)]
fn build_record(
    id: ModuleId,
    kind: SourceKind,
    content_hash: ContentHash,
    source: Arc<str>,
    code: Arc<str>,
    code_map: Option<TokenMap>,
    original_specifiers: Option<&[String]>,
    is_declaration: bool,
) -> GraphResult<ModuleRecord> {
    let allocator = Allocator::default();
    let source_type = if is_declaration {
        SourceType::from_path("index.d.ts").unwrap_or_else(|_| SourceType::ts())
    } else {
        SourceType::mjs().with_jsx(true)
    };

    let ret = Parser::new(&allocator, &code, source_type).parse();
    if !ret.errors.is_empty() {
        let messages = ret.errors.iter().map(|e| e.to_string()).collect();
        return Err(parse_failure(&id, messages));
    }

    let semantic = SemanticBuilder::new().build(&ret.program).semantic;
    let collected = collect::collect(
        &ret.program,
        semantic.scoping(),
        &id,
        is_declaration,
        original_specifiers,
    );
    let has_side_effects = collected.statements.iter().any(|s| s.has_side_effects);

    tracing::trace!(
        module = %id,
        statements = collected.statements.len(),
        bindings = collected.bindings.len(),
        has_side_effects,
        "analyzed module"
    );

    Ok(ModuleRecord {
        line_index: LineIndex::new(&code),
        id,
        kind,
        content_hash,
        source,
        code,
        code_map,
        imports: collected.imports,
        bindings: collected.bindings,
        exports: collected.exports,
        statements: collected.statements,
        globals: collected.globals,
        nested_names: collected.nested_names,
        has_side_effects,
        is_declaration,
    })
}

fn parse_failure(id: &ModuleId, messages: Vec<String>) -> GraphError {
    GraphError::ParseFailure {
        module: id.clone(),
        messages,
        chain: DependencyChain::default(),
    }
}
