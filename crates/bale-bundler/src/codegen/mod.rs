//! Code generation.
//!
//! Output is produced by splicing each module's JavaScript (or declaration)
//! text: statements are copied by span, import/export syntax is dropped or
//! rewritten, and identifier occurrences recorded by the analysis are
//! replaced where linking requires it. Nothing is re-parsed.
//!
//! - [`separate`] emits one ES or CommonJS module per source module.
//! - [`bundle`] concatenates modules in evaluation order into one unit whose
//!   exports are described by a [`BundleInterface`]; the wrap stage of the
//!   transform pipeline turns that interface into an ESM epilogue, a browser
//!   global or a declaration document.

pub(crate) mod bundle;
pub(crate) mod emitter;
pub(crate) mod names;
pub(crate) mod paths;
pub(crate) mod separate;

use std::path::{Path, PathBuf};

use bale_graph::oxc::Span;
use bale_graph::{
    BindingIdx, DefaultExportKind, ImportedName, ModuleId, ModuleRecord, ReferenceEdit, ReferenceSite,
    SourceEntry, StatementKind, TokenMap,
};

use crate::diagnostics::BuildError;
use emitter::{Emitter, MappedSource, Splice};

/// One generated output unit on its way through the transform pipeline.
#[derive(Debug, Clone)]
pub struct GeneratedUnit {
    /// Output path relative to the build root.
    pub path: PathBuf,
    pub code: String,
    /// Positions in `code` mapped to `sources`.
    pub map: TokenMap,
    pub sources: Vec<SourceEntry>,
    /// Export surface of a bundle, consumed by the wrap stage.
    pub interface: Option<BundleInterface>,
    /// Serialized source map, set by the source-map stage.
    pub sourcemap: Option<String>,
}

impl GeneratedUnit {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A package a bundle leaves external.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalModule {
    pub specifier: String,
    /// Local bound to the package's module object.
    pub local: String,
    /// Whether the module object itself is referenced (named or namespace use).
    pub uses_namespace: bool,
    /// Local bound to the package's default export, when used.
    pub default: Option<String>,
}

impl ExternalModule {
    /// Imported only for its side effects.
    pub fn is_bare(&self) -> bool {
        !self.uses_namespace && self.default.is_none()
    }

    /// Expression reading export `name` of the package.
    pub fn access(&self, name: &ImportedName) -> String {
        match name {
            ImportedName::Namespace => self.local.clone(),
            ImportedName::Default => self
                .default
                .clone()
                .unwrap_or_else(|| names::member(&self.local, "default")),
            ImportedName::Named(name) => names::member(&self.local, name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportValue {
    /// A name bound at the top level of the bundle.
    Local(String),
    /// An export of [`BundleInterface::externals`]`[module]`.
    External { module: usize, name: ImportedName },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleExport {
    pub name: String,
    pub value: ExportValue,
}

/// What a bundle imports from outside and exposes to its consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleInterface {
    pub externals: Vec<ExternalModule>,
    pub exports: Vec<BundleExport>,
    /// Externals re-exported wholesale with `export *`.
    pub external_stars: Vec<usize>,
}

/// How a statement's text is rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatementStyle {
    /// JavaScript with module syntax removed.
    Script,
    /// Ambient declarations; bare declarations gain `declare`.
    Declarations,
}

/// Name of a module in a unit's source list, relative to the unit's directory.
pub(crate) fn source_name(out_dir: &Path, id: &ModuleId) -> String {
    match id.path() {
        Some(path) => paths::to_slash(&paths::relative_path(out_dir, path)),
        None => id.path_string(),
    }
}

/// The synthesized binding holding an anonymous or expression default export.
pub(crate) fn synthetic_default(record: &ModuleRecord, statement: usize) -> Option<BindingIdx> {
    record.statements[statement]
        .declares
        .iter()
        .copied()
        .find(|&binding| record.bindings[binding].synthetic)
}

/// Whether a statement produces output once module syntax is removed.
pub(crate) fn emits_code(record: &ModuleRecord, statement: usize) -> bool {
    match record.statements[statement].kind {
        StatementKind::Import { .. } | StatementKind::ReExport { .. } | StatementKind::ExportList => {
            false
        }
        StatementKind::ExportDefault { kind, .. } => kind != DefaultExportKind::Alias,
        StatementKind::ExportDeclaration { .. } | StatementKind::Plain => true,
    }
}

/// Copy the text between the previous statement and `statement`
/// (comments, blank lines), dropping a leading hashbang.
pub(crate) fn emit_gap(emitter: &mut Emitter, source: MappedSource<'_>, from: u32, statement: usize) {
    let record = source.record;
    let to = record.statements[statement].span.start;
    let mut from = from;
    if from == 0 && record.code.starts_with("#!") {
        from = record.code.find('\n').map(|n| n as u32).unwrap_or(to).min(to);
    }
    if emitter.ends_with_newline() {
        // Skip the gap's leading line break when output already starts a line.
        let gap = record.code.get(from as usize..to as usize).unwrap_or_default();
        if let Some(stripped) = gap.strip_prefix('\n') {
            from = to - stripped.len() as u32;
        }
    }
    emitter.copy(source, from, to);
}

/// Emit one top-level statement with import/export syntax removed.
///
/// `rename` returns the replacement for an identifier occurrence, or `None`
/// to keep it. `default_name` names the synthesized default-export binding.
pub(crate) fn emit_statement(
    emitter: &mut Emitter,
    source: MappedSource<'_>,
    statement: usize,
    style: StatementStyle,
    default_name: Option<&str>,
    rename: &mut dyn FnMut(&ReferenceEdit) -> Result<Option<String>, BuildError>,
) -> Result<(), BuildError> {
    let record = source.record;
    let stmt = &record.statements[statement];
    let end = stmt.span.end;

    let (start, prefix, insertion, terminate) = match stmt.kind {
        StatementKind::Import { .. } | StatementKind::ReExport { .. } | StatementKind::ExportList => {
            return Ok(());
        }
        StatementKind::ExportDeclaration { declaration_start } => {
            (declaration_start, None, None, false)
        }
        StatementKind::Plain => (stmt.span.start, None, None, false),
        StatementKind::ExportDefault { kind, body_start } => match kind {
            DefaultExportKind::Alias => return Ok(()),
            DefaultExportKind::Declaration => (body_start, None, None, false),
            DefaultExportKind::Anonymous => {
                let name = default_name.unwrap_or("_default");
                let body = record.code.get(body_start as usize..end as usize).unwrap_or_default();
                match name_insertion(body, name) {
                    Some((offset, text)) => (
                        body_start,
                        None,
                        Some(Splice {
                            span: Span::new(body_start + offset, body_start + offset),
                            text,
                        }),
                        false,
                    ),
                    None => (body_start, Some(format!("var {name} = ")), None, true),
                }
            }
            DefaultExportKind::Expression => {
                let name = default_name.unwrap_or("_default");
                if style == StatementStyle::Declarations {
                    return Err(BuildError::TypeInference {
                        module: record.id.clone(),
                        messages: vec![format!(
                            "default export expression has no declared type (would be '{name}')"
                        )],
                        chain: Default::default(),
                    });
                }
                (body_start, Some(format!("var {name} = ")), None, true)
            }
        },
    };

    let mut splices: Vec<Splice> = Vec::new();
    for edit in stmt.edits.iter().filter(|e| e.span.start >= start && e.span.end <= end) {
        let Some(replacement) = rename(edit)? else {
            continue;
        };
        let original = record.slice(edit.span);
        if replacement == original {
            continue;
        }
        let text = match edit.site {
            ReferenceSite::Shorthand => format!("{original}: {replacement}"),
            ReferenceSite::Callee if !names::is_identifier_name(&replacement) => {
                format!("(0, {replacement})")
            }
            _ => replacement,
        };
        splices.push(Splice {
            span: edit.span,
            text,
        });
    }
    if let Some(insertion) = insertion {
        let at = splices.partition_point(|s| s.span.start < insertion.span.start);
        splices.insert(at, insertion);
    }

    let body = record.code.get(start as usize..end as usize).unwrap_or_default();
    if style == StatementStyle::Declarations && prefix.is_none() && needs_declare(body) {
        emitter.push("declare ");
    }
    if let Some(prefix) = prefix {
        emitter.push_mapped(source, start, &prefix);
    }
    emitter.copy_with(source, start, end, &splices);
    if terminate && !body.trim_end().ends_with(';') {
        emitter.push(";");
    }
    Ok(())
}

/// Where to insert a name into an anonymous `function`/`class` declaration.
fn name_insertion(body: &str, name: &str) -> Option<(u32, String)> {
    if let Some(function) = find_keyword(body, "function") {
        let paren = function + body[function..].find('(')?;
        let before = body[..paren].chars().next_back();
        let text = match before {
            Some(ch) if ch.is_alphanumeric() => format!(" {name}"),
            _ => name.to_string(),
        };
        return Some((paren as u32, text));
    }
    let class = find_keyword(body, "class")?;
    Some(((class + "class".len()) as u32, format!(" {name}")))
}

fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = text[from..].find(keyword) {
        let start = from + found;
        let end = start + keyword.len();
        let before_ok = text[..start]
            .chars()
            .next_back()
            .is_none_or(|ch| !ch.is_alphanumeric() && ch != '_' && ch != '$');
        let after_ok = text[end..]
            .chars()
            .next()
            .is_none_or(|ch| !ch.is_alphanumeric() && ch != '_' && ch != '$');
        if before_ok && after_ok {
            return Some(start);
        }
        from = end;
    }
    None
}

/// Declarations at the top of a declaration document must be ambient.
fn needs_declare(text: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "function", "async", "class", "abstract", "const", "let", "var", "enum", "namespace",
        "module",
    ];
    let first = text
        .trim_start()
        .split(|ch: char| !ch.is_alphanumeric() && ch != '_' && ch != '$')
        .next()
        .unwrap_or_default();
    KEYWORDS.contains(&first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_graph::{ModuleId, SourceKind, analyze_module};
    use std::sync::Arc;

    fn render(source: &str, style: StatementStyle) -> Vec<String> {
        let record = analyze_module(
            ModuleId::file("/src/widget.js"),
            SourceKind::Internal,
            Arc::from(source),
        )
        .unwrap();
        let mapped = MappedSource {
            record: &record,
            index: 0,
        };
        (0..record.statements.len())
            .map(|index| {
                let mut emitter = Emitter::new();
                let default_name = synthetic_default(&record, index)
                    .map(|binding| record.bindings[binding].name.clone());
                emit_statement(
                    &mut emitter,
                    mapped,
                    index,
                    style,
                    default_name.as_deref(),
                    &mut |_| Ok(None),
                )
                .unwrap();
                emitter.finish().0
            })
            .collect()
    }

    #[test]
    fn test_module_syntax_is_removed() {
        let out = render(
            "import { a } from './a.js';\nexport const b = a;\nexport { b as c };\nexport function f() {}\n",
            StatementStyle::Script,
        );
        assert_eq!(out, vec!["", "const b = a;", "", "function f() {}"]);
    }

    #[test]
    fn test_default_export_forms() {
        let out = render("export default function () { return 1; }\n", StatementStyle::Script);
        assert_eq!(out, vec!["function widget_default() { return 1; }"]);

        let out = render("export default class extends Base {}\n", StatementStyle::Script);
        assert_eq!(out, vec!["class widget_default extends Base {}"]);

        let out = render("export default 40 + 2;\n", StatementStyle::Script);
        assert_eq!(out, vec!["var widget_default = 40 + 2;"]);

        let out = render("const x = 1;\nexport default x;\n", StatementStyle::Script);
        assert_eq!(out, vec!["const x = 1;", ""]);
    }

    #[test]
    fn test_renames_respect_sites() {
        let record = analyze_module(
            ModuleId::file("/src/a.js"),
            SourceKind::Internal,
            Arc::from("const v = 1;\nexport const o = { v, w: v };\nlog(v);\n"),
        )
        .unwrap();
        let mapped = MappedSource {
            record: &record,
            index: 0,
        };
        let v = record.bindings.iter().position(|b| b.name == "v").unwrap();
        let mut out = Vec::new();
        for index in 0..record.statements.len() {
            let mut emitter = Emitter::new();
            emit_statement(&mut emitter, mapped, index, StatementStyle::Script, None, &mut |edit| {
                Ok((edit.binding == v).then(|| "ns.v".to_string()))
            })
            .unwrap();
            out.push(emitter.finish().0);
        }
        assert_eq!(out[0], "const ns.v = 1;");
        assert_eq!(out[1], "const o = { v: ns.v, w: ns.v };");
        assert_eq!(out[2], "log(ns.v);");
    }

    #[test]
    fn test_declarations_gain_declare() {
        assert!(needs_declare("function f(): void;"));
        assert!(needs_declare("const enum E { A }"));
        assert!(!needs_declare("interface I {}"));
        assert!(!needs_declare("declare const x: number;"));
        assert!(!needs_declare("type T = string;"));
    }

    #[test]
    fn test_name_insertion_points() {
        assert_eq!(name_insertion("function () {}", "f"), Some((9, "f".to_string())));
        assert_eq!(name_insertion("function() {}", "f"), Some((8, " f".to_string())));
        assert_eq!(name_insertion("async function* () {}", "f"), Some((16, "f".to_string())));
        assert_eq!(name_insertion("class {}", "C"), Some((5, " C".to_string())));
    }
}
