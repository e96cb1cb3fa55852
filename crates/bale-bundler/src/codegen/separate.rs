//! One output file per source module.
//!
//! ES modules keep their text; only specifiers of bundled imports are
//! rewritten to point at the emitted sibling file. CommonJS modules are
//! lowered: exports become getters on `exports` installed before any
//! `require` runs (so cycles observe live bindings), imports become
//! `require` calls and every reference to an imported binding becomes a
//! property access on the required module.

use std::path::{Path, PathBuf};

use bale_graph::{
    BindingOrigin, EdgeFilter, ExportRecord, ImportedName, ModuleGraph, ModuleId, ModuleRecord,
    SourceEntry, SourceKind, StatementKind,
};
use rustc_hash::FxHashMap;

use super::emitter::{Emitter, MappedSource, Splice};
use super::names::{NameAllocator, member, string_literal};
use super::paths::{common_dir, module_output_path, relative_specifier};
use super::{GeneratedUnit, StatementStyle, emit_gap, emit_statement, emits_code, source_name, synthetic_default};
use crate::diagnostics::BuildError;
use crate::target::OutputFormat;

/// Names the CommonJS wrapper provides to every module.
const CJS_RESERVED: &[&str] = &["exports", "require", "module", "__filename", "__dirname", "Object"];

pub(crate) struct SeparateInput<'a> {
    pub graph: &'a ModuleGraph,
    pub format: OutputFormat,
    /// Build root.
    pub root: &'a Path,
    /// Output directory relative to the root.
    pub out_dir: &'a Path,
}

/// Emitted location of every module of a separate-module target.
struct Layout {
    /// Root-relative output path per module.
    paths: FxHashMap<ModuleId, PathBuf>,
}

impl Layout {
    fn new(input: &SeparateInput<'_>, modules: &[&ModuleRecord]) -> Self {
        let internal: Vec<&Path> = modules
            .iter()
            .filter(|record| record.kind == SourceKind::Internal)
            .filter_map(|record| record.id.path())
            .collect();
        let base = if internal.is_empty() {
            common_dir(modules.iter().filter_map(|record| record.id.path()))
        } else {
            common_dir(internal)
        };
        let extension = input.format.extension();
        let paths = modules
            .iter()
            .filter_map(|record| {
                let path = record.id.path()?;
                let output = input.out_dir.join(module_output_path(path, &base, extension));
                Some((record.id.clone(), output))
            })
            .collect();
        Self { paths }
    }

    fn get(&self, id: &ModuleId) -> Option<&PathBuf> {
        self.paths.get(id)
    }
}

/// Generate every module reachable along value edges.
pub(crate) fn generate(input: &SeparateInput<'_>) -> Result<Vec<GeneratedUnit>, BuildError> {
    let modules: Vec<&ModuleRecord> = input
        .graph
        .modules(EdgeFilter::Value)
        .map(|record| record.as_ref())
        .filter(|record| !record.is_declaration)
        .collect();
    let layout = Layout::new(input, &modules);

    let mut units = Vec::with_capacity(modules.len());
    for record in modules {
        let Some(path) = layout.get(&record.id) else {
            continue;
        };
        let out_dir = input
            .root
            .join(path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| input.root.to_path_buf());
        let module = ModuleOutput {
            input,
            layout: &layout,
            record,
            out_dir: &out_dir,
        };
        let mut emitter = Emitter::new();
        match input.format {
            OutputFormat::Cjs => module.emit_cjs(&mut emitter)?,
            _ => module.emit_esm(&mut emitter),
        }
        let (code, map) = emitter.finish();
        units.push(GeneratedUnit {
            path: path.clone(),
            code,
            map,
            sources: vec![SourceEntry {
                name: source_name(&out_dir, &record.id),
                content: record.source.to_string(),
            }],
            interface: None,
            sourcemap: None,
        });
    }
    Ok(units)
}

struct ModuleOutput<'a> {
    input: &'a SeparateInput<'a>,
    layout: &'a Layout,
    record: &'a ModuleRecord,
    /// Absolute directory of the emitted file.
    out_dir: &'a Path,
}

/// How one import record of a CommonJS module is reached.
#[derive(Debug, Default)]
struct Required {
    local: Option<String>,
    /// Interop binding for the default export of a module not compiled
    /// by this build (ours mark `__esModule` and expose `default`).
    default: Option<String>,
}

impl ModuleOutput<'_> {
    fn source(&self) -> MappedSource<'_> {
        MappedSource {
            record: self.record,
            index: 0,
        }
    }

    /// Specifier for import record `index`: a relative path to the emitted
    /// file when the target is part of this build.
    fn specifier(&self, index: usize) -> (String, bool) {
        let original = &self.record.imports[index].specifier;
        let emitted = self
            .input
            .graph
            .import_target(&self.record.id, original)
            .filter(|target| self.input.graph.record(target).is_some())
            .and_then(|target| self.layout.get(target));
        match emitted {
            Some(path) => (
                relative_specifier(self.out_dir, &self.input.root.join(path)),
                true,
            ),
            None => (original.clone(), false),
        }
    }

    fn emit_esm(&self, emitter: &mut Emitter) {
        let record = self.record;
        let mut splices = Vec::new();
        for statement in &record.statements {
            let (StatementKind::Import { record: index } | StatementKind::ReExport { record: index }) =
                statement.kind
            else {
                continue;
            };
            let Some(span) = statement.source_span else {
                continue;
            };
            let (specifier, internal) = self.specifier(index);
            if !internal {
                continue;
            }
            let quote = record.slice(span).chars().next().unwrap_or('\'');
            splices.push(Splice {
                span,
                text: format!("{quote}{specifier}{quote}"),
            });
        }
        emitter.copy_with(self.source(), 0, record.code.len() as u32, &splices);
        emitter.ensure_newline();
    }

    fn emit_cjs(&self, emitter: &mut Emitter) -> Result<(), BuildError> {
        let record = self.record;

        let mut allocator = NameAllocator::new();
        for name in CJS_RESERVED {
            allocator.reserve(*name);
        }
        for global in &record.globals {
            allocator.reserve(global.clone());
        }
        for name in record.top_level_names() {
            allocator.reserve(name);
        }
        let free = |candidate: &str| !record.nested_names.contains(candidate);

        let mut synthetic: FxHashMap<usize, String> = FxHashMap::default();
        for (index, binding) in record.bindings.iter().enumerate() {
            if binding.synthetic {
                synthetic.insert(index, allocator.claim(&binding.name, free));
            }
        }

        let mut required: Vec<Required> = (0..record.imports.len()).map(|_| Required::default()).collect();
        for (index, import) in record.value_imports() {
            let (_, internal) = self.specifier(index);
            let imported: Vec<&ImportedName> = record
                .bindings
                .iter()
                .filter_map(|binding| match &binding.origin {
                    BindingOrigin::Import { record: r, imported } if *r == index && !binding.type_only => {
                        Some(imported)
                    }
                    _ => None,
                })
                .chain(record.exports.iter().filter_map(|export| match export {
                    ExportRecord::ReExport { record: r, imported, .. } if *r == index => Some(imported),
                    _ => None,
                }))
                .collect();
            let starred = record.star_exports().any(|star| star == index);
            let slot = &mut required[index];
            if imported.is_empty() && !starred {
                continue;
            }
            let stem = self
                .input
                .graph
                .import_target(&record.id, &import.specifier)
                .map(ModuleId::identifier_stem)
                .unwrap_or_else(|| ModuleId::package(import.specifier.as_str()).identifier_stem());
            let local = allocator.claim(&stem, free);
            if !internal && imported.iter().any(|name| **name == ImportedName::Default) {
                slot.default = Some(allocator.claim(&format!("{local}_default"), free));
            }
            slot.local = Some(local);
        }

        let access = |index: usize, name: &ImportedName| -> String {
            let slot = &required[index];
            let local = slot.local.as_deref().unwrap_or("undefined");
            match name {
                ImportedName::Namespace => local.to_string(),
                ImportedName::Default => slot
                    .default
                    .clone()
                    .unwrap_or_else(|| member(local, "default")),
                ImportedName::Named(name) => member(local, name),
            }
        };
        let binding_value = |binding: usize| -> String {
            let local = &record.bindings[binding];
            match &local.origin {
                BindingOrigin::Import { record: index, imported } => access(*index, imported),
                BindingOrigin::Declared { .. } => synthetic
                    .get(&binding)
                    .cloned()
                    .unwrap_or_else(|| local.name.clone()),
            }
        };

        emitter.push("\"use strict\";\n");
        emitter.push("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
        for export in &record.exports {
            let (exported, value) = match export {
                ExportRecord::Local { exported, binding } => {
                    if record.bindings[*binding].type_only {
                        continue;
                    }
                    (exported, binding_value(*binding))
                }
                ExportRecord::ReExport {
                    exported,
                    record: index,
                    imported,
                } => {
                    if record.imports[*index].type_only {
                        continue;
                    }
                    (exported, access(*index, imported))
                }
                ExportRecord::Star { .. } => continue,
            };
            emitter.push(&format!(
                "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {value}; }} }});\n",
                string_literal(exported)
            ));
        }

        for (index, _) in record.value_imports() {
            let (specifier, _) = self.specifier(index);
            let slot = &required[index];
            let call = format!("require({})", string_literal(&specifier));
            match &slot.local {
                Some(local) => emitter.push(&format!("const {local} = {call};\n")),
                None => emitter.push(&format!("{call};\n")),
            }
            if let (Some(local), Some(default)) = (&slot.local, &slot.default) {
                emitter.push(&format!(
                    "var {default} = {local} && {local}.__esModule ? {local}[\"default\"] : {local};\n"
                ));
            }
            if record.star_exports().any(|star| star == index) {
                if let Some(local) = &slot.local {
                    emitter.push(&star_reexport(local));
                }
            }
        }

        let mut cursor = 0u32;
        for (index, statement) in record.statements.iter().enumerate() {
            let from = cursor;
            cursor = statement.span.end;
            if !emits_code(record, index) {
                continue;
            }
            emit_gap(emitter, self.source(), from, index);
            let default_name = synthetic_default(record, index).and_then(|b| synthetic.get(&b).cloned());
            emit_statement(
                emitter,
                self.source(),
                index,
                StatementStyle::Script,
                default_name.as_deref(),
                &mut |edit| {
                    let binding = &record.bindings[edit.binding];
                    if !binding.is_import() || edit.is_declaration {
                        return Ok(None);
                    }
                    Ok(Some(binding_value(edit.binding)))
                },
            )?;
        }
        emitter.ensure_newline();
        Ok(())
    }
}

/// Copy every export of a required module onto `exports`, skipping
/// `default` and names the module exports itself.
fn star_reexport(local: &str) -> String {
    format!(
        "Object.keys({local}).forEach(function (key) {{\n  \
         if (key === \"default\" || Object.prototype.hasOwnProperty.call(exports, key)) return;\n  \
         Object.defineProperty(exports, key, {{ enumerable: true, get: function () {{ return {local}[key]; }} }});\n\
         }});\n"
    )
}
