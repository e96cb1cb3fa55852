//! Single-file linking.
//!
//! Modules are concatenated in evaluation order into one scope. Top-level
//! bindings keep their names where possible; collisions are resolved by
//! renaming the later claimant, never by wrapping modules in functions.
//! Import bindings are rewritten to the (possibly renamed) binding they
//! resolve to, to a synthesized namespace object, or to an access on an
//! external package.

use std::path::{Path, PathBuf};

use bale_graph::{
    BindingIdx, BindingOrigin, ExportTable, GraphError, ImportedName, ModuleId, ModuleRecord,
    ModuleSet, ReferenceEdit, ResolvedExport, ShakeResult, StatementKind, export_table,
    resolve_binding,
};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};

use super::emitter::{Emitter, MappedSource};
use super::names::{NameAllocator, property_key};
use super::paths::{relative_path, to_slash};
use super::{
    BundleExport, BundleInterface, ExportValue, ExternalModule, GeneratedUnit, StatementStyle,
    emit_gap, emit_statement, emits_code, source_name, synthetic_default,
};
use crate::diagnostics::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BundleMode {
    /// JavaScript.
    Code,
    /// Declaration text from declaration records.
    Declarations,
}

pub(crate) struct BundleInput<'a> {
    pub set: &'a dyn ModuleSet,
    /// Modules in evaluation order.
    pub modules: &'a [ModuleId],
    pub entries: &'a [ModuleId],
    pub shake: &'a ShakeResult,
    pub mode: BundleMode,
    /// Build root; section headers are relative to it.
    pub root: &'a Path,
    /// Output path relative to the root.
    pub path: PathBuf,
}

type BindingKey = (ModuleId, BindingIdx);

#[derive(Debug, Default, Clone, Copy)]
struct ExternalUse {
    namespace: bool,
    default: bool,
}

/// Final names for everything a bundle references.
struct Links<'a> {
    set: &'a dyn ModuleSet,
    names: FxHashMap<BindingKey, String>,
    namespaces: FxHashMap<ModuleId, String>,
    externals: IndexMap<ModuleId, ExternalModule>,
}

impl Links<'_> {
    /// Expression naming a resolved export inside the bundle.
    fn value_of(&self, resolved: &ResolvedExport) -> Option<String> {
        match resolved {
            ResolvedExport::Binding { module, binding } => self
                .names
                .get(&(module.clone(), *binding))
                .cloned()
                .or_else(|| {
                    self.set
                        .record(module)
                        .and_then(|record| record.bindings.get(*binding))
                        .map(|binding| binding.name.clone())
                }),
            ResolvedExport::Namespace { module } => self.namespaces.get(module).cloned(),
            ResolvedExport::External { module, name } => {
                self.externals.get(module).map(|external| external.access(name))
            }
            ResolvedExport::Missing => None,
        }
    }

    fn rename(
        &self,
        id: &ModuleId,
        record: &ModuleRecord,
        edit: &ReferenceEdit,
    ) -> Result<Option<String>, BuildError> {
        let binding = &record.bindings[edit.binding];
        if !binding.is_import() {
            return Ok(self
                .names
                .get(&(id.clone(), edit.binding))
                .filter(|name| **name != binding.name)
                .cloned());
        }
        if edit.is_declaration {
            return Ok(None);
        }
        let resolved = resolve_binding(self.set, id, edit.binding);
        match self.value_of(&resolved) {
            Some(value) => Ok(Some(value)),
            None => Err(missing_export(self.set, id, record, edit.binding)),
        }
    }
}

fn missing_export(
    set: &dyn ModuleSet,
    importer: &ModuleId,
    record: &ModuleRecord,
    binding: BindingIdx,
) -> BuildError {
    let (module, name) = match &record.bindings[binding].origin {
        BindingOrigin::Import { record: import, imported } => {
            let specifier = &record.imports[*import].specifier;
            let module = set
                .import_target(importer, specifier)
                .cloned()
                .unwrap_or_else(|| ModuleId::package(specifier.as_str()));
            (module, imported.export_name().unwrap_or("*").to_string())
        }
        BindingOrigin::Declared { .. } => (importer.clone(), record.bindings[binding].name.clone()),
    };
    GraphError::MissingExport {
        module,
        name,
        importer: importer.clone(),
    }
    .into()
}

/// Target of `specifier` when it is left external.
fn external_target<'a>(set: &'a dyn ModuleSet, importer: &ModuleId, specifier: &str) -> Option<&'a ModuleId> {
    let target = set.import_target(importer, specifier)?;
    set.record(target).is_none().then_some(target)
}

fn register(uses: &mut IndexMap<ModuleId, ExternalUse>, module: &ModuleId, name: Option<&ImportedName>) {
    let entry = uses.entry(module.clone()).or_default();
    match name {
        Some(ImportedName::Default) => entry.default = true,
        Some(_) => entry.namespace = true,
        None => {}
    }
}

/// Link `input.modules` into one unit.
pub(crate) fn link(input: &BundleInput<'_>) -> Result<GeneratedUnit, BuildError> {
    let set = input.set;
    let shake = input.shake;
    let modules: Vec<(&ModuleId, &ModuleRecord)> = input
        .modules
        .iter()
        .filter_map(|id| set.record(id).map(|record| (id, record)))
        .filter(|(_, record)| input.mode == BundleMode::Declarations || !record.is_declaration)
        .collect();

    // Who uses what: importers of each binding, and every external touched.
    // Externals keep their import even when every binding from them is shaken.
    let mut uses: IndexMap<ModuleId, ExternalUse> = IndexMap::new();
    let mut users: FxHashMap<BindingKey, Vec<(usize, &str)>> = FxHashMap::default();
    for (position, &(id, record)) in modules.iter().enumerate() {
        for (index, statement) in record.statements.iter().enumerate() {
            if let StatementKind::Import { record: import } | StatementKind::ReExport { record: import } =
                statement.kind
            {
                if let Some(target) = external_target(set, id, &record.imports[import].specifier) {
                    register(&mut uses, target, None);
                }
            }
            if !shake.is_statement_included(id, index) {
                continue;
            }
            for &binding in &statement.references {
                let local = &record.bindings[binding];
                if !local.is_import() {
                    continue;
                }
                match resolve_binding(set, id, binding) {
                    ResolvedExport::Binding { module, binding } => users
                        .entry((module, binding))
                        .or_default()
                        .push((position, local.name.as_str())),
                    ResolvedExport::External { module, name } => {
                        register(&mut uses, &module, Some(&name));
                    }
                    ResolvedExport::Namespace { .. } | ResolvedExport::Missing => {}
                }
            }
        }
    }

    let namespace_tables: Vec<(usize, ExportTable)> = modules
        .iter()
        .enumerate()
        .filter(|(_, (id, _))| shake.needs_namespace(id))
        .map(|(position, (id, _))| (position, export_table(set, id)))
        .collect();
    for (_, table) in &namespace_tables {
        for resolved in table.names.values() {
            if let ResolvedExport::External { module, name } = resolved {
                register(&mut uses, module, Some(name));
            }
        }
    }

    let mut surface: IndexMap<String, ResolvedExport> = IndexMap::new();
    let mut star_modules: Vec<ModuleId> = Vec::new();
    for entry in input.entries {
        let table = export_table(set, entry);
        for (name, resolved) in table.names {
            surface.entry(name).or_insert(resolved);
        }
        for star in table.external_stars {
            if !star_modules.contains(&star) {
                star_modules.push(star);
            }
        }
    }
    for resolved in surface.values() {
        if let ResolvedExport::External { module, name } = resolved {
            register(&mut uses, module, Some(name));
        }
    }
    for star in &star_modules {
        register(&mut uses, star, None);
    }

    // Names: globals are never shadowed, then bindings claim in module order.
    let mut allocator = NameAllocator::new();
    let mut all_nested: FxHashSet<&str> = FxHashSet::default();
    for (_, record) in &modules {
        for global in &record.globals {
            allocator.reserve(global.clone());
        }
        all_nested.extend(record.nested_names.iter().map(String::as_str));
    }
    if input.mode == BundleMode::Code {
        allocator.reserve("Object");
    }

    let mut names: FxHashMap<BindingKey, String> = FxHashMap::default();
    for &(id, record) in &modules {
        let mut claimed: FxHashMap<&str, String> = FxHashMap::default();
        for (index, binding) in record.bindings.iter().enumerate() {
            let BindingOrigin::Declared { statement } = binding.origin else {
                continue;
            };
            if !shake.is_statement_included(id, statement) {
                continue;
            }
            // Merged declarations (`interface X` + `const X`) share one name.
            if let Some(name) = claimed.get(binding.name.as_str()) {
                names.insert((id.clone(), index), name.clone());
                continue;
            }
            let importers = users
                .get(&(id.clone(), index))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let name = allocator.claim(&binding.name, |candidate| {
                (candidate == binding.name || !record.nested_names.contains(candidate))
                    && importers.iter().all(|&(position, local)| {
                        candidate == local || !modules[position].1.nested_names.contains(candidate)
                    })
            });
            claimed.insert(binding.name.as_str(), name.clone());
            names.insert((id.clone(), index), name);
        }
    }

    let mut namespaces: FxHashMap<ModuleId, String> = FxHashMap::default();
    for (position, _) in &namespace_tables {
        let id = modules[*position].0;
        let name = allocator.claim(&format!("{}_ns", id.identifier_stem()), |candidate| {
            !all_nested.contains(candidate)
        });
        namespaces.insert(id.clone(), name);
    }

    let mut externals: IndexMap<ModuleId, ExternalModule> = IndexMap::new();
    for (id, usage) in &uses {
        let local = allocator.claim(&id.identifier_stem(), |candidate| !all_nested.contains(candidate));
        let default = usage.default.then(|| {
            allocator.claim(&format!("{local}_default"), |candidate| {
                !all_nested.contains(candidate)
            })
        });
        externals.insert(
            id.clone(),
            ExternalModule {
                specifier: id.path_string(),
                local,
                uses_namespace: usage.namespace,
                default,
            },
        );
    }

    let links = Links {
        set,
        names,
        namespaces,
        externals,
    };

    let style = match input.mode {
        BundleMode::Code => StatementStyle::Script,
        BundleMode::Declarations => StatementStyle::Declarations,
    };
    let out_dir = input
        .root
        .join(&input.path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.root.to_path_buf());

    let mut emitter = Emitter::new();
    let mut sources = Vec::new();
    for (position, &(id, record)) in modules.iter().enumerate() {
        let emitted: Vec<usize> = (0..record.statements.len())
            .filter(|&index| shake.is_statement_included(id, index) && emits_code(record, index))
            .collect();
        let namespace = namespace_tables
            .iter()
            .find(|(at, _)| *at == position)
            .map(|(_, table)| table);
        if emitted.is_empty() && namespace.is_none() {
            continue;
        }

        let source = MappedSource {
            record,
            index: sources.len() as u32,
        };
        sources.push(bale_graph::SourceEntry {
            name: source_name(&out_dir, id),
            content: record.source.to_string(),
        });

        emitter.ensure_newline();
        if !emitter.is_empty() {
            emitter.newline();
        }
        emitter.push(&format!("// {}\n", section_name(input.root, id)));
        if let (Some(table), Some(name)) = (namespace, links.namespaces.get(id)) {
            render_namespace(&mut emitter, &links, name, table, input.mode);
        }

        let mut cursor = 0u32;
        let mut next = emitted.iter().peekable();
        for (index, statement) in record.statements.iter().enumerate() {
            let from = cursor;
            cursor = statement.span.end;
            if next.peek() != Some(&&index) {
                continue;
            }
            next.next();
            emit_gap(&mut emitter, source, from, index);
            let default_name = synthetic_default(record, index)
                .and_then(|binding| links.names.get(&(id.clone(), binding)).cloned());
            emit_statement(
                &mut emitter,
                source,
                index,
                style,
                default_name.as_deref(),
                &mut |edit| links.rename(id, record, edit),
            )?;
        }
        emitter.ensure_newline();
    }

    let mut exports = Vec::new();
    for (name, resolved) in &surface {
        let value = match resolved {
            ResolvedExport::Missing => {
                tracing::debug!(name = %name, "Skipping ambiguous or missing export");
                continue;
            }
            ResolvedExport::External { module, name } => match links.externals.get_index_of(module) {
                Some(module) => ExportValue::External {
                    module,
                    name: name.clone(),
                },
                None => continue,
            },
            other => match links.value_of(other) {
                Some(local) => ExportValue::Local(local),
                None => continue,
            },
        };
        exports.push(BundleExport {
            name: name.clone(),
            value,
        });
    }
    let external_stars = star_modules
        .iter()
        .filter_map(|star| links.externals.get_index_of(star))
        .collect();

    let (code, map) = emitter.finish();
    Ok(GeneratedUnit {
        path: input.path.clone(),
        code,
        map,
        sources,
        interface: Some(BundleInterface {
            externals: links.externals.into_values().collect(),
            exports,
            external_stars,
        }),
        sourcemap: None,
    })
}

fn section_name(root: &Path, id: &ModuleId) -> String {
    match id.path() {
        Some(path) => to_slash(&relative_path(root, path)),
        None => id.path_string(),
    }
}

/// Emit the namespace object of one module.
fn render_namespace(
    emitter: &mut Emitter,
    links: &Links<'_>,
    name: &str,
    table: &ExportTable,
    mode: BundleMode,
) {
    let mut members: Vec<(&str, String)> = table
        .names
        .iter()
        .filter_map(|(exported, resolved)| {
            links
                .value_of(resolved)
                .map(|value| (exported.as_str(), value))
        })
        .collect();
    members.sort_by(|a, b| a.0.cmp(b.0));

    match mode {
        BundleMode::Code => {
            emitter.push(&format!("var {name} = Object.freeze({{\n  __proto__: null,\n"));
            for (exported, value) in &members {
                emitter.push(&format!(
                    "  get {}() {{ return {value}; }},\n",
                    property_key(exported)
                ));
            }
            emitter.push("});\n");
        }
        BundleMode::Declarations => {
            let specifiers: Vec<String> = members
                .iter()
                .filter_map(|(exported, value)| {
                    if !super::names::is_identifier_name(value) {
                        tracing::warn!(
                            namespace = %name,
                            export = %exported,
                            "Dropping external member from declaration namespace"
                        );
                        return None;
                    }
                    Some(if value == exported {
                        value.clone()
                    } else {
                        format!("{value} as {exported}")
                    })
                })
                .collect();
            emitter.push(&format!(
                "declare namespace {name} {{\n  export {{ {} }};\n}}\n",
                specifiers.join(", ")
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_graph::{SourceKind, TreeShaker, analyze_module};
    use std::sync::Arc;

    /// In-memory module set; bare specifiers stay external.
    struct Modules {
        records: IndexMap<ModuleId, ModuleRecord>,
        packages: FxHashMap<String, ModuleId>,
    }

    impl Modules {
        fn new(files: &[(&str, &str)]) -> Self {
            let records: IndexMap<ModuleId, ModuleRecord> = files
                .iter()
                .map(|(name, source)| {
                    let id = ModuleId::file(format!("/app/src/{name}"));
                    let record =
                        analyze_module(id.clone(), SourceKind::Internal, Arc::from(*source)).unwrap();
                    (id, record)
                })
                .collect();
            let packages = records
                .values()
                .flat_map(|record| &record.imports)
                .filter(|import| !import.specifier.starts_with("./"))
                .map(|import| (import.specifier.clone(), ModuleId::package(import.specifier.as_str())))
                .collect();
            Self { records, packages }
        }

        fn ids(&self) -> Vec<ModuleId> {
            self.records.keys().cloned().collect()
        }
    }

    impl ModuleSet for Modules {
        fn record(&self, id: &ModuleId) -> Option<&ModuleRecord> {
            self.records.get(id)
        }

        fn import_target(&self, _importer: &ModuleId, specifier: &str) -> Option<&ModuleId> {
            match specifier.strip_prefix("./") {
                Some(name) => self
                    .records
                    .get_key_value(&ModuleId::file(format!("/app/src/{name}")))
                    .map(|(id, _)| id),
                None => self.packages.get(specifier),
            }
        }
    }

    /// Link modules listed in evaluation order; the last one is the entry.
    fn bundle(files: &[(&str, &str)]) -> GeneratedUnit {
        let modules = Modules::new(files);
        let order = modules.ids();
        let entries = vec![order[order.len() - 1].clone()];
        let shake = TreeShaker::new(&modules, &order, &entries).shake();
        link(&BundleInput {
            set: &modules,
            modules: &order,
            entries: &entries,
            shake: &shake,
            mode: BundleMode::Code,
            root: Path::new("/app"),
            path: PathBuf::from("dist/app.js"),
        })
        .unwrap()
    }

    #[test]
    fn test_collisions_rename_later_module() {
        let unit = bundle(&[
            ("b.js", "const value = 1;\nexport function read() { return value; }\n"),
            (
                "a.js",
                "import { read } from './b.js';\nconst value = 2;\nexport const total = read() + value;\n",
            ),
        ]);
        assert!(unit.code.contains("const value = 1;"));
        assert!(unit.code.contains("const value$1 = 2;"));
        assert!(unit.code.contains("const total = read() + value$1;"));
        let interface = unit.interface.unwrap();
        assert_eq!(
            interface.exports,
            vec![BundleExport {
                name: "total".into(),
                value: ExportValue::Local("total".into()),
            }]
        );
    }

    #[test]
    fn test_unused_exports_are_shaken() {
        let unit = bundle(&[
            ("b.js", "export function f() { return 1; }\nexport function g() { return 2; }\n"),
            ("a.js", "import { f } from './b.js';\nexport const x = f();\n"),
        ]);
        assert!(unit.code.contains("function f()"));
        assert!(!unit.code.contains("function g()"));
        assert!(unit.code.contains("// src/b.js"));
    }

    #[test]
    fn test_namespace_imports_get_objects() {
        let unit = bundle(&[
            ("b.js", "export const one = 1;\nexport const two = 2;\n"),
            ("a.js", "import * as b from './b.js';\nexport const sum = b.one + b.two;\n"),
        ]);
        assert!(unit.code.contains("var b_ns = Object.freeze({"));
        assert!(unit.code.contains("get one() { return one; }"));
        assert!(unit.code.contains("const sum = b_ns.one + b_ns.two;"));
    }

    #[test]
    fn test_external_imports_become_accesses() {
        let unit = bundle(&[(
            "a.js",
            "import React, { useState } from 'react';\nimport 'polyfill';\nexport function use() { return useState(React); }\n",
        )]);
        assert!(unit.code.contains("return (0, react.useState)(react_default);"));
        let interface = unit.interface.unwrap();
        assert_eq!(interface.externals.len(), 2);
        assert_eq!(interface.externals[0].specifier, "react");
        assert_eq!(interface.externals[0].default.as_deref(), Some("react_default"));
        assert!(interface.externals[1].is_bare());
    }

    #[test]
    fn test_default_exports_are_named() {
        let unit = bundle(&[
            ("util.js", "export default function () { return 1; }\n"),
            ("a.js", "import util from './util.js';\nexport default util();\n"),
        ]);
        assert!(unit.code.contains("function util_default() { return 1; }"));
        assert!(unit.code.contains("var a_default = util_default();"));
        let interface = unit.interface.unwrap();
        assert_eq!(interface.exports[0].name, "default");
        assert_eq!(interface.exports[0].value, ExportValue::Local("a_default".into()));
    }
}
