//! Export linking.
//!
//! Follows import bindings, named re-exports and star re-exports to the
//! module that actually declares a value. Star re-exports follow ECMAScript:
//! `default` is never re-exported by `export *`, explicit exports shadow star
//! ones, and a name reachable through two stars with different origins is
//! ambiguous and therefore not exported at all.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::analysis::{BindingIdx, BindingOrigin, ExportRecord, ImportedName, ModuleRecord};
use crate::graph::ModuleGraph;
use crate::module_id::ModuleId;

/// A set of analyzed modules that can be linked.
pub trait ModuleSet {
    /// The record of `id`; `None` for modules left external.
    fn record(&self, id: &ModuleId) -> Option<&ModuleRecord>;

    /// The module `specifier` resolves to when imported from `importer`.
    fn import_target(&self, importer: &ModuleId, specifier: &str) -> Option<&ModuleId>;
}

impl ModuleSet for ModuleGraph {
    fn record(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        ModuleGraph::record(self, id).map(|record| record.as_ref())
    }

    fn import_target(&self, importer: &ModuleId, specifier: &str) -> Option<&ModuleId> {
        ModuleGraph::import_target(self, importer, specifier)
    }
}

/// Where an export ultimately comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedExport {
    /// A top-level binding declared in `module`.
    Binding { module: ModuleId, binding: BindingIdx },
    /// The namespace object of `module`.
    Namespace { module: ModuleId },
    /// An export of a module left external.
    External { module: ModuleId, name: ImportedName },
    /// Not exported, or ambiguous between star re-exports.
    Missing,
}

impl ResolvedExport {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// The complete export surface of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportTable {
    /// Exported names in declaration order; explicit exports first.
    pub names: IndexMap<String, ResolvedExport>,
    /// External modules re-exported with `export *`; their names are unknown.
    pub external_stars: Vec<ModuleId>,
}

type Visited = FxHashSet<(ModuleId, String)>;

/// Resolve export `name` of `module`.
pub fn resolve_export(set: &dyn ModuleSet, module: &ModuleId, name: &str) -> ResolvedExport {
    resolve_export_inner(set, module, name, &mut Visited::default())
}

/// Resolve a top-level binding of `module` to its declaring module.
pub fn resolve_binding(set: &dyn ModuleSet, module: &ModuleId, binding: BindingIdx) -> ResolvedExport {
    resolve_binding_inner(set, module, binding, &mut Visited::default())
}

/// Resolve what an import record of `importer` names.
pub fn resolve_import(
    set: &dyn ModuleSet,
    importer: &ModuleId,
    record: usize,
    imported: &ImportedName,
) -> ResolvedExport {
    resolve_import_inner(set, importer, record, imported, &mut Visited::default())
}

/// Every export of `module`, resolved.
pub fn export_table(set: &dyn ModuleSet, module: &ModuleId) -> ExportTable {
    let mut table = ExportTable::default();
    let mut visiting = vec![module.clone()];
    collect_table(set, module, &mut table, &mut visiting);
    table
}

fn collect_table(
    set: &dyn ModuleSet,
    module: &ModuleId,
    table: &mut ExportTable,
    visiting: &mut Vec<ModuleId>,
) {
    let Some(record) = set.record(module) else {
        return;
    };

    for export in &record.exports {
        if let Some(name) = export.exported_name() {
            if !table.names.contains_key(name) {
                let resolved = resolve_export(set, module, name);
                table.names.insert(name.to_string(), resolved);
            }
        }
    }

    let mut star_names: IndexMap<String, ResolvedExport> = IndexMap::new();
    let mut ambiguous: FxHashSet<String> = FxHashSet::default();
    for star in record.star_exports() {
        let Some(target) = set.import_target(module, &record.imports[star].specifier) else {
            continue;
        };
        if set.record(target).is_none() {
            if !table.external_stars.contains(target) {
                table.external_stars.push(target.clone());
            }
            continue;
        }
        if visiting.contains(target) {
            continue;
        }
        visiting.push(target.clone());
        let mut nested = ExportTable::default();
        collect_table(set, target, &mut nested, visiting);
        visiting.pop();

        for external in nested.external_stars {
            if !table.external_stars.contains(&external) {
                table.external_stars.push(external);
            }
        }
        for (name, resolved) in nested.names {
            if name == "default" || table.names.contains_key(&name) {
                continue;
            }
            match star_names.get(&name) {
                Some(existing) if *existing != resolved => {
                    ambiguous.insert(name);
                }
                Some(_) => {}
                None => {
                    star_names.insert(name, resolved);
                }
            }
        }
    }

    for (name, resolved) in star_names {
        if !ambiguous.contains(&name) && !resolved.is_missing() {
            table.names.insert(name, resolved);
        }
    }
    if !ambiguous.is_empty() {
        tracing::debug!(module = %module, names = ?ambiguous, "ambiguous star re-exports dropped");
    }
}

fn resolve_export_inner(
    set: &dyn ModuleSet,
    module: &ModuleId,
    name: &str,
    visited: &mut Visited,
) -> ResolvedExport {
    if !visited.insert((module.clone(), name.to_string())) {
        return ResolvedExport::Missing;
    }
    let Some(record) = set.record(module) else {
        return ResolvedExport::External {
            module: module.clone(),
            name: ImportedName::from_name(name),
        };
    };

    if let Some(export) = record.find_export(name).next() {
        return match export {
            ExportRecord::Local { binding, .. } => {
                resolve_binding_inner(set, module, *binding, visited)
            }
            ExportRecord::ReExport {
                record: import, imported, ..
            } => resolve_import_inner(set, module, *import, imported, visited),
            ExportRecord::Star { .. } => ResolvedExport::Missing,
        };
    }

    if name == "default" {
        return ResolvedExport::Missing;
    }

    let mut found: Option<ResolvedExport> = None;
    for star in record.star_exports() {
        let Some(target) = set.import_target(module, &record.imports[star].specifier) else {
            continue;
        };
        if set.record(target).is_none() {
            continue;
        }
        let resolved = resolve_export_inner(set, target, name, visited);
        if resolved.is_missing() {
            continue;
        }
        match &found {
            Some(existing) if *existing != resolved => return ResolvedExport::Missing,
            Some(_) => {}
            None => found = Some(resolved),
        }
    }
    found.unwrap_or(ResolvedExport::Missing)
}

fn resolve_binding_inner(
    set: &dyn ModuleSet,
    module: &ModuleId,
    binding: BindingIdx,
    visited: &mut Visited,
) -> ResolvedExport {
    let Some(record) = set.record(module) else {
        return ResolvedExport::Missing;
    };
    match &record.bindings[binding].origin {
        BindingOrigin::Declared { .. } => ResolvedExport::Binding {
            module: module.clone(),
            binding,
        },
        BindingOrigin::Import {
            record: import,
            imported,
        } => resolve_import_inner(set, module, *import, imported, visited),
    }
}

fn resolve_import_inner(
    set: &dyn ModuleSet,
    importer: &ModuleId,
    record: usize,
    imported: &ImportedName,
    visited: &mut Visited,
) -> ResolvedExport {
    let Some(importer_record) = set.record(importer) else {
        return ResolvedExport::Missing;
    };
    let Some(specifier) = importer_record.imports.get(record).map(|r| r.specifier.as_str()) else {
        return ResolvedExport::Missing;
    };
    let Some(target) = set.import_target(importer, specifier) else {
        return ResolvedExport::Missing;
    };

    if set.record(target).is_none() {
        return ResolvedExport::External {
            module: target.clone(),
            name: imported.clone(),
        };
    }
    match imported.export_name() {
        None => ResolvedExport::Namespace {
            module: target.clone(),
        },
        Some(name) => resolve_export_inner(set, target, name, visited),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_module;
    use crate::module_id::SourceKind;
    use rustc_hash::FxHashMap;
    use std::sync::Arc;

    /// Modules under `/src`; `./name.js` resolves to `/src/name.js`, bare
    /// specifiers to packages.
    struct Fixture {
        records: FxHashMap<ModuleId, ModuleRecord>,
        targets: FxHashMap<(ModuleId, String), ModuleId>,
    }

    impl Fixture {
        fn new(modules: &[(&str, &str)]) -> Self {
            let mut records = FxHashMap::default();
            let mut targets = FxHashMap::default();
            for (name, source) in modules {
                let id = ModuleId::file(format!("/src/{name}"));
                let record =
                    analyze_module(id.clone(), SourceKind::Internal, Arc::from(*source)).unwrap();
                for import in &record.imports {
                    let target = match import.specifier.strip_prefix("./") {
                        Some(rest) => ModuleId::file(format!("/src/{rest}")),
                        None => ModuleId::package(import.specifier.clone()),
                    };
                    targets.insert((id.clone(), import.specifier.clone()), target);
                }
                records.insert(id, record);
            }
            Self { records, targets }
        }
    }

    impl ModuleSet for Fixture {
        fn record(&self, id: &ModuleId) -> Option<&ModuleRecord> {
            self.records.get(id)
        }

        fn import_target(&self, importer: &ModuleId, specifier: &str) -> Option<&ModuleId> {
            self.targets.get(&(importer.clone(), specifier.to_string()))
        }
    }

    fn id(name: &str) -> ModuleId {
        ModuleId::file(format!("/src/{name}"))
    }

    fn binding_of(fixture: &Fixture, module: &str, name: &str) -> ResolvedExport {
        let record = &fixture.records[&id(module)];
        let binding = record
            .bindings
            .iter()
            .position(|b| b.name == name)
            .expect("binding exists");
        ResolvedExport::Binding {
            module: id(module),
            binding,
        }
    }

    #[test]
    fn test_follows_reexport_chains() {
        let fixture = Fixture::new(&[
            ("index.js", "export { f as g } from './mid.js';\nimport { h } from './mid.js';\nexport { h };\n"),
            ("mid.js", "export * from './leaf.js';\nexport { h } from './leaf.js';\n"),
            ("leaf.js", "export function f() {}\nexport const h = 1;\n"),
        ]);

        assert_eq!(resolve_export(&fixture, &id("index.js"), "g"), binding_of(&fixture, "leaf.js", "f"));
        assert_eq!(resolve_export(&fixture, &id("index.js"), "h"), binding_of(&fixture, "leaf.js", "h"));
        assert_eq!(resolve_export(&fixture, &id("index.js"), "f"), ResolvedExport::Missing);
    }

    #[test]
    fn test_namespace_and_external_imports() {
        let fixture = Fixture::new(&[
            ("index.js", "import * as ns from './leaf.js';\nimport React from 'react';\nexport { ns, React };\nexport * as all from './leaf.js';\n"),
            ("leaf.js", "export const x = 1;\n"),
        ]);

        assert_eq!(
            resolve_export(&fixture, &id("index.js"), "ns"),
            ResolvedExport::Namespace { module: id("leaf.js") }
        );
        assert_eq!(
            resolve_export(&fixture, &id("index.js"), "all"),
            ResolvedExport::Namespace { module: id("leaf.js") }
        );
        assert_eq!(
            resolve_export(&fixture, &id("index.js"), "React"),
            ResolvedExport::External {
                module: ModuleId::package("react"),
                name: ImportedName::Default
            }
        );
    }

    #[test]
    fn test_ambiguous_star_names_are_dropped() {
        let fixture = Fixture::new(&[
            ("index.js", "export * from './a.js';\nexport * from './b.js';\nexport * from 'ext';\n"),
            ("a.js", "export const dup = 1;\nexport const onlyA = 2;\nexport default 3;\n"),
            ("b.js", "export const dup = 4;\n"),
        ]);

        let table = export_table(&fixture, &id("index.js"));
        let names: Vec<_> = table.names.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["onlyA"]);
        assert_eq!(table.external_stars, vec![ModuleId::package("ext")]);
        assert_eq!(resolve_export(&fixture, &id("index.js"), "dup"), ResolvedExport::Missing);
    }

    #[test]
    fn test_star_cycles_terminate() {
        let fixture = Fixture::new(&[
            ("a.js", "export * from './b.js';\nexport const a = 1;\n"),
            ("b.js", "export * from './a.js';\nexport const b = 2;\n"),
        ]);

        assert_eq!(resolve_export(&fixture, &id("a.js"), "b"), binding_of(&fixture, "b.js", "b"));
        assert_eq!(resolve_export(&fixture, &id("a.js"), "zzz"), ResolvedExport::Missing);
        let table = export_table(&fixture, &id("a.js"));
        let names: Vec<_> = table.names.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_same_origin_through_two_stars_is_not_ambiguous() {
        let fixture = Fixture::new(&[
            ("index.js", "export * from './a.js';\nexport * from './b.js';\n"),
            ("a.js", "export * from './leaf.js';\n"),
            ("b.js", "export * from './leaf.js';\n"),
            ("leaf.js", "export const x = 1;\n"),
        ]);

        assert_eq!(resolve_export(&fixture, &id("index.js"), "x"), binding_of(&fixture, "leaf.js", "x"));
    }
}
