//! Statement-level tree-shaking.
//!
//! Reachability starts from the entry modules' export surface and from every
//! module with top-level side effects (those are kept whole, so their
//! initialization order is preserved). It then propagates along the
//! references recorded per statement until a fixed point: a reachable
//! binding pulls in every statement declaring it, an included statement
//! makes every binding it references reachable, and an import binding is
//! followed to the module that declares the value.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::analysis::{BindingIdx, ModuleRecord, StatementKind};
use crate::linker::{ModuleSet, ResolvedExport, export_table, resolve_binding};
use crate::module_id::ModuleId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Item {
    Binding(ModuleId, BindingIdx),
    Statement(ModuleId, usize),
    Namespace(ModuleId),
}

/// Computes the statements a bundle has to keep.
pub struct TreeShaker<'a> {
    set: &'a dyn ModuleSet,
    modules: &'a [ModuleId],
    entries: &'a [ModuleId],
    enabled: bool,
}

/// Included statements, reachable bindings and required namespace objects.
#[derive(Debug, Clone, Default)]
pub struct ShakeResult {
    statements: FxHashMap<ModuleId, Vec<bool>>,
    bindings: FxHashMap<ModuleId, FxHashSet<BindingIdx>>,
    namespaces: FxHashSet<ModuleId>,
}

impl ShakeResult {
    pub fn is_statement_included(&self, module: &ModuleId, statement: usize) -> bool {
        self.statements
            .get(module)
            .and_then(|included| included.get(statement).copied())
            .unwrap_or(false)
    }

    pub fn is_binding_reachable(&self, module: &ModuleId, binding: BindingIdx) -> bool {
        self.bindings
            .get(module)
            .is_some_and(|reachable| reachable.contains(&binding))
    }

    /// Whether the namespace object of `module` is referenced.
    pub fn needs_namespace(&self, module: &ModuleId) -> bool {
        self.namespaces.contains(module)
    }

    pub fn included_statements(&self, module: &ModuleId) -> usize {
        self.statements
            .get(module)
            .map(|included| included.iter().filter(|&&kept| kept).count())
            .unwrap_or(0)
    }
}

impl<'a> TreeShaker<'a> {
    /// `modules` lists the modules to consider; `entries` provide the
    /// exported surface.
    pub fn new(set: &'a dyn ModuleSet, modules: &'a [ModuleId], entries: &'a [ModuleId]) -> Self {
        Self {
            set,
            modules,
            entries,
            enabled: true,
        }
    }

    /// With shaking disabled every statement is kept; namespace usage is
    /// still computed.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn shake(&self) -> ShakeResult {
        let mut result = ShakeResult::default();
        let mut seen: FxHashSet<Item> = FxHashSet::default();
        let mut work: Vec<Item> = Vec::new();

        for entry in self.entries {
            let table = export_table(self.set, entry);
            for resolved in table.names.values() {
                if let Some(item) = item_for(resolved) {
                    work.push(item);
                }
            }
        }
        for module in self.modules {
            let Some(record) = self.set.record(module) else {
                continue;
            };
            result
                .statements
                .insert(module.clone(), vec![false; record.statements.len()]);
            if !self.enabled || record.has_side_effects {
                for index in 0..record.statements.len() {
                    work.push(Item::Statement(module.clone(), index));
                }
            }
        }

        while let Some(item) = work.pop() {
            if !seen.insert(item.clone()) {
                continue;
            }
            match item {
                Item::Binding(module, binding) => {
                    let Some(record) = self.set.record(&module) else {
                        continue;
                    };
                    if record.bindings[binding].is_import() {
                        if let Some(next) = item_for(&resolve_binding(self.set, &module, binding)) {
                            work.push(next);
                        }
                        continue;
                    }
                    result
                        .bindings
                        .entry(module.clone())
                        .or_default()
                        .insert(binding);
                    for statement in declaring_statements(record, binding) {
                        work.push(Item::Statement(module.clone(), statement));
                    }
                }
                Item::Statement(module, index) => {
                    let Some(record) = self.set.record(&module) else {
                        continue;
                    };
                    if let Some(slot) = result
                        .statements
                        .get_mut(&module)
                        .and_then(|included| included.get_mut(index))
                    {
                        *slot = true;
                    }
                    let statement = &record.statements[index];
                    // Import bindings only matter where they are referenced.
                    let declares: &[BindingIdx] = match statement.kind {
                        StatementKind::Import { .. } | StatementKind::ReExport { .. } => &[],
                        _ => &statement.declares,
                    };
                    for &binding in declares.iter().chain(&statement.references) {
                        work.push(Item::Binding(module.clone(), binding));
                    }
                }
                Item::Namespace(module) => {
                    result.namespaces.insert(module.clone());
                    let table = export_table(self.set, &module);
                    for resolved in table.names.values() {
                        if let Some(item) = item_for(resolved) {
                            work.push(item);
                        }
                    }
                }
            }
        }

        let kept: usize = self
            .modules
            .iter()
            .map(|module| result.included_statements(module))
            .sum();
        tracing::debug!(
            modules = self.modules.len(),
            statements = kept,
            enabled = self.enabled,
            "tree-shaking complete"
        );
        result
    }
}

fn item_for(resolved: &ResolvedExport) -> Option<Item> {
    match resolved {
        ResolvedExport::Binding { module, binding } => Some(Item::Binding(module.clone(), *binding)),
        ResolvedExport::Namespace { module } => Some(Item::Namespace(module.clone())),
        ResolvedExport::External { .. } | ResolvedExport::Missing => None,
    }
}

/// Every statement declaring `binding`; overloads and merged declarations
/// spread one binding over several statements.
fn declaring_statements(record: &ModuleRecord, binding: BindingIdx) -> impl Iterator<Item = usize> + '_ {
    record
        .statements
        .iter()
        .enumerate()
        .filter(move |(_, statement)| statement.declares.contains(&binding))
        .map(|(index, _)| index)
}
