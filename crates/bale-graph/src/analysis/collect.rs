//! Top-level statement and binding collection over a parsed program.

use indexmap::IndexMap;
use oxc_ast::ast::{
    AssignmentTargetPropertyIdentifier, BindingIdentifier, BindingProperty, CallExpression,
    Declaration, ExportDefaultDeclarationKind, Expression, IdentifierReference,
    ImportDeclarationSpecifier, ModuleExportName, ObjectProperty, Program, Statement,
    TSModuleDeclarationName,
};
use oxc_ast_visit::{Visit, walk};
use oxc_semantic::{ReferenceId, Scoping, SymbolId};
use oxc_span::{GetSpan, Span};
use rustc_hash::{FxHashMap, FxHashSet};

use super::record::{
    BindingIdx, BindingOrigin, DefaultExportKind, ExportRecord, ImportRecord, ImportedName,
    LocalBinding, ReferenceEdit, ReferenceSite, StatementKind, StatementRecord,
};
use super::side_effects::SideEffects;
use crate::module_id::ModuleId;

pub(crate) struct Collected {
    pub imports: Vec<ImportRecord>,
    pub bindings: Vec<LocalBinding>,
    pub exports: Vec<ExportRecord>,
    pub statements: Vec<StatementRecord>,
    pub globals: FxHashSet<String>,
    pub nested_names: FxHashSet<String>,
}

/// Identifier positions gathered in one walk over the program.
#[derive(Default)]
struct ReferenceScan {
    spans: FxHashMap<ReferenceId, Span>,
    names: Vec<(ReferenceId, String)>,
    shorthands: FxHashSet<u32>,
    callees: FxHashSet<u32>,
}

impl<'a> Visit<'a> for ReferenceScan {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        if let Some(reference_id) = it.reference_id.get() {
            self.spans.insert(reference_id, it.span);
            self.names.push((reference_id, it.name.to_string()));
        }
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            self.shorthands.insert(it.span.start);
        }
        walk::walk_object_property(self, it);
    }

    fn visit_binding_property(&mut self, it: &BindingProperty<'a>) {
        if it.shorthand {
            self.shorthands.insert(it.span.start);
        }
        walk::walk_binding_property(self, it);
    }

    fn visit_assignment_target_property_identifier(
        &mut self,
        it: &AssignmentTargetPropertyIdentifier<'a>,
    ) {
        self.shorthands.insert(it.binding.span.start);
        walk::walk_assignment_target_property_identifier(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee {
            self.callees.insert(callee.span.start);
        }
        walk::walk_call_expression(self, it);
    }
}

struct Collector<'s> {
    scoping: &'s Scoping,
    module: &'s ModuleId,
    imports: IndexMap<String, ImportRecord>,
    bindings: Vec<LocalBinding>,
    symbols: FxHashMap<SymbolId, BindingIdx>,
    binding_symbols: Vec<Option<SymbolId>>,
    /// Declaring identifier spans per binding (several for merged declarations).
    declaration_spans: Vec<Vec<Span>>,
    statement_declares: Vec<Vec<BindingIdx>>,
}

/// Collect records for `program`.
///
/// `original_specifiers` lists the specifiers of the pre-transpile source;
/// those missing from `program` become type-only import records.
pub(crate) fn collect(
    program: &Program<'_>,
    scoping: &Scoping,
    module: &ModuleId,
    declaration_mode: bool,
    original_specifiers: Option<&[String]>,
) -> Collected {
    let mut imports = IndexMap::new();
    for specifier in original_specifiers.unwrap_or_default() {
        imports.insert(
            specifier.clone(),
            ImportRecord {
                specifier: specifier.clone(),
                type_only: true,
            },
        );
    }

    let mut collector = Collector {
        scoping,
        module,
        imports,
        bindings: Vec::new(),
        symbols: FxHashMap::default(),
        binding_symbols: Vec::new(),
        declaration_spans: Vec::new(),
        statement_declares: vec![Vec::new(); program.body.len()],
    };

    for (index, stmt) in program.body.iter().enumerate() {
        collector.declare_statement(index, stmt);
    }

    let mut scan = ReferenceScan::default();
    scan.visit_program(program);

    let statement_spans: Vec<Span> = program.body.iter().map(GetSpan::span).collect();
    let mut edits = collector.reference_edits(&scan, &statement_spans);
    let globals: FxHashSet<String> = scan
        .names
        .iter()
        .filter(|(reference_id, _)| scoping.get_reference(*reference_id).symbol_id().is_none())
        .map(|(_, name)| name.clone())
        .collect();
    let side_effects = SideEffects::new(&globals);

    let mut exports: Vec<ExportRecord> = Vec::new();
    let mut statements = Vec::with_capacity(program.body.len());
    for (index, stmt) in program.body.iter().enumerate() {
        let (kind, source_span) = collector.statement_kind(index, stmt, &mut exports);
        let declares = std::mem::take(&mut collector.statement_declares[index]);
        let statement_edits = std::mem::take(&mut edits[index]);
        let mut references: Vec<BindingIdx> = Vec::new();
        for edit in &statement_edits {
            if !edit.is_declaration
                && !declares.contains(&edit.binding)
                && !references.contains(&edit.binding)
            {
                references.push(edit.binding);
            }
        }
        statements.push(StatementRecord {
            span: statement_spans[index],
            kind,
            declares,
            references,
            edits: statement_edits,
            source_span,
            has_side_effects: !declaration_mode && side_effects.statement(stmt),
        });
    }

    let root = scoping.root_scope_id();
    let nested_names = scoping
        .symbol_ids()
        .filter(|&symbol| scoping.symbol_scope_id(symbol) != root)
        .map(|symbol| scoping.symbol_name(symbol).to_string())
        .collect();

    Collected {
        imports: collector.imports.into_values().collect(),
        bindings: collector.bindings,
        exports,
        statements,
        globals,
        nested_names,
    }
}

impl Collector<'_> {
    fn import_record(&mut self, specifier: &str) -> usize {
        if let Some(index) = self.imports.get_index_of(specifier) {
            if let Some((_, record)) = self.imports.get_index_mut(index) {
                record.type_only = false;
            }
            return index;
        }
        let (index, _) = self.imports.insert_full(
            specifier.to_string(),
            ImportRecord {
                specifier: specifier.to_string(),
                type_only: false,
            },
        );
        index
    }

    fn declare(
        &mut self,
        statement: usize,
        ident: &BindingIdentifier<'_>,
        origin: BindingOrigin,
        type_only: bool,
    ) {
        let Some(symbol) = ident.symbol_id.get() else {
            return;
        };
        let span = name_span(ident);
        let binding = match self.symbols.get(&symbol) {
            Some(&existing) => existing,
            None => {
                let reassigned = self
                    .scoping
                    .get_resolved_reference_ids(symbol)
                    .iter()
                    .any(|&r| self.scoping.get_reference(r).is_write());
                self.bindings.push(LocalBinding {
                    name: ident.name.to_string(),
                    origin,
                    declaration: Some(span),
                    reassigned,
                    type_only,
                    synthetic: false,
                });
                self.binding_symbols.push(Some(symbol));
                self.declaration_spans.push(Vec::new());
                let idx = self.bindings.len() - 1;
                self.symbols.insert(symbol, idx);
                idx
            }
        };
        self.declaration_spans[binding].push(span);
        if !self.statement_declares[statement].contains(&binding) {
            self.statement_declares[statement].push(binding);
        }
    }

    fn declare_statement(&mut self, index: usize, stmt: &Statement<'_>) {
        let declared = BindingOrigin::Declared { statement: index };
        match stmt {
            Statement::ImportDeclaration(decl) => {
                let record = self.import_record(decl.source.value.as_str());
                let whole_type_only = decl.import_kind.is_type();
                for spec in decl.specifiers.iter().flatten() {
                    let (local, imported, type_only) = match spec {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => (
                            &s.local,
                            ImportedName::from_name(s.imported.name().as_str()),
                            s.import_kind.is_type(),
                        ),
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            (&s.local, ImportedName::Default, false)
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            (&s.local, ImportedName::Namespace, false)
                        }
                    };
                    let origin = BindingOrigin::Import { record, imported };
                    self.declare(index, local, origin, whole_type_only || type_only);
                }
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(declaration) = &decl.declaration {
                    self.declare_declaration(index, declaration);
                }
            }
            Statement::ExportDefaultDeclaration(decl) => match &decl.declaration {
                ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                    if let Some(id) = &func.id {
                        self.declare(index, id, declared, false);
                    }
                }
                ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                    if let Some(id) = &class.id {
                        self.declare(index, id, declared, false);
                    }
                }
                ExportDefaultDeclarationKind::TSInterfaceDeclaration(iface) => {
                    self.declare(index, &iface.id, declared, true);
                }
                _ => {}
            },
            _ => {
                if let Some(declaration) = stmt.as_declaration() {
                    self.declare_declaration(index, declaration);
                }
            }
        }
    }

    fn declare_declaration(&mut self, index: usize, declaration: &Declaration<'_>) {
        let origin = BindingOrigin::Declared { statement: index };
        match declaration {
            Declaration::VariableDeclaration(var) => {
                for declarator in &var.declarations {
                    for ident in declarator.id.get_binding_identifiers() {
                        self.declare(index, ident, origin.clone(), false);
                    }
                }
            }
            Declaration::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    self.declare(index, id, origin, false);
                }
            }
            Declaration::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    self.declare(index, id, origin, false);
                }
            }
            Declaration::TSTypeAliasDeclaration(alias) => {
                self.declare(index, &alias.id, origin, true);
            }
            Declaration::TSInterfaceDeclaration(iface) => {
                self.declare(index, &iface.id, origin, true);
            }
            Declaration::TSEnumDeclaration(decl) => {
                self.declare(index, &decl.id, origin, false);
            }
            Declaration::TSModuleDeclaration(decl) => {
                if let TSModuleDeclarationName::Identifier(id) = &decl.id {
                    self.declare(index, id, origin, false);
                }
            }
            Declaration::TSImportEqualsDeclaration(decl) => {
                self.declare(index, &decl.id, origin, false);
            }
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }

    /// Bucket every occurrence of a top-level binding by statement.
    fn reference_edits(
        &self,
        scan: &ReferenceScan,
        statement_spans: &[Span],
    ) -> Vec<Vec<ReferenceEdit>> {
        let mut edits: Vec<Vec<ReferenceEdit>> = vec![Vec::new(); statement_spans.len()];
        let site = |start: u32| {
            if scan.shorthands.contains(&start) {
                ReferenceSite::Shorthand
            } else if scan.callees.contains(&start) {
                ReferenceSite::Callee
            } else {
                ReferenceSite::Plain
            }
        };

        for (binding, symbol) in self.binding_symbols.iter().enumerate() {
            let Some(symbol) = symbol else { continue };
            for &span in &self.declaration_spans[binding] {
                if let Some(stmt) = statement_at(statement_spans, span.start) {
                    edits[stmt].push(ReferenceEdit {
                        span,
                        binding,
                        site: site(span.start),
                        is_declaration: true,
                    });
                }
            }
            for reference_id in self.scoping.get_resolved_reference_ids(*symbol) {
                let Some(&span) = scan.spans.get(reference_id) else {
                    continue;
                };
                if let Some(stmt) = statement_at(statement_spans, span.start) {
                    edits[stmt].push(ReferenceEdit {
                        span,
                        binding,
                        site: site(span.start),
                        is_declaration: false,
                    });
                }
            }
        }

        for statement_edits in &mut edits {
            statement_edits.sort_by_key(|e| e.span.start);
            statement_edits.dedup_by_key(|e| e.span.start);
        }
        edits
    }

    fn binding_for_reference(&self, ident: &IdentifierReference<'_>) -> Option<BindingIdx> {
        let reference_id = ident.reference_id.get()?;
        let symbol = self.scoping.get_reference(reference_id).symbol_id()?;
        self.symbols.get(&symbol).copied()
    }

    fn push_export(exports: &mut Vec<ExportRecord>, export: ExportRecord) {
        let duplicate = export.exported_name().is_some_and(|name| {
            exports.iter().any(|e| e.exported_name() == Some(name))
        });
        if !duplicate {
            exports.push(export);
        }
    }

    fn statement_kind(
        &mut self,
        index: usize,
        stmt: &Statement<'_>,
        exports: &mut Vec<ExportRecord>,
    ) -> (StatementKind, Option<Span>) {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                let record = self.import_record(decl.source.value.as_str());
                (StatementKind::Import { record }, Some(decl.source.span))
            }
            Statement::ExportAllDeclaration(decl) => {
                let record = self.import_record(decl.source.value.as_str());
                let export = match &decl.exported {
                    Some(exported) => ExportRecord::ReExport {
                        exported: exported.name().to_string(),
                        record,
                        imported: ImportedName::Namespace,
                    },
                    None => ExportRecord::Star { record },
                };
                Self::push_export(exports, export);
                (StatementKind::ReExport { record }, Some(decl.source.span))
            }
            Statement::ExportNamedDeclaration(decl) => {
                if let Some(source) = &decl.source {
                    let record = self.import_record(source.value.as_str());
                    for spec in &decl.specifiers {
                        Self::push_export(
                            exports,
                            ExportRecord::ReExport {
                                exported: spec.exported.name().to_string(),
                                record,
                                imported: ImportedName::from_name(spec.local.name().as_str()),
                            },
                        );
                    }
                    return (StatementKind::ReExport { record }, Some(source.span));
                }
                if let Some(declaration) = &decl.declaration {
                    for &binding in &self.statement_declares[index] {
                        Self::push_export(
                            exports,
                            ExportRecord::Local {
                                exported: self.bindings[binding].name.clone(),
                                binding,
                            },
                        );
                    }
                    let declaration_start = declaration.span().start;
                    return (StatementKind::ExportDeclaration { declaration_start }, None);
                }
                for spec in &decl.specifiers {
                    let ModuleExportName::IdentifierReference(local) = &spec.local else {
                        continue;
                    };
                    if let Some(binding) = self.binding_for_reference(local) {
                        Self::push_export(
                            exports,
                            ExportRecord::Local {
                                exported: spec.exported.name().to_string(),
                                binding,
                            },
                        );
                    }
                }
                (StatementKind::ExportList, None)
            }
            Statement::ExportDefaultDeclaration(decl) => {
                let body_start = decl.declaration.span().start;
                let named_binding = self.statement_declares[index].first().copied();
                let (kind, binding) = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(_)
                    | ExportDefaultDeclarationKind::ClassDeclaration(_)
                    | ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
                        match named_binding {
                            Some(binding) => (DefaultExportKind::Declaration, binding),
                            None => (DefaultExportKind::Anonymous, self.synthesize_default(index)),
                        }
                    }
                    other => {
                        let alias = match other.as_expression() {
                            Some(Expression::Identifier(ident)) => self
                                .binding_for_reference(ident)
                                .filter(|&b| !self.bindings[b].reassigned),
                            _ => None,
                        };
                        match alias {
                            Some(binding) => (DefaultExportKind::Alias, binding),
                            None => (DefaultExportKind::Expression, self.synthesize_default(index)),
                        }
                    }
                };
                Self::push_export(
                    exports,
                    ExportRecord::Local {
                        exported: "default".to_string(),
                        binding,
                    },
                );
                (StatementKind::ExportDefault { kind, body_start }, None)
            }
            _ => (StatementKind::Plain, None),
        }
    }

    /// Binding that holds an anonymous default export.
    fn synthesize_default(&mut self, statement: usize) -> BindingIdx {
        let stem = self.module.identifier_stem();
        self.bindings.push(LocalBinding {
            name: format!("{stem}_default"),
            origin: BindingOrigin::Declared { statement },
            declaration: None,
            reassigned: false,
            type_only: false,
            synthetic: true,
        });
        self.binding_symbols.push(None);
        self.declaration_spans.push(Vec::new());
        let idx = self.bindings.len() - 1;
        self.statement_declares[statement].push(idx);
        idx
    }
}

/// Index of the statement whose span contains `offset`.
/// Span of the bound name alone. In declaration text a binding's span also
/// covers its `: Type` annotation.
fn name_span(ident: &BindingIdentifier<'_>) -> Span {
    Span::new(ident.span.start, ident.span.start + ident.name.len() as u32)
}

fn statement_at(spans: &[Span], offset: u32) -> Option<usize> {
    let idx = spans.partition_point(|s| s.start <= offset).checked_sub(1)?;
    (offset < spans[idx].end).then_some(idx)
}
