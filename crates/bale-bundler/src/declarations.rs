//! Declaration documents.
//!
//! Every internal module reachable through value or type imports is turned
//! into declaration text with OXC's isolated declarations (signatures must be
//! explicit; nothing is inferred across modules). The per-module texts are
//! then linked like a bundle, without tree-shaking, into one document
//! exposing the entry modules' full export surface.
//!
//! Documents depend only on the ordered entry list and `strip_internal`,
//! never on the output format, so library targets with the same entries
//! share one computation through [`DeclarationCache`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bale_graph::oxc::{Allocator, Codegen, IsolatedDeclarations, IsolatedDeclarationsOptions, Parser, SourceType};
use bale_graph::{
    EdgeFilter, ModuleGraph, ModuleId, ModuleRecord, ModuleSet, SourceKind, TreeShaker,
    analyze_declaration,
};
use dashmap::DashMap;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tokio::sync::OnceCell;

use crate::codegen::bundle::{BundleInput, BundleMode, link};
use crate::diagnostics::BuildError;
use crate::transform::esm_frame;

/// Outcome of synthesizing one document.
pub type DeclarationResult = Result<Arc<str>, Vec<BuildError>>;

/// Declaration text for one module.
pub(crate) fn synthesize_module(record: &ModuleRecord, strip_internal: bool) -> Result<String, Vec<String>> {
    let path = record.id.path().map(Path::to_path_buf).unwrap_or_default();
    let source_type = SourceType::from_path(&path).map_err(|err| vec![err.to_string()])?;

    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, &record.source, source_type).parse();
    if !parsed.errors.is_empty() {
        return Err(parsed.errors.iter().map(|e| e.to_string()).collect());
    }

    let options = IsolatedDeclarationsOptions { strip_internal };
    let declarations = IsolatedDeclarations::new(&allocator, options).build(&parsed.program);
    if !declarations.errors.is_empty() {
        return Err(declarations.errors.iter().map(|e| e.to_string()).collect());
    }

    Ok(Codegen::new().build(&declarations.program).code)
}

/// Declaration records linked through the graph's edges.
///
/// Imports of modules outside the set (packages, inlined package files)
/// stay external by their specifier.
struct DeclarationSet {
    records: IndexMap<ModuleId, ModuleRecord>,
    targets: FxHashMap<(ModuleId, String), ModuleId>,
}

impl DeclarationSet {
    fn new(graph: &ModuleGraph, records: IndexMap<ModuleId, ModuleRecord>) -> Self {
        let mut targets = FxHashMap::default();
        for (id, record) in &records {
            for import in &record.imports {
                let target = graph
                    .import_target(id, &import.specifier)
                    .filter(|target| records.contains_key(*target))
                    .cloned()
                    .unwrap_or_else(|| ModuleId::package(import.specifier.as_str()));
                targets.insert((id.clone(), import.specifier.clone()), target);
            }
        }
        Self { records, targets }
    }
}

impl ModuleSet for DeclarationSet {
    fn record(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.records.get(id)
    }

    fn import_target(&self, importer: &ModuleId, specifier: &str) -> Option<&ModuleId> {
        self.targets.get(&(importer.clone(), specifier.to_string()))
    }
}

/// Synthesize the declaration document for `graph`'s entries.
pub(crate) fn synthesize(graph: &ModuleGraph, root: &Path, strip_internal: bool) -> DeclarationResult {
    let mut records = IndexMap::new();
    let mut errors = Vec::new();
    for id in graph.order(EdgeFilter::All) {
        let Some(record) = graph.record(id) else {
            continue;
        };
        if record.kind != SourceKind::Internal {
            continue;
        }
        let declaration = if record.is_declaration {
            Ok(ModuleRecord::clone(record))
        } else {
            synthesize_module(record, strip_internal)
                .map_err(|messages| BuildError::TypeInference {
                    module: id.clone(),
                    messages,
                    chain: graph.chain_to(id),
                })
                .and_then(|text| {
                    analyze_declaration(id.clone(), record.kind, Arc::from(text))
                        .map_err(|err| BuildError::from(err.with_chain(graph.chain_to(id))))
                })
        };
        match declaration {
            Ok(declaration) => {
                records.insert(id.clone(), declaration);
            }
            Err(err) => errors.push(err),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let order: Vec<ModuleId> = records.keys().cloned().collect();
    let entries: Vec<ModuleId> = graph
        .entries()
        .iter()
        .filter(|entry| records.contains_key(*entry))
        .cloned()
        .collect();
    let set = DeclarationSet::new(graph, records);
    let shake = TreeShaker::new(&set, &order, &entries).enabled(false).shake();

    let unit = link(&BundleInput {
        set: &set,
        modules: &order,
        entries: &entries,
        shake: &shake,
        mode: BundleMode::Declarations,
        root,
        path: PathBuf::from("index.d.ts"),
    })
    .map_err(|err| vec![err])?;
    let interface = unit.interface.clone().unwrap_or_default();
    let document = esm_frame(&interface, true).apply(unit);

    tracing::debug!(modules = order.len(), "Synthesized declaration document");
    Ok(Arc::from(document.code))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DocumentKey {
    entries: Vec<ModuleId>,
    strip_internal: bool,
}

type DocumentSlot = Arc<OnceCell<DeclarationResult>>;

/// Build-wide declaration documents, computed at most once per entry list.
#[derive(Debug, Default)]
pub struct DeclarationCache {
    documents: DashMap<DocumentKey, DocumentSlot>,
    syntheses: AtomicUsize,
}

impl DeclarationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The document for `graph`'s entries, synthesizing it on first request.
    pub async fn document(
        &self,
        graph: Arc<ModuleGraph>,
        root: &Path,
        strip_internal: bool,
    ) -> DeclarationResult {
        // Entry order decides which entry's export wins a name clash.
        let key = DocumentKey {
            entries: graph.entries().to_vec(),
            strip_internal,
        };
        // The map guard must be released before awaiting the cell.
        let slot = self.documents.entry(key).or_default().clone();

        slot.get_or_init(|| async {
            self.syntheses.fetch_add(1, Ordering::Relaxed);
            let root = root.to_path_buf();
            tokio::task::spawn_blocking(move || synthesize(&graph, &root, strip_internal))
                .await
                .unwrap_or_else(|err| {
                    Err(vec![BuildError::generation(
                        "declarations",
                        format!("declaration task failed: {err}"),
                    )])
                })
        })
        .await
        .clone()
    }

    /// Number of documents synthesized in this build.
    pub fn syntheses(&self) -> usize {
        self.syntheses.load(Ordering::Relaxed)
    }
}
