//! Target orchestration.
//!
//! A build runs in two phases:
//!
//! 1. **Graphs**: every target's dependency graph is built concurrently
//!    against one [`BuildCache`], so a module shared by several targets is
//!    read and analyzed once.
//! 2. **Generation**: each target with a graph is generated in a bounded
//!    worker pool (code generation, transform pipeline, declarations).
//!
//! Target failures are collected into that target's [`TargetReport`]; only a
//! cycle that cannot be ordered or a cancellation aborts the whole build.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bale_graph::{
    BuildCache, CancellationToken, EdgeFilter, GraphBuilder, GraphError, ModuleGraph,
    ModuleResolver, Runtime, TreeShaker,
};
use rustc_hash::FxHashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::artifact::{Artifact, ArtifactKind, SourceMapFile};
use crate::codegen::GeneratedUnit;
use crate::codegen::bundle::{BundleInput, BundleMode, link};
use crate::codegen::separate::{self, SeparateInput};
use crate::declarations::DeclarationCache;
use crate::diagnostics::BuildError;
use crate::plan::BuildPlan;
use crate::target::{OutputFormat, Target};
use crate::transform::Pipeline;
use crate::{Error, Result};

/// Outcome of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: String,
    /// Emitted artifacts; empty when a fatal error occurred.
    pub artifacts: Vec<Artifact>,
    pub errors: Vec<BuildError>,
    /// Code was emitted but the declaration document failed.
    pub partial: bool,
}

impl TargetReport {
    fn failed(target: &Target, errors: Vec<BuildError>) -> Self {
        Self {
            target: target.name.clone(),
            artifacts: Vec::new(),
            errors,
            partial: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn artifact(&self, path: impl AsRef<Path>) -> Option<&Artifact> {
        let path = path.as_ref();
        self.artifacts.iter().find(|artifact| artifact.path == path)
    }
}

/// Counters describing the shared work of one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Module identities in the build cache.
    pub modules: usize,
    /// Module analyses performed (at most one per module).
    pub analyses: usize,
    /// Declaration documents synthesized.
    pub declaration_documents: usize,
}

/// Outcome of a whole build, one report per declared target in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub targets: Vec<TargetReport>,
    pub stats: BuildStats,
}

impl BuildReport {
    /// The build succeeds only if no target reported an error.
    pub fn is_success(&self) -> bool {
        self.targets.iter().all(TargetReport::is_success)
    }

    pub fn target(&self, name: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|report| report.target == name)
    }

    /// Every error with the name of its target.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &BuildError)> {
        self.targets.iter().flat_map(|report| {
            report
                .errors
                .iter()
                .map(move |err| (report.target.as_str(), err))
        })
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.targets.iter().flat_map(|report| report.artifacts.iter())
    }

    /// Human-readable per-target outcome.
    pub fn summary(&self) -> String {
        let failed = self
            .targets
            .iter()
            .filter(|report| !report.is_success() && !report.partial)
            .count();
        let partial = self.targets.iter().filter(|report| report.partial).count();
        let succeeded = self.targets.len() - failed - partial;

        let mut out = format!(
            "{} targets: {succeeded} succeeded, {partial} partial, {failed} failed\n",
            self.targets.len()
        );
        for report in &self.targets {
            let status = if report.is_success() {
                "ok"
            } else if report.partial {
                "partial"
            } else {
                "failed"
            };
            out.push_str(&format!(
                "  {}: {status}, {} artifacts\n",
                report.target,
                report.artifacts.len()
            ));
            for err in &report.errors {
                out.push_str(&format!("    [{}] {err}\n", err.class()));
                if let Some(chain) = err.chain() {
                    out.push_str(&format!("      import chain: {chain}\n"));
                }
            }
        }
        out
    }
}

/// Builds every target of a [`BuildPlan`].
///
/// Each call to [`Bundler::build`] uses fresh module and declaration caches.
#[derive(Debug, Clone)]
pub struct Bundler {
    runtime: Arc<dyn Runtime>,
}

impl Bundler {
    pub fn new(runtime: Arc<dyn Runtime>) -> Self {
        Self { runtime }
    }

    /// Build every target of `plan`.
    ///
    /// Returns `Err` only for build-wide failures: an invalid plan, a cycle
    /// without an evaluation order, or cancellation. Everything else is
    /// reported per target.
    pub async fn build(&self, plan: &BuildPlan, cancel: &CancellationToken) -> Result<BuildReport> {
        plan.validate()?;
        let width = plan
            .max_parallel
            .unwrap_or_else(|| num_cpus::get().min(8));
        let root: Arc<Path> = Arc::from(plan.root());
        let targets: Vec<Arc<Target>> = plan.targets.iter().cloned().map(Arc::new).collect();

        tracing::info!(targets = targets.len(), parallel = width, root = %root.display(), "Starting build");

        let cache = Arc::new(BuildCache::new());
        let resolver = Arc::new(ModuleResolver::new(plan.resolve.clone(), self.runtime.clone()));
        let graphs = self
            .build_graphs(&targets, resolver, cache.clone(), width, cancel)
            .await?;

        let declarations = Arc::new(DeclarationCache::new());
        let mut reports = generate_targets(
            &targets,
            graphs,
            root,
            declarations.clone(),
            width,
            cancel,
        )
        .await?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        for report in &mut reports {
            report.artifacts.sort_by(|a, b| a.path.cmp(&b.path));
        }
        let report = BuildReport {
            targets: reports,
            stats: BuildStats {
                modules: cache.len(),
                analyses: cache.total_analyses(),
                declaration_documents: declarations.syntheses(),
            },
        };
        tracing::info!(
            success = report.is_success(),
            analyses = report.stats.analyses,
            "Build finished"
        );
        Ok(report)
    }

    /// Phase 1: one graph per target, in plan order.
    async fn build_graphs(
        &self,
        targets: &[Arc<Target>],
        resolver: Arc<ModuleResolver>,
        cache: Arc<BuildCache>,
        width: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<std::result::Result<Arc<ModuleGraph>, GraphError>>> {
        let semaphore = Arc::new(Semaphore::new(width));
        let mut join_set = JoinSet::new();
        let mut indices = FxHashMap::default();

        for (index, target) in targets.iter().enumerate() {
            let builder = GraphBuilder::new(resolver.clone(), cache.clone(), self.runtime.clone())
                .external_policy(target.external)
                .conditions(target.platform.conditions().to_vec());
            let entries = target.entries.clone();
            let cancel = cancel.clone();
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| Error::Task(err.to_string()))?;

            let handle = join_set.spawn(async move {
                let _permit = permit;
                builder.build(&entries, &cancel).await.map(Arc::new)
            });
            indices.insert(handle.id(), index);
        }

        let mut graphs: Vec<Option<std::result::Result<Arc<ModuleGraph>, GraphError>>> =
            vec![None; targets.len()];
        while let Some(joined) = join_set.join_next_with_id().await {
            let (id, outcome) = joined.map_err(|err| Error::Task(err.to_string()))?;
            match outcome {
                Err(GraphError::Cancelled) => return Err(Error::Cancelled),
                Err(err @ GraphError::CycleDeadlock { .. }) => return Err(Error::Graph(err)),
                outcome => {
                    if let Some(index) = indices.get(&id) {
                        if let Ok(graph) = &outcome {
                            tracing::debug!(
                                target = %targets[*index].name,
                                modules = graph.len(),
                                cycles = graph.cycles().len(),
                                "Graph built"
                            );
                        }
                        graphs[*index] = Some(outcome);
                    }
                }
            }
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        graphs
            .into_iter()
            .map(|graph| graph.ok_or_else(|| Error::Task("a graph task did not report".to_string())))
            .collect()
    }
}

/// Phase 2: generate every target whose graph was built.
async fn generate_targets(
    targets: &[Arc<Target>],
    graphs: Vec<std::result::Result<Arc<ModuleGraph>, GraphError>>,
    root: Arc<Path>,
    declarations: Arc<DeclarationCache>,
    width: usize,
    cancel: &CancellationToken,
) -> Result<Vec<TargetReport>> {
    let semaphore = Arc::new(Semaphore::new(width));
    let mut join_set = JoinSet::new();
    let mut indices = FxHashMap::default();
    let mut reports: Vec<Option<TargetReport>> = vec![None; targets.len()];

    for (index, (target, graph)) in targets.iter().zip(graphs).enumerate() {
        let graph = match graph {
            Ok(graph) => graph,
            Err(err) => {
                tracing::warn!(target = %target.name, error = %err, "Target graph failed");
                reports[index] = Some(TargetReport::failed(target, vec![err.into()]));
                continue;
            }
        };
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| Error::Task(err.to_string()))?;
        let (target, root, declarations, cancel) = (
            target.clone(),
            root.clone(),
            declarations.clone(),
            cancel.clone(),
        );

        let handle = join_set.spawn(async move {
            let _permit = permit;
            generate_target(target, graph, root, declarations, cancel).await
        });
        indices.insert(handle.id(), index);
    }

    while let Some(joined) = join_set.join_next_with_id().await {
        match joined {
            Ok((id, report)) => {
                if let Some(index) = indices.get(&id) {
                    reports[*index] = Some(report);
                }
            }
            Err(err) => {
                // A panicking target is reported, not propagated.
                if let Some(index) = indices.get(&err.id()) {
                    let target = &targets[*index];
                    reports[*index] = Some(TargetReport::failed(
                        target,
                        vec![BuildError::generation(
                            target.name.clone(),
                            format!("target task failed: {err}"),
                        )],
                    ));
                }
            }
        }
    }

    reports
        .into_iter()
        .map(|report| report.ok_or_else(|| Error::Task("a target task did not report".to_string())))
        .collect()
}

async fn generate_target(
    target: Arc<Target>,
    graph: Arc<ModuleGraph>,
    root: Arc<Path>,
    declarations: Arc<DeclarationCache>,
    cancel: CancellationToken,
) -> TargetReport {
    let (code_target, code_graph, code_root) = (target.clone(), graph.clone(), root.clone());
    let generated =
        tokio::task::spawn_blocking(move || generate_code(&code_target, &code_graph, &code_root))
            .await;
    let (mut artifacts, mut errors) = match generated {
        Ok(outcome) => outcome,
        Err(err) => (
            Vec::new(),
            vec![BuildError::generation(
                target.name.clone(),
                format!("code generation task failed: {err}"),
            )],
        ),
    };

    if target.declarations && target.format.is_library() && errors.is_empty() {
        match declarations
            .document(graph, &root, target.strip_internal)
            .await
        {
            Ok(document) => artifacts.push(Artifact {
                target: target.name.clone(),
                format: target.format,
                kind: ArtifactKind::Declarations,
                path: target.out_dir.join(format!("{}.d.ts", target.name)),
                content: document.to_string(),
                sourcemap: None,
            }),
            Err(failures) => errors.extend(failures),
        }
    }

    // Checkpoint: a cancelled build publishes nothing from this target.
    if cancel.is_cancelled() {
        return TargetReport::failed(&target, vec![GraphError::Cancelled.into()]);
    }

    let fatal = errors.iter().any(|err| err.class().is_fatal_to_target());
    if fatal {
        artifacts.clear();
    }
    let partial = !errors.is_empty() && !fatal;
    if errors.is_empty() {
        tracing::info!(target = %target.name, artifacts = artifacts.len(), "Target built");
    } else {
        tracing::warn!(target = %target.name, errors = errors.len(), partial, "Target failed");
    }

    TargetReport {
        target: target.name.clone(),
        artifacts,
        errors,
        partial,
    }
}

/// JavaScript artifacts of one target; errors are collected per unit.
fn generate_code(target: &Target, graph: &ModuleGraph, root: &Path) -> (Vec<Artifact>, Vec<BuildError>) {
    let pipeline = Pipeline::for_target(target);
    let mut artifacts = Vec::new();
    let mut errors = Vec::new();

    match target.format {
        OutputFormat::Bundle => {
            let order = graph.order(EdgeFilter::Value);
            let shake = TreeShaker::new(graph, order, graph.entries())
                .enabled(target.tree_shake)
                .shake();
            let path = target
                .out_dir
                .join(format!("{}.{}", target.name, target.format.extension()));
            let unit = link(&BundleInput {
                set: graph,
                modules: order,
                entries: graph.entries(),
                shake: &shake,
                mode: BundleMode::Code,
                root,
                path,
            })
            .and_then(|unit| pipeline.run(unit));
            match unit {
                Ok(unit) => artifacts.push(artifact(target, ArtifactKind::Bundle, unit)),
                Err(err) => errors.push(err),
            }
        }
        OutputFormat::Esm | OutputFormat::Cjs => {
            let units = separate::generate(&SeparateInput {
                graph,
                format: target.format,
                root,
                out_dir: &target.out_dir,
            });
            match units {
                Ok(units) => {
                    for unit in units {
                        match pipeline.run(unit) {
                            Ok(unit) => artifacts.push(artifact(target, ArtifactKind::Module, unit)),
                            Err(err) => errors.push(err),
                        }
                    }
                }
                Err(err) => errors.push(err),
            }
        }
    }
    (artifacts, errors)
}

fn artifact(target: &Target, kind: ArtifactKind, unit: GeneratedUnit) -> Artifact {
    let sourcemap = unit.sourcemap.map(|content| SourceMapFile {
        path: map_path(&unit.path),
        content,
    });
    Artifact {
        target: target.name.clone(),
        format: target.format,
        kind,
        path: unit.path,
        content: unit.code,
        sourcemap,
    }
}

fn map_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".map");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Platform;
    use bale_graph::MemoryRuntime;

    fn runtime() -> Arc<MemoryRuntime> {
        Arc::new(
            MemoryRuntime::new("/app")
                .with_file("src/a.ts", "import { g } from './b';\nexport function f(): number { return 1; }\n")
                .with_file("src/b.ts", "export function g(): number { return 2; }\n"),
        )
    }

    #[test]
    fn test_map_path() {
        assert_eq!(map_path(Path::new("dist/app.js")), PathBuf::from("dist/app.js.map"));
    }

    #[tokio::test]
    async fn test_reports_follow_plan_order() {
        let plan = BuildPlan::new("/app")
            .target(Target::bundle("bundle").entry("src/a.ts"))
            .target(Target::cjs("cjs").entry("src/a.ts").out_dir("dist/cjs"))
            .target(Target::esm("esm").entry("src/a.ts").out_dir("dist/esm"))
            .max_parallel(2);
        let report = Bundler::new(runtime())
            .build(&plan, &CancellationToken::new())
            .await
            .unwrap();

        let names: Vec<&str> = report.targets.iter().map(|t| t.target.as_str()).collect();
        assert_eq!(names, vec!["bundle", "cjs", "esm"]);
        assert!(report.is_success(), "{}", report.summary());
        assert_eq!(report.stats.analyses, 2);
    }

    #[tokio::test]
    async fn test_invalid_plan_is_rejected() {
        let err = Bundler::new(runtime())
            .build(&BuildPlan::new("/app"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPlan(_)));
    }

    #[tokio::test]
    async fn test_missing_entry_fails_only_its_target() {
        let plan = BuildPlan::new("/app")
            .target(Target::esm("good").entry("src/a.ts"))
            .target(
                Target::bundle("bad")
                    .entry("src/missing.ts")
                    .platform(Platform::Browser)
                    .global_name("Bad"),
            );
        let report = Bundler::new(runtime())
            .build(&plan, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.is_success());
        assert!(report.target("good").unwrap().is_success());
        let bad = report.target("bad").unwrap();
        assert!(bad.artifacts.is_empty());
        assert!(!bad.partial);
        assert_eq!(report.errors().count(), 1);
        assert!(report.summary().contains("bad: failed"));
    }

    #[tokio::test]
    async fn test_cancelled_build_publishes_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let plan = BuildPlan::new("/app").target(Target::esm("esm").entry("src/a.ts"));
        let err = Bundler::new(runtime()).build(&plan, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
