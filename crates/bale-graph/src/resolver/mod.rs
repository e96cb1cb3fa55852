//! Module resolution.
//!
//! Maps `(specifier, importer)` pairs to canonical [`ModuleId`]s. Relative,
//! absolute and aliased specifiers resolve to files through extension
//! inference and directory indexes; bare specifiers are reported as packages
//! and only resolved to files when a target inlines its dependencies.
//!
//! Results are memoized per `(specifier, importer directory)` for the whole
//! build, so every target sees the same identities.

pub mod aliases;
pub mod extensions;
pub mod package;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};

use crate::dependency_chain::DependencyChain;
use crate::error::{GraphError, GraphResult};
use crate::module_id::{ModuleId, SourceKind};
use crate::runtime::Runtime;

use aliases::resolve_path_alias;
use extensions::{DEFAULT_EXTENSIONS, resolve_with_extensions};
use package::{find_package_dir, resolve_package_entry, split_package_specifier};

/// Node.js built-in modules. Always left external.
const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// Resolver configuration shared by all targets of a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Project root; entry paths and alias targets are relative to it.
    pub root: PathBuf,
    /// Path aliases: specifier prefix → path relative to `root`.
    pub aliases: IndexMap<String, String>,
    /// Extensions probed in order when a specifier names no file.
    pub extensions: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::new(".")
    }
}

impl ResolveOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            aliases: IndexMap::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn alias(mut self, key: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.insert(key.into(), target.into());
        self
    }
}

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A file in the snapshot.
    Module { id: ModuleId, kind: SourceKind },
    /// A bare specifier naming a third-party package.
    Package { specifier: String },
    /// A Node.js built-in (`fs`, `node:path`).
    Builtin { specifier: String },
}

/// Shared, memoizing module resolver.
#[derive(Debug)]
pub struct ModuleResolver {
    options: ResolveOptions,
    root: PathBuf,
    runtime: Arc<dyn Runtime>,
    memo: DashMap<(PathBuf, String), Resolution>,
    package_memo: DashMap<(PathBuf, String, String), ModuleId>,
}

impl ModuleResolver {
    pub fn new(options: ResolveOptions, runtime: Arc<dyn Runtime>) -> Self {
        let root = options.root.clean();
        Self {
            options,
            root,
            runtime,
            memo: DashMap::new(),
            package_memo: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve an entry point given relative to the project root.
    pub async fn resolve_entry(&self, entry: &Path) -> GraphResult<ModuleId> {
        let candidate = if entry.is_absolute() {
            entry.clean()
        } else {
            self.root.join(entry).clean()
        };
        resolve_with_extensions(&candidate, &self.options.extensions, self.runtime.as_ref())
            .await
            .map(ModuleId::File)
            .ok_or_else(|| GraphError::UnresolvedImport {
                specifier: entry.to_string_lossy().into_owned(),
                importer: None,
                reason: "entry point does not exist".to_string(),
                chain: DependencyChain::default(),
            })
    }

    /// Resolve `specifier` as imported by `importer`.
    pub async fn resolve(&self, specifier: &str, importer: &ModuleId) -> GraphResult<Resolution> {
        let importer_dir = importer
            .path()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let key = (importer_dir, specifier.to_string());

        if let Some(hit) = self.memo.get(&key) {
            return Ok(hit.clone());
        }

        let resolution = self.resolve_uncached(specifier, &key.0, importer).await?;
        tracing::trace!(specifier, importer = %importer, ?resolution, "resolved");
        self.memo.insert(key, resolution.clone());
        Ok(resolution)
    }

    async fn resolve_uncached(
        &self,
        specifier: &str,
        importer_dir: &Path,
        importer: &ModuleId,
    ) -> GraphResult<Resolution> {
        if is_builtin(specifier) {
            return Ok(Resolution::Builtin {
                specifier: specifier.to_string(),
            });
        }

        let candidate = if let Some(aliased) = resolve_path_alias(specifier, &self.options.aliases)
        {
            Some(self.root.join(aliased).clean())
        } else if is_path_like(specifier) {
            let base = if specifier.starts_with('/') {
                Path::new("/")
            } else {
                importer_dir
            };
            Some(base.join(specifier).clean())
        } else {
            None
        };

        let Some(candidate) = candidate else {
            return Ok(Resolution::Package {
                specifier: specifier.to_string(),
            });
        };

        match resolve_with_extensions(&candidate, &self.options.extensions, self.runtime.as_ref())
            .await
        {
            Some(path) => Ok(Resolution::Module {
                kind: kind_for_path(&path),
                id: ModuleId::File(path),
            }),
            None => Err(GraphError::UnresolvedImport {
                specifier: specifier.to_string(),
                importer: Some(importer.clone()),
                reason: format!("no file matches {}", candidate.display()),
                chain: DependencyChain::default(),
            }),
        }
    }

    /// Resolve a bare specifier to the package file it names, for targets
    /// that inline third-party code.
    pub async fn resolve_package(
        &self,
        specifier: &str,
        importer: &ModuleId,
        conditions: &[String],
    ) -> GraphResult<ModuleId> {
        let importer_dir = importer
            .path()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let key = (importer_dir, specifier.to_string(), conditions.join(","));
        if let Some(hit) = self.package_memo.get(&key) {
            return Ok(hit.clone());
        }

        let unresolved = |reason: String| GraphError::UnresolvedImport {
            specifier: specifier.to_string(),
            importer: Some(importer.clone()),
            reason,
            chain: DependencyChain::default(),
        };

        let (name, subpath) = split_package_specifier(specifier);
        let package_dir = find_package_dir(name, &key.0, self.runtime.as_ref())
            .ok_or_else(|| unresolved(format!("package '{name}' is not installed")))?;
        let path = resolve_package_entry(
            &package_dir,
            subpath,
            conditions,
            &self.options.extensions,
            self.runtime.as_ref(),
        )
        .await
        .map_err(unresolved)?;

        let id = ModuleId::File(path.clean());
        self.package_memo.insert(key, id.clone());
        Ok(id)
    }
}

fn is_path_like(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
        || specifier == "."
        || specifier == ".."
}

pub fn is_builtin(specifier: &str) -> bool {
    if specifier.starts_with("node:") {
        return true;
    }
    let name = specifier.split('/').next().unwrap_or(specifier);
    NODE_BUILTINS.contains(&name)
}

fn kind_for_path(path: &Path) -> SourceKind {
    if path.components().any(|c| c.as_os_str() == "node_modules") {
        SourceKind::External
    } else {
        SourceKind::Internal
    }
}
