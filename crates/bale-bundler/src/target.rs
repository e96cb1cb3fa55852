//! Build targets.
//!
//! A [`Target`] is one named build intent: which entries to start from, which
//! output format to produce and which post-processing to apply. Targets are
//! plain data with builder methods and serde derives, so any configuration
//! loader can produce them.

use std::path::PathBuf;

use bale_graph::ExternalPolicy;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::minify::MinifyLevel;

/// Output module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// One ES module per source module.
    #[default]
    Esm,
    /// One CommonJS module per source module.
    Cjs,
    /// Every module concatenated into one file.
    Bundle,
}

impl OutputFormat {
    /// Library formats emit one unit per module and may carry declarations.
    pub fn is_library(&self) -> bool {
        !matches!(self, Self::Bundle)
    }

    /// File extension of emitted JavaScript.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Esm | Self::Bundle => "js",
            Self::Cjs => "cjs",
        }
    }
}

/// Where emitted code is assumed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// Any ECMAScript host; bundles stay ES modules.
    #[default]
    Neutral,
    /// Browsers; bundles become scripts exposing a global.
    Browser,
}

impl Platform {
    pub fn conditions(&self) -> ExportConditions {
        match self {
            Self::Neutral => ExportConditions::Neutral,
            Self::Browser => ExportConditions::Browser,
        }
    }
}

/// `package.json` export conditions used when packages are inlined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportConditions {
    /// `["import", "module", "default"]`
    Neutral,
    /// `["browser", "import", "module", "default"]`
    Browser,
}

impl ExportConditions {
    /// Get the condition names as a static slice (zero allocation)
    pub fn as_slice(&self) -> &'static [&'static str] {
        match self {
            Self::Neutral => &["import", "module", "default"],
            Self::Browser => &["browser", "import", "module", "default"],
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.as_slice().iter().map(|s| (*s).to_string()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.as_slice().contains(&name)
    }
}

/// A named build intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    pub name: String,
    /// Entry points, relative to the build root.
    pub entries: Vec<PathBuf>,
    pub format: OutputFormat,
    pub platform: Platform,
    /// Global exposed by browser bundles.
    pub global_name: Option<String>,
    /// Global variable names of external packages in browser bundles.
    pub globals: IndexMap<String, String>,
    /// Emit a declaration document (library formats only).
    pub declarations: bool,
    /// Drop `@internal` declarations from the declaration document.
    pub strip_internal: bool,
    pub minify: MinifyLevel,
    pub sourcemap: bool,
    pub external: ExternalPolicy,
    /// Elide unreachable statements from bundles.
    pub tree_shake: bool,
    /// Output directory, relative to the build root.
    pub out_dir: PathBuf,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            name: String::new(),
            entries: Vec::new(),
            format: OutputFormat::Esm,
            platform: Platform::Neutral,
            global_name: None,
            globals: IndexMap::new(),
            declarations: false,
            strip_internal: false,
            minify: MinifyLevel::None,
            sourcemap: false,
            external: ExternalPolicy::Exclude,
            tree_shake: true,
            out_dir: PathBuf::from("dist"),
        }
    }
}

impl Target {
    pub fn new(name: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            name: name.into(),
            format,
            ..Self::default()
        }
    }

    pub fn esm(name: impl Into<String>) -> Self {
        Self::new(name, OutputFormat::Esm)
    }

    pub fn cjs(name: impl Into<String>) -> Self {
        Self::new(name, OutputFormat::Cjs)
    }

    pub fn bundle(name: impl Into<String>) -> Self {
        Self::new(name, OutputFormat::Bundle)
    }

    pub fn entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.entries.push(entry.into());
        self
    }

    pub fn entries<I, P>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.entries.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn global_name(mut self, name: impl Into<String>) -> Self {
        self.global_name = Some(name.into());
        self
    }

    /// Map an external package to the global it is read from.
    pub fn global(mut self, package: impl Into<String>, global: impl Into<String>) -> Self {
        self.globals.insert(package.into(), global.into());
        self
    }

    pub fn declarations(mut self, enabled: bool) -> Self {
        self.declarations = enabled;
        self
    }

    pub fn strip_internal(mut self, enabled: bool) -> Self {
        self.strip_internal = enabled;
        self
    }

    pub fn minify(mut self, level: MinifyLevel) -> Self {
        self.minify = level;
        self
    }

    pub fn sourcemap(mut self, enabled: bool) -> Self {
        self.sourcemap = enabled;
        self
    }

    pub fn external(mut self, policy: ExternalPolicy) -> Self {
        self.external = policy;
        self
    }

    pub fn tree_shake(mut self, enabled: bool) -> Self {
        self.tree_shake = enabled;
        self
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    /// Browser bundles are scripts wrapped in an immediately-invoked function.
    pub fn is_script(&self) -> bool {
        self.format == OutputFormat::Bundle && self.platform == Platform::Browser
    }

    /// Whether emitted JavaScript is parsed as an ES module.
    pub fn emits_es_module(&self) -> bool {
        self.format != OutputFormat::Cjs && !self.is_script()
    }
}
