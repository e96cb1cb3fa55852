//! Resolved build plans.

use std::path::{Path, PathBuf};

use bale_graph::ResolveOptions;
use bale_graph::module_id::{is_reserved_word, sanitize_identifier};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::target::{OutputFormat, Platform, Target};
use crate::{Error, Result};

/// Everything one build invocation needs: the targets and how to resolve
/// their modules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildPlan {
    pub targets: Vec<Target>,
    /// Resolution rules; `resolve.root` is the source-tree root.
    pub resolve: ResolveOptions,
    /// Upper bound on targets generated at once (default: CPUs, at most 8).
    pub max_parallel: Option<usize>,
}

impl BuildPlan {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            targets: Vec::new(),
            resolve: ResolveOptions::new(root),
            max_parallel: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.resolve.root
    }

    pub fn target(mut self, target: Target) -> Self {
        self.targets.push(target);
        self
    }

    pub fn resolve(mut self, options: ResolveOptions) -> Self {
        self.resolve = options;
        self
    }

    pub fn max_parallel(mut self, limit: usize) -> Self {
        self.max_parallel = Some(limit);
        self
    }

    /// Reject plans that cannot be built, before any work starts.
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::InvalidPlan("the plan declares no targets".to_string()));
        }
        if self.max_parallel == Some(0) {
            return Err(Error::InvalidPlan("max_parallel must be at least 1".to_string()));
        }

        let mut names: FxHashSet<&str> = FxHashSet::default();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                return Err(Error::InvalidPlan("every target needs a name".to_string()));
            }
            if !names.insert(target.name.as_str()) {
                return Err(Error::InvalidPlan(format!(
                    "target name '{}' is declared twice",
                    target.name
                )));
            }
            if target.entries.is_empty() {
                return Err(Error::InvalidPlan(format!(
                    "target '{}' has no entry points",
                    target.name
                )));
            }
            if target.declarations && target.format == OutputFormat::Bundle {
                return Err(Error::InvalidPlan(format!(
                    "target '{}': declarations are only emitted for library formats",
                    target.name
                )));
            }
            if target.format == OutputFormat::Bundle && target.platform == Platform::Browser {
                match target.global_name.as_deref() {
                    None => {
                        return Err(Error::InvalidPlan(format!(
                            "target '{}': browser bundles need a global name",
                            target.name
                        )));
                    }
                    Some(global) if !is_identifier(global) => {
                        return Err(Error::InvalidPlan(format!(
                            "target '{}': '{}' is not a valid global name",
                            target.name, global
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    !is_reserved_word(name) && sanitize_identifier(name) == name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> BuildPlan {
        BuildPlan::new("/app")
            .target(Target::esm("esm").entry("src/a.ts"))
            .target(Target::cjs("cjs").entry("src/a.ts"))
    }

    #[test]
    fn test_valid_plan() {
        assert!(plan().validate().is_ok());
        assert_eq!(plan().root(), Path::new("/app"));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_targets() {
        assert!(BuildPlan::new("/app").validate().is_err());

        let duplicate = plan().target(Target::esm("esm").entry("src/b.ts"));
        let err = duplicate.validate().unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_rejects_target_without_entries() {
        let err = plan().target(Target::esm("empty")).validate().unwrap_err();
        assert!(err.to_string().contains("no entry points"));
    }

    #[test]
    fn test_browser_bundle_needs_valid_global() {
        let missing = plan().target(
            Target::bundle("browser")
                .entry("src/a.ts")
                .platform(Platform::Browser),
        );
        assert!(missing.validate().is_err());

        let invalid = plan().target(
            Target::bundle("browser")
                .entry("src/a.ts")
                .platform(Platform::Browser)
                .global_name("my-lib"),
        );
        assert!(invalid.validate().is_err());

        let valid = plan().target(
            Target::bundle("browser")
                .entry("src/a.ts")
                .platform(Platform::Browser)
                .global_name("MyLib"),
        );
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_rejects_bundle_declarations() {
        let err = plan()
            .target(Target::bundle("bundle").entry("src/a.ts").declarations(true))
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("library formats"));
    }
}
