//! Output transforms.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s applied to one
//! [`GeneratedUnit`]. Every stage keeps the unit's token map pointing at the
//! original module sources, so stages can be enabled or skipped
//! independently: a pipeline over a subset of stages produces exactly what
//! skipping the others would.
//!
//! Stage order per target:
//!
//! 1. [`WrapStage`]: bundles only; ESM imports/exports or a browser global.
//! 2. [`MinifyStage`]: when the target's minify level is enabled.
//! 3. [`SourceMapStage`]: when the target asks for source maps.

mod minify;
mod sourcemap;
mod wrap;

pub use minify::MinifyStage;
pub use sourcemap::SourceMapStage;
pub use wrap::WrapStage;

pub(crate) use wrap::esm_frame;

use crate::codegen::GeneratedUnit;
use crate::diagnostics::BuildError;
use crate::target::{OutputFormat, Target};

/// One post-processing step.
pub trait Stage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn apply(&self, unit: GeneratedUnit) -> Result<GeneratedUnit, BuildError>;
}

/// Ordered stages.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.names())
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// The stages a target's flags enable, in order.
    pub fn for_target(target: &Target) -> Self {
        let mut pipeline = Self::new();
        if target.format == OutputFormat::Bundle {
            pipeline = pipeline.stage(WrapStage::for_target(target));
        }
        if target.minify.is_enabled() {
            pipeline = pipeline.stage(MinifyStage::new(target.minify, target.emits_es_module()));
        }
        if target.sourcemap {
            pipeline = pipeline.stage(SourceMapStage::new());
        }
        pipeline
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order.
    pub fn run(&self, unit: GeneratedUnit) -> Result<GeneratedUnit, BuildError> {
        self.stages.iter().try_fold(unit, |unit, stage| {
            tracing::debug!(stage = stage.name(), unit = %unit.path.display(), "Applying transform");
            stage.apply(unit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minify::MinifyLevel;
    use crate::target::Platform;

    #[test]
    fn test_stages_follow_target_flags() {
        let target = Target::esm("esm").entry("src/a.ts");
        assert!(Pipeline::for_target(&target).is_empty());

        let target = Target::cjs("cjs")
            .entry("src/a.ts")
            .minify(MinifyLevel::Identifiers)
            .sourcemap(true);
        assert_eq!(Pipeline::for_target(&target).names(), vec!["minify", "sourcemap"]);

        let target = Target::bundle("browser")
            .entry("src/a.ts")
            .platform(Platform::Browser)
            .global_name("Lib")
            .sourcemap(true);
        assert_eq!(Pipeline::for_target(&target).names(), vec!["wrap", "sourcemap"]);
    }
}
