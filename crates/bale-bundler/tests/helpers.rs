//! Shared test utilities for bale-bundler integration tests.

#![allow(dead_code)]

use bale_bundler::{Artifact, BuildPlan, BuildReport, Bundler, CancellationToken, MemoryRuntime, TargetReport};
use std::path::Path;
use std::sync::Arc;

/// In-memory project rooted at `/app`.
pub fn memory_project(files: &[(&str, &str)]) -> Arc<MemoryRuntime> {
    let mut runtime = MemoryRuntime::new("/app");
    for (path, content) in files {
        runtime = runtime.with_file(path, content);
    }
    Arc::new(runtime)
}

/// Run `plan` against `runtime`, expecting no build-wide failure.
pub async fn build(runtime: Arc<MemoryRuntime>, plan: &BuildPlan) -> BuildReport {
    Bundler::new(runtime)
        .build(plan, &CancellationToken::new())
        .await
        .expect("build should not abort")
}

pub fn target<'a>(report: &'a BuildReport, name: &str) -> &'a TargetReport {
    report
        .target(name)
        .unwrap_or_else(|| panic!("no report for target '{name}'"))
}

pub fn artifact<'a>(report: &'a BuildReport, name: &str, path: &str) -> &'a Artifact {
    target(report, name)
        .artifact(Path::new(path))
        .unwrap_or_else(|| {
            let paths: Vec<_> = target(report, name)
                .artifacts
                .iter()
                .map(|artifact| artifact.path.display().to_string())
                .collect();
            panic!("target '{name}' has no artifact {path}; produced {paths:?}")
        })
}

/// Assert that an artifact contains a substring, showing the content on failure.
pub fn assert_contains(artifact: &Artifact, substring: &str) {
    assert!(
        artifact.content.contains(substring),
        "Expected {} to contain '{}', but it didn't.\nContent:\n{}",
        artifact.path.display(),
        substring,
        artifact.content
    );
}

pub fn assert_not_contains(artifact: &Artifact, substring: &str) {
    assert!(
        !artifact.content.contains(substring),
        "Expected {} not to contain '{}'.\nContent:\n{}",
        artifact.path.display(),
        substring,
        artifact.content
    );
}

/// Byte offset of `substring`, failing the test when it is absent.
pub fn position(artifact: &Artifact, substring: &str) -> usize {
    artifact.content.find(substring).unwrap_or_else(|| {
        panic!(
            "Expected {} to contain '{}'.\nContent:\n{}",
            artifact.path.display(),
            substring,
            artifact.content
        )
    })
}
