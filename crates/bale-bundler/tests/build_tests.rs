//! Multi-target build tests.
//!
//! These tests verify that:
//! 1. Targets sharing entry points parse each module once
//! 2. Failures stay scoped to the target that hit them
//! 3. Rebuilding an unchanged tree is byte-identical

mod helpers;

use bale_bundler::{
    ArtifactKind, BuildPlan, Bundler, CancellationToken, Error, ErrorClass, ExternalPolicy,
    MinifyLevel, ModuleId, NativeRuntime, Platform, Target,
};
use helpers::*;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn shared_entry_project() -> Arc<bale_bundler::MemoryRuntime> {
    memory_project(&[
        ("src/a.js", "import { g } from './b.js';\nexport function f() { return 1; }\n"),
        ("src/b.js", "export function g() { return 2; }\n"),
    ])
}

fn three_target_plan() -> BuildPlan {
    BuildPlan::new("/app")
        .target(Target::esm("esm").entry("src/a.js").out_dir("dist/esm"))
        .target(Target::cjs("cjs").entry("src/a.js").out_dir("dist/cjs"))
        .target(
            Target::bundle("browser")
                .entry("src/a.js")
                .platform(Platform::Browser)
                .global_name("Lib"),
        )
}

#[tokio::test]
async fn shared_entry_is_parsed_once_across_targets() {
    let runtime = shared_entry_project();
    let report = build(runtime.clone(), &three_target_plan()).await;

    assert!(report.is_success(), "{}", report.summary());
    assert_eq!(runtime.read_count("src/a.js"), 1);
    assert_eq!(runtime.read_count("src/b.js"), 1);
    assert_eq!(report.stats.analyses, 2);
    assert_eq!(report.stats.modules, 2);

    assert_eq!(target(&report, "esm").artifacts.len(), 2);
    assert_eq!(target(&report, "cjs").artifacts.len(), 2);
    assert_eq!(target(&report, "browser").artifacts.len(), 1);
    let mut paths: Vec<_> = report.artifacts().map(|a| a.path.clone()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 5);
}

#[tokio::test]
async fn separate_output_references_unused_import_while_bundle_elides_it() {
    let report = build(shared_entry_project(), &three_target_plan()).await;

    let esm_a = artifact(&report, "esm", "dist/esm/a.js");
    assert_contains(esm_a, "./b.js");
    assert_contains(esm_a, "export function f()");
    assert_contains(artifact(&report, "esm", "dist/esm/b.js"), "export function g()");

    let cjs_a = artifact(&report, "cjs", "dist/cjs/a.cjs");
    assert_contains(cjs_a, "require(\"./b.cjs\")");
    assert_contains(
        cjs_a,
        "Object.defineProperty(exports, \"f\", { enumerable: true, get: function () { return f; } });",
    );

    let bundle = artifact(&report, "browser", "dist/browser.js");
    assert_eq!(bundle.kind, ArtifactKind::Bundle);
    assert!(bundle.content.starts_with("var Lib = (function () {"));
    assert_contains(bundle, "function f()");
    assert_contains(bundle, "get f() { return f; }");
    assert_not_contains(bundle, "function g()");
}

#[tokio::test]
async fn unresolved_inlined_dependency_fails_only_its_target() {
    let runtime = memory_project(&[(
        "src/app.js",
        "import { pad } from 'd';\nexport const out = pad('x');\n",
    )]);
    let plan = BuildPlan::new("/app")
        .target(
            Target::bundle("inline")
                .entry("src/app.js")
                .external(ExternalPolicy::Inline)
                .out_dir("dist/inline"),
        )
        .target(
            Target::esm("exclude")
                .entry("src/app.js")
                .external(ExternalPolicy::Exclude)
                .out_dir("dist/exclude"),
        );
    let report = build(runtime, &plan).await;

    assert!(!report.is_success());
    let inline = target(&report, "inline");
    assert_eq!(inline.errors.len(), 1);
    assert_eq!(inline.errors[0].class(), ErrorClass::UnresolvedImport);
    assert_eq!(
        inline.errors[0].module(),
        Some(&ModuleId::file("/app/src/app.js"))
    );
    assert!(inline.artifacts.is_empty());

    let exclude = target(&report, "exclude");
    assert!(exclude.is_success());
    assert_contains(artifact(&report, "exclude", "dist/exclude/app.js"), "'d'");
    assert!(report.summary().contains("[UNRESOLVED_IMPORT]"));
}

#[tokio::test]
async fn parse_failure_is_reported_to_every_target_reaching_it() {
    let runtime = memory_project(&[
        ("src/a.js", "import { broken } from './broken.js';\nexport const a = broken;\n"),
        ("src/broken.js", "export const = ;\n"),
        ("src/ok.js", "export const ok = 1;\n"),
    ]);
    let plan = BuildPlan::new("/app")
        .target(Target::esm("esm").entry("src/a.js").out_dir("dist/esm"))
        .target(Target::cjs("cjs").entry("src/a.js").out_dir("dist/cjs"))
        .target(Target::esm("ok").entry("src/ok.js").out_dir("dist/ok"));
    let report = build(runtime.clone(), &plan).await;

    for name in ["esm", "cjs"] {
        let failed = target(&report, name);
        assert_eq!(failed.errors[0].class(), ErrorClass::ParseFailure);
        assert!(failed.errors[0].chain().is_some());
    }
    assert!(target(&report, "ok").is_success());
    assert_eq!(runtime.read_count("src/broken.js"), 1);
}

#[tokio::test]
async fn rebuilds_are_byte_identical() {
    let runtime = memory_project(&[
        (
            "src/index.ts",
            "import { scale } from './math';\nexport function area(r: number): number { return scale(r * r); }\n",
        ),
        ("src/math.ts", "export const PI: number = 3.14159;\nexport function scale(x: number): number { return x * PI; }\n"),
    ]);
    let plan = BuildPlan::new("/app")
        .target(
            Target::esm("esm")
                .entry("src/index.ts")
                .declarations(true)
                .sourcemap(true)
                .out_dir("dist/esm"),
        )
        .target(
            Target::bundle("min")
                .entry("src/index.ts")
                .minify(MinifyLevel::Identifiers)
                .sourcemap(true),
        );

    let first = build(runtime.clone(), &plan).await;
    let second = build(runtime, &plan).await;

    assert!(first.is_success(), "{}", first.summary());
    let hashes = |report: &bale_bundler::BuildReport| {
        report
            .artifacts()
            .map(|a| (a.path.clone(), a.content_hash()))
            .collect::<Vec<_>>()
    };
    assert_eq!(hashes(&first), hashes(&second));
}

#[tokio::test]
async fn source_maps_point_at_original_sources() {
    let runtime = memory_project(&[
        ("src/a.ts", "import { b } from './b';\nexport const a: number = b + 1;\n"),
        ("src/b.ts", "export const b: number = 1;\n"),
    ]);
    let plan = BuildPlan::new("/app").target(
        Target::bundle("app")
            .entry("src/a.ts")
            .minify(MinifyLevel::Whitespace)
            .sourcemap(true),
    );
    let report = build(runtime, &plan).await;

    let bundle = artifact(&report, "app", "dist/app.js");
    assert!(bundle.content.ends_with("//# sourceMappingURL=app.js.map\n"));
    let map = bundle.sourcemap.as_ref().expect("bundle should carry a source map");
    assert_eq!(map.path, Path::new("dist/app.js.map"));
    assert!(map.content.contains("../src/a.ts"));
    assert!(map.content.contains("../src/b.ts"));
}

#[tokio::test]
async fn cancelled_build_is_aborted() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = Bundler::new(shared_entry_project())
        .build(&three_target_plan(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn native_runtime_builds_from_disk() {
    let project = TempDir::new().expect("temp dir");
    let src = project.path().join("src");
    std::fs::create_dir(&src).expect("create src");
    std::fs::write(src.join("index.js"), "export { greet } from './greet.js';\n").expect("write index");
    std::fs::write(
        src.join("greet.js"),
        "export function greet(name) { return 'hi ' + name; }\n",
    )
    .expect("write greet");

    let plan = BuildPlan::new(project.path())
        .target(Target::esm("esm").entry("src/index.js"))
        .max_parallel(1);
    let report = Bundler::new(Arc::new(NativeRuntime::new(project.path())))
        .build(&plan, &CancellationToken::new())
        .await
        .expect("build should not abort");

    assert!(report.is_success(), "{}", report.summary());
    assert_contains(artifact(&report, "esm", "dist/index.js"), "./greet.js");
    assert_contains(artifact(&report, "esm", "dist/greet.js"), "export function greet(name)");
}
