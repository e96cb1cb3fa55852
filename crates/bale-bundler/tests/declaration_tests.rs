//! Declaration document tests.

mod helpers;

use std::sync::Arc;

use bale_bundler::{ArtifactKind, BuildPlan, ErrorClass, MemoryRuntime, ModuleId, Target};
use helpers::*;

fn library_plan(entry: &str) -> BuildPlan {
    BuildPlan::new("/app")
        .target(
            Target::esm("esm")
                .entry(entry)
                .declarations(true)
                .out_dir("dist/esm"),
        )
        .target(
            Target::cjs("cjs")
                .entry(entry)
                .declarations(true)
                .out_dir("dist/cjs"),
        )
}

#[tokio::test]
async fn esm_and_cjs_share_one_declaration_document() {
    let runtime = memory_project(&[
        (
            "src/index.ts",
            "import type { Shape } from './shape';\nexport { circle } from './shape';\nexport function area(shape: Shape): number { return shape.size * shape.size; }\n",
        ),
        (
            "src/shape.ts",
            "export interface Shape {\n  size: number;\n}\nexport function circle(size: number): Shape { return { size }; }\n",
        ),
    ]);
    let report = build(runtime, &library_plan("src/index.ts")).await;

    assert!(report.is_success(), "{}", report.summary());
    assert_eq!(report.stats.declaration_documents, 1);

    let esm = artifact(&report, "esm", "dist/esm/esm.d.ts");
    let cjs = artifact(&report, "cjs", "dist/cjs/cjs.d.ts");
    assert_eq!(esm.kind, ArtifactKind::Declarations);
    assert_eq!(esm.content, cjs.content);

    assert_contains(esm, "interface Shape");
    assert_contains(esm, "declare function circle(size: number): Shape;");
    assert_contains(esm, "declare function area(shape: Shape): number;");
    assert_contains(esm, "export { circle, area };");
    assert_not_contains(esm, "import ");
}

#[tokio::test]
async fn declarations_ignore_tree_shaking() {
    let runtime = memory_project(&[
        ("src/index.ts", "export * from './api';\n"),
        (
            "src/api.ts",
            "export const used: number = 1;\nexport const alsoPublic: string = 'x';\n",
        ),
    ]);
    let report = build(runtime, &library_plan("src/index.ts")).await;

    let document = artifact(&report, "esm", "dist/esm/esm.d.ts");
    assert_contains(document, "declare const used: number;");
    assert_contains(document, "declare const alsoPublic: string;");
}

#[tokio::test]
async fn internal_declarations_can_be_stripped() {
    let runtime = memory_project(&[(
        "src/index.ts",
        "export const visible: number = 1;\n/** @internal */\nexport const hidden: number = 2;\n",
    )]);
    let plan = BuildPlan::new("/app").target(
        Target::esm("esm")
            .entry("src/index.ts")
            .declarations(true)
            .strip_internal(true),
    );
    let report = build(runtime, &plan).await;

    let document = artifact(&report, "esm", "dist/esm.d.ts");
    assert_contains(document, "visible");
    assert_not_contains(document, "hidden");
}

#[tokio::test]
async fn inference_failure_is_a_partial_target() {
    let runtime = memory_project(&[
        ("src/index.ts", "export { double } from './math';\n"),
        ("src/math.ts", "export function double(x) { return x * 2; }\n"),
    ]);
    let report = build(runtime, &library_plan("src/index.ts")).await;

    assert!(!report.is_success());
    for name in ["esm", "cjs"] {
        let library = target(&report, name);
        assert!(library.partial, "{}", report.summary());
        assert_eq!(library.errors.len(), 1);
        assert_eq!(library.errors[0].class(), ErrorClass::TypeInferenceFailure);
        assert_eq!(
            library.errors[0].module(),
            Some(&ModuleId::file("/app/src/math.ts"))
        );
        assert!(library.artifacts.iter().all(|a| a.kind == ArtifactKind::Module));
        assert_eq!(library.artifacts.len(), 2);
    }
    assert_contains(artifact(&report, "esm", "dist/esm/math.js"), "export function double(x)");
    assert!(report.summary().contains("0 succeeded, 2 partial, 0 failed"));
}

#[tokio::test]
async fn package_types_stay_imported() {
    let runtime = memory_project(&[(
        "src/index.ts",
        "import type { Request } from 'express';\nexport function handle(req: Request): void {}\n",
    )]);
    let plan = BuildPlan::new("/app").target(
        Target::esm("esm").entry("src/index.ts").declarations(true),
    );
    let report = build(runtime, &plan).await;

    let document = artifact(&report, "esm", "dist/esm.d.ts");
    assert_contains(document, "from \"express\";");
    assert_contains(document, "declare function handle(req: ");
    assert_contains(document, "export { handle };");
}

#[tokio::test]
async fn renamed_declarations_keep_their_types() {
    let runtime = memory_project(&[
        (
            "src/index.ts",
            "export { count as label } from './b';\nexport const count: number = 1;\n",
        ),
        ("src/b.ts", "export const count: string = 'c';\n"),
    ]);
    let plan = BuildPlan::new("/app").target(
        Target::esm("esm").entry("src/index.ts").declarations(true),
    );
    let report = build(runtime, &plan).await;

    assert!(report.is_success(), "{}", report.summary());
    let document = artifact(&report, "esm", "dist/esm.d.ts");
    assert_contains(document, "declare const count: string;");
    assert_contains(document, "declare const count$1: number;");
    assert_not_contains(document, "declare const count$1;");
    assert_contains(document, "count as label");
    assert_contains(document, "count$1 as count");
}

fn ordered_entries_project() -> Arc<MemoryRuntime> {
    memory_project(&[
        ("src/a.ts", "export const x: number = 1;\n"),
        ("src/b.ts", "export const x: string = 'b';\n"),
    ])
}

fn reversed_target() -> Target {
    Target::esm("reversed")
        .entries(["src/b.ts", "src/a.ts"])
        .declarations(true)
        .out_dir("dist/reversed")
}

#[tokio::test]
async fn entry_order_decides_the_declaration_surface() {
    let alone = build(
        ordered_entries_project(),
        &BuildPlan::new("/app").target(reversed_target()),
    )
    .await;
    let plan = BuildPlan::new("/app")
        .target(
            Target::esm("forward")
                .entries(["src/a.ts", "src/b.ts"])
                .declarations(true)
                .out_dir("dist/forward"),
        )
        .target(reversed_target());
    let siblings = build(ordered_entries_project(), &plan).await;

    assert!(siblings.is_success(), "{}", siblings.summary());
    assert_eq!(siblings.stats.declaration_documents, 2);

    let reversed = artifact(&siblings, "reversed", "dist/reversed/reversed.d.ts");
    assert_eq!(
        reversed.content,
        artifact(&alone, "reversed", "dist/reversed/reversed.d.ts").content
    );
    assert_contains(reversed, "declare const x: string;");
    assert_contains(reversed, "declare const x$1: number;");
    assert_contains(reversed, "export { x };");

    let forward = artifact(&siblings, "forward", "dist/forward/forward.d.ts");
    assert_contains(forward, "declare const x: number;");
    assert_contains(forward, "declare const x$1: string;");
    assert_contains(forward, "export { x };");
}
