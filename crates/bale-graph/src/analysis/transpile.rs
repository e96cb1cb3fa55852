//! TypeScript/JSX to JavaScript.
//!
//! Type-only imports disappear during transpilation, so the specifiers of the
//! original source are collected first: they still form (type-only) edges of
//! the graph that declaration synthesis follows.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::{Program, Statement};
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};

use crate::sourcemap::TokenMap;

#[derive(Debug)]
pub(crate) struct Transpiled {
    pub code: String,
    pub map: TokenMap,
    /// Every specifier of the original source, in order.
    pub specifiers: Vec<String>,
}

pub(crate) fn transpile(
    source: &str,
    path: &Path,
    source_type: SourceType,
) -> Result<Transpiled, Vec<String>> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return Err(ret.errors.iter().map(|e| e.to_string()).collect());
    }
    let mut program = ret.program;
    let specifiers = collect_specifiers(&program);

    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let transformed = Transformer::new(&allocator, path, &TransformOptions::default())
        .build_with_scoping(scoping, &mut program);
    if !transformed.errors.is_empty() {
        return Err(transformed.errors.iter().map(|e| e.to_string()).collect());
    }

    let generated = Codegen::new()
        .with_options(CodegenOptions {
            source_map_path: Some(path.to_path_buf()),
            ..CodegenOptions::default()
        })
        .build(&program);
    let map = generated
        .map
        .as_ref()
        .map(TokenMap::from_source_map)
        .unwrap_or_default();

    Ok(Transpiled {
        code: generated.code,
        map,
        specifiers,
    })
}

/// Specifiers named by import and re-export declarations.
pub(crate) fn collect_specifiers(program: &Program<'_>) -> Vec<String> {
    let mut specifiers: Vec<String> = Vec::new();
    for stmt in &program.body {
        let source = match stmt {
            Statement::ImportDeclaration(decl) => Some(&decl.source),
            Statement::ExportAllDeclaration(decl) => Some(&decl.source),
            Statement::ExportNamedDeclaration(decl) => decl.source.as_ref(),
            _ => None,
        };
        if let Some(source) = source {
            let value = source.value.as_str();
            if !specifiers.iter().any(|s| s == value) {
                specifiers.push(value.to_string());
            }
        }
    }
    specifiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_only_imports_are_erased_but_collected() {
        let source = r#"
import type { Shape } from './shape';
import { area } from './area';
export const size = (s: Shape): number => area(s);
"#;
        let out = transpile(source, Path::new("/app/a.ts"), SourceType::ts()).unwrap();

        assert_eq!(out.specifiers, vec!["./shape", "./area"]);
        assert!(!out.code.contains("./shape"));
        assert!(out.code.contains("./area"));
        assert!(!out.code.contains(": number"));
        assert!(!out.map.is_empty());
    }

    #[test]
    fn test_syntax_errors_are_reported() {
        let err = transpile("const = ;", Path::new("/app/a.ts"), SourceType::ts()).unwrap_err();
        assert!(!err.is_empty());
    }
}
