use std::path::PathBuf;

use bale_graph::TokenMap;
use bale_graph::oxc::{
    Allocator, Codegen, CodegenOptions, CompressOptions, MangleOptions, Minifier, MinifierOptions,
    Parser, SourceType,
};

use super::Stage;
use crate::codegen::GeneratedUnit;
use crate::diagnostics::BuildError;
use crate::minify::MinifyLevel;

/// Minifies JavaScript and composes the minifier's position map with the
/// unit's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinifyStage {
    level: MinifyLevel,
    /// Parse as an ES module (otherwise as a script).
    module: bool,
}

impl MinifyStage {
    pub fn new(level: MinifyLevel, module: bool) -> Self {
        Self { level, module }
    }

    fn options(&self) -> MinifierOptions {
        MinifierOptions {
            mangle: self.level.mangles().then(MangleOptions::default),
            compress: self.level.compresses().then(CompressOptions::default),
            ..MinifierOptions::default()
        }
    }
}

impl Stage for MinifyStage {
    fn name(&self) -> &'static str {
        "minify"
    }

    fn apply(&self, mut unit: GeneratedUnit) -> Result<GeneratedUnit, BuildError> {
        if !self.level.is_enabled() {
            return Ok(unit);
        }
        let file = unit.file_name();
        let source_type = if self.module {
            SourceType::mjs()
        } else {
            SourceType::cjs()
        };

        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, &unit.code, source_type).parse();
        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.iter().map(|e| e.to_string()).collect();
            return Err(BuildError::generation(
                unit.path.display().to_string(),
                format!("generated code does not parse: {}", messages.join("; ")),
            ));
        }
        let mut program = parsed.program;
        let minified = Minifier::new(self.options()).minify(&allocator, &mut program);

        let generated = Codegen::new()
            .with_options(CodegenOptions {
                source_map_path: Some(PathBuf::from(&file)),
                ..CodegenOptions::minify()
            })
            .with_scoping(minified.scoping)
            .build(&program);

        let map = generated
            .map
            .as_ref()
            .map(TokenMap::from_source_map)
            .unwrap_or_default();
        unit.map = map.compose(&unit.map);
        unit.code = generated.code;
        if !unit.code.ends_with('\n') {
            unit.code.push('\n');
        }
        tracing::debug!(unit = %file, level = %self.level, "Minified");
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_graph::Mapping;

    fn unit(code: &str) -> GeneratedUnit {
        let tokens = code
            .lines()
            .enumerate()
            .map(|(line, _)| Mapping {
                dst_line: line as u32,
                dst_col: 0,
                source: 0,
                src_line: line as u32 + 10,
                src_col: 0,
            })
            .collect();
        GeneratedUnit {
            path: PathBuf::from("dist/app.js"),
            code: code.into(),
            map: TokenMap::from_tokens(tokens),
            sources: vec![],
            interface: None,
            sourcemap: None,
        }
    }

    #[test]
    fn test_whitespace_level_keeps_names() {
        let stage = MinifyStage::new(MinifyLevel::Whitespace, true);
        let out = stage
            .apply(unit("export function add(first, second) {\n  return first + second;\n}\n"))
            .unwrap();
        assert!(out.code.contains("first"));
        assert!(out.code.len() < 60);
        assert!(out.map.tokens().iter().all(|t| t.src_line >= 10));
    }

    #[test]
    fn test_identifier_level_mangles_locals() {
        let stage = MinifyStage::new(MinifyLevel::Identifiers, true);
        let out = stage
            .apply(unit(
                "export function add(first, second) {\n  const total = first + second;\n  return total;\n}\n",
            ))
            .unwrap();
        assert!(out.code.contains("add"));
        assert!(!out.code.contains("first"));
        assert!(!out.code.contains("total"));
    }

    #[test]
    fn test_minification_is_deterministic() {
        let stage = MinifyStage::new(MinifyLevel::Identifiers, false);
        let source = "var lib = (function () {\n  var counter = 0;\n  return { next: function () { return ++counter; } };\n})();\n";
        let a = stage.apply(unit(source)).unwrap();
        let b = stage.apply(unit(source)).unwrap();
        assert_eq!(a.code, b.code);
        assert_eq!(a.map, b.map);
    }

    #[test]
    fn test_invalid_code_is_a_generation_failure() {
        let stage = MinifyStage::new(MinifyLevel::Syntax, true);
        let err = stage.apply(unit("const = ;\n")).unwrap_err();
        assert_eq!(err.class(), crate::diagnostics::ErrorClass::GenerationFailure);
    }
}
