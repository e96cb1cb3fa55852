use super::Stage;
use crate::codegen::GeneratedUnit;
use crate::diagnostics::BuildError;

/// Serializes the unit's map and links it from the code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceMapStage;

impl SourceMapStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for SourceMapStage {
    fn name(&self) -> &'static str {
        "sourcemap"
    }

    fn apply(&self, mut unit: GeneratedUnit) -> Result<GeneratedUnit, BuildError> {
        let file = unit.file_name();
        let map = unit.map.to_source_map(Some(&file), &unit.sources);
        unit.sourcemap = Some(map.to_json_string());
        if !unit.code.ends_with('\n') {
            unit.code.push('\n');
        }
        unit.code.push_str(&format!("//# sourceMappingURL={file}.map\n"));
        Ok(unit)
    }
}
