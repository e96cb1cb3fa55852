//! Emitted artifacts.
//!
//! Artifacts are immutable once produced. Writing them out is left to the
//! caller; paths are relative to the build root.

use std::path::{Path, PathBuf};

use bale_graph::ContentHash;

use crate::target::OutputFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// One module of a separate-module target.
    Module,
    /// The single file of a bundle target.
    Bundle,
    /// The declaration document of a library target.
    Declarations,
}

/// A source map written next to its artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapFile {
    pub path: PathBuf,
    pub content: String,
}

/// One generated output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Name of the producing target.
    pub target: String,
    pub format: OutputFormat,
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub content: String,
    pub sourcemap: Option<SourceMapFile>,
}

impl Artifact {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    /// Hash of the content and the source map, for comparing builds.
    pub fn content_hash(&self) -> ContentHash {
        let mut bytes = self.content.as_bytes().to_vec();
        if let Some(map) = &self.sourcemap {
            bytes.push(0);
            bytes.extend_from_slice(map.content.as_bytes());
        }
        ContentHash::of(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(content: &str) -> Artifact {
        Artifact {
            target: "esm".into(),
            format: OutputFormat::Esm,
            kind: ArtifactKind::Module,
            path: PathBuf::from("dist/esm/a.js"),
            content: content.into(),
            sourcemap: None,
        }
    }

    #[test]
    fn test_file_name_and_hash() {
        let a = artifact("export const a = 1;\n");
        assert_eq!(a.file_name(), "a.js");
        assert_eq!(a.content_hash(), artifact("export const a = 1;\n").content_hash());
        assert_ne!(a.content_hash(), artifact("export const a = 2;\n").content_hash());

        let mut mapped = a.clone();
        mapped.sourcemap = Some(SourceMapFile {
            path: PathBuf::from("dist/esm/a.js.map"),
            content: "{}".into(),
        });
        assert_ne!(a.content_hash(), mapped.content_hash());
    }
}
