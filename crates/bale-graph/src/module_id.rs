use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Canonical identity of a module within a build.
///
/// Two specifiers that resolve to the same file share one `ModuleId`, so the
/// shared parse cache and the per-target graphs agree on identity without
/// comparing paths by hand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleId {
    /// A file on disk (or in the runtime snapshot), by normalized path.
    File(PathBuf),
    /// An external package left unbundled, by its bare specifier.
    Package(String),
}

impl ModuleId {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn package(specifier: impl Into<String>) -> Self {
        Self::Package(specifier.into())
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Package(_) => None,
        }
    }

    pub fn is_package(&self) -> bool {
        matches!(self, Self::Package(_))
    }

    /// Human-readable form used in chains and diagnostics.
    pub fn path_string(&self) -> String {
        match self {
            Self::File(path) => path.to_string_lossy().replace('\\', "/"),
            Self::Package(specifier) => specifier.clone(),
        }
    }

    /// File stem (or package name) reduced to a valid identifier.
    ///
    /// Used as the base for synthesized names such as default-export bindings
    /// and namespace objects.
    pub fn identifier_stem(&self) -> String {
        let raw = match self {
            Self::File(path) => {
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("module");
                let stem = stem.split('.').next().unwrap_or(stem);
                if stem == "index" {
                    path.parent()
                        .and_then(|p| p.file_name())
                        .and_then(|s| s.to_str())
                        .unwrap_or(stem)
                        .to_string()
                } else {
                    stem.to_string()
                }
            }
            Self::Package(specifier) => specifier.trim_start_matches('@').to_string(),
        };
        sanitize_identifier(&raw)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_string())
    }
}

/// Origin of a module's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Project source reached through relative or aliased specifiers.
    Internal,
    /// Third-party code (bare specifier or a file under `node_modules`).
    External,
}

/// Turn an arbitrary string into a JavaScript identifier.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut upper_next = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
            if upper_next && !out.is_empty() {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    if out.is_empty() {
        return "module".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) || is_reserved_word(&out) {
        out.insert(0, '_');
    }
    out
}

/// Reserved words that cannot be used as binding names.
pub fn is_reserved_word(name: &str) -> bool {
    matches!(
        name,
        "arguments"
            | "await"
            | "break"
            | "case"
            | "catch"
            | "class"
            | "const"
            | "continue"
            | "debugger"
            | "default"
            | "delete"
            | "do"
            | "else"
            | "enum"
            | "eval"
            | "export"
            | "extends"
            | "false"
            | "finally"
            | "for"
            | "function"
            | "if"
            | "implements"
            | "import"
            | "in"
            | "instanceof"
            | "interface"
            | "let"
            | "new"
            | "null"
            | "package"
            | "private"
            | "protected"
            | "public"
            | "return"
            | "static"
            | "super"
            | "switch"
            | "this"
            | "throw"
            | "true"
            | "try"
            | "typeof"
            | "var"
            | "void"
            | "while"
            | "with"
            | "yield"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_stem_uses_parent_for_index_files() {
        let id = ModuleId::file("/app/src/utils/index.ts");
        assert_eq!(id.identifier_stem(), "utils");
    }

    #[test]
    fn identifier_stem_camel_cases_package_names() {
        assert_eq!(ModuleId::package("react-dom").identifier_stem(), "reactDom");
        assert_eq!(ModuleId::package("@scope/pkg").identifier_stem(), "scopePkg");
    }

    #[test]
    fn sanitize_identifier_avoids_reserved_words_and_digits() {
        assert_eq!(sanitize_identifier("class"), "_class");
        assert_eq!(sanitize_identifier("3d-model"), "_3dModel");
        assert_eq!(sanitize_identifier("---"), "module");
    }

    #[test]
    fn display_uses_forward_slashes() {
        let id = ModuleId::file("/app/src/a.js");
        assert_eq!(id.to_string(), "/app/src/a.js");
        assert_eq!(ModuleId::package("lodash").to_string(), "lodash");
    }
}
