//! Package entry resolution for inlined third-party code.
//!
//! Walks up `node_modules` directories from the importer, reads the package's
//! `package.json` and picks an entry through `exports` (honoring the target's
//! condition names), then `module`, then `main`, then `index.*`.

use std::path::{Path, PathBuf};

use serde_json::Value;

use super::extensions::resolve_with_extensions;
use crate::runtime::Runtime;

/// Split `@scope/pkg/sub/path` into (`@scope/pkg`, `sub/path`).
pub fn split_package_specifier(specifier: &str) -> (&str, &str) {
    let mut slashes = specifier.match_indices('/');
    let boundary = if specifier.starts_with('@') {
        slashes.nth(1)
    } else {
        slashes.next()
    };
    match boundary {
        Some((idx, _)) => (&specifier[..idx], &specifier[idx + 1..]),
        None => (specifier, ""),
    }
}

/// Locate the package directory for `name`, searching `node_modules` in
/// `from_dir` and each of its ancestors.
pub fn find_package_dir(name: &str, from_dir: &Path, runtime: &dyn Runtime) -> Option<PathBuf> {
    for dir in from_dir.ancestors() {
        let candidate = dir.join("node_modules").join(name);
        if runtime.exists(&candidate.join("package.json")) || runtime.exists(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Resolve the entry file of a package directory for `subpath`.
pub async fn resolve_package_entry(
    package_dir: &Path,
    subpath: &str,
    conditions: &[String],
    extensions: &[String],
    runtime: &dyn Runtime,
) -> Result<PathBuf, String> {
    let manifest = read_manifest(package_dir, runtime).await?;

    if let Some(exports) = manifest.as_ref().and_then(|m| m.get("exports")) {
        let key = if subpath.is_empty() {
            ".".to_string()
        } else {
            format!("./{subpath}")
        };
        let target = match_exports(exports, &key, conditions)
            .ok_or_else(|| format!("'{key}' is not exported by {}", package_dir.display()))?;
        let candidate = package_dir.join(target.trim_start_matches("./"));
        return resolve_with_extensions(&candidate, extensions, runtime)
            .await
            .ok_or_else(|| format!("export target '{target}' does not exist"));
    }

    if !subpath.is_empty() {
        let candidate = package_dir.join(subpath);
        return resolve_with_extensions(&candidate, extensions, runtime)
            .await
            .ok_or_else(|| format!("'{subpath}' not found in {}", package_dir.display()));
    }

    let prefers_module = conditions
        .iter()
        .any(|c| c == "module" || c == "import");
    let mut fields: Vec<&str> = Vec::with_capacity(3);
    if conditions.iter().any(|c| c == "browser") {
        fields.push("browser");
    }
    if prefers_module {
        fields.push("module");
    }
    fields.push("main");

    if let Some(manifest) = &manifest {
        for field in fields {
            if let Some(entry) = manifest.get(field).and_then(Value::as_str) {
                let candidate = package_dir.join(entry.trim_start_matches("./"));
                if let Some(found) = resolve_with_extensions(&candidate, extensions, runtime).await {
                    return Ok(found);
                }
            }
        }
    }

    resolve_with_extensions(&package_dir.join("index"), extensions, runtime)
        .await
        .ok_or_else(|| format!("no entry point found in {}", package_dir.display()))
}

async fn read_manifest(package_dir: &Path, runtime: &dyn Runtime) -> Result<Option<Value>, String> {
    let path = package_dir.join("package.json");
    if !runtime.exists(&path) {
        return Ok(None);
    }
    let bytes = runtime
        .read_file(&path)
        .await
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| format!("invalid {}: {e}", path.display()))
}

/// Match an `exports` field against a subpath key (`.` or `./sub`).
fn match_exports<'a>(exports: &'a Value, key: &str, conditions: &[String]) -> Option<&'a str> {
    match exports {
        Value::String(target) if key == "." => Some(target.as_str()),
        Value::Object(map) => {
            let is_subpath_map = map.keys().any(|k| k.starts_with('.'));
            if is_subpath_map {
                map.get(key)
                    .and_then(|entry| select_condition(entry, conditions))
            } else if key == "." {
                select_condition(exports, conditions)
            } else {
                None
            }
        }
        Value::Array(items) => items
            .iter()
            .find_map(|item| match_exports(item, key, conditions)),
        _ => None,
    }
}

/// Walk a conditional export, taking the first key (in manifest order) that is
/// one of `conditions` or `default`.
fn select_condition<'a>(entry: &'a Value, conditions: &[String]) -> Option<&'a str> {
    match entry {
        Value::String(target) => Some(target.as_str()),
        Value::Object(map) => map.iter().find_map(|(name, nested)| {
            if name == "default" || conditions.iter().any(|c| c == name) {
                select_condition(nested, conditions)
            } else {
                None
            }
        }),
        Value::Array(items) => items
            .iter()
            .find_map(|item| select_condition(item, conditions)),
        _ => None,
    }
}
