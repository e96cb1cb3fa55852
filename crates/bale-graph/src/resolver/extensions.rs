//! File extension inference and directory index lookup.

use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Extensions probed, in order, when a specifier names no file directly.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs"];

/// TypeScript sources may be imported through the extension they compile to
/// (`./util.js` naming `util.ts`).
fn typescript_counterparts(path: &Path) -> &'static [&'static str] {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js") => &["ts", "tsx"],
        Some("jsx") => &["tsx"],
        Some("mjs") => &["mts"],
        Some("cjs") => &["cts"],
        _ => &[],
    }
}

/// Resolve `candidate` to a file: exact path, extension inference, the
/// JS→TS counterpart, then `index.*` inside a directory.
pub async fn resolve_with_extensions(
    candidate: &Path,
    extensions: &[String],
    runtime: &dyn Runtime,
) -> Option<PathBuf> {
    if runtime.is_file(candidate).await {
        return Some(candidate.to_path_buf());
    }
    if let Some(found) = try_extensions(candidate, extensions, runtime).await {
        return Some(found);
    }
    for ext in typescript_counterparts(candidate) {
        let swapped = candidate.with_extension(ext);
        if runtime.is_file(&swapped).await {
            return Some(swapped);
        }
    }
    try_index_files(candidate, extensions, runtime).await
}

/// Append each extension to `candidate` and return the first existing file.
pub async fn try_extensions(
    candidate: &Path,
    extensions: &[String],
    runtime: &dyn Runtime,
) -> Option<PathBuf> {
    for ext in extensions {
        let mut with_ext = candidate.as_os_str().to_owned();
        with_ext.push(ext);
        let path = PathBuf::from(with_ext);
        if runtime.is_file(&path).await {
            return Some(path);
        }
    }
    None
}

/// Treat `candidate` as a directory and look for `index.<ext>`.
pub async fn try_index_files(
    candidate: &Path,
    extensions: &[String],
    runtime: &dyn Runtime,
) -> Option<PathBuf> {
    try_extensions(&candidate.join("index"), extensions, runtime).await
}
