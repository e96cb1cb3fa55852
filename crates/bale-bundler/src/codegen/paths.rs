//! Output path conventions.

use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;

/// Directory that inlined package files are emitted under.
const VENDOR_DIR: &str = "vendor";

/// Deepest directory containing every path.
pub(crate) fn common_dir<'a>(paths: impl IntoIterator<Item = &'a Path>) -> PathBuf {
    let mut common: Option<Vec<Component<'a>>> = None;
    for path in paths {
        let dir: Vec<Component<'a>> = path.parent().map(|p| p.components().collect()).unwrap_or_default();
        common = Some(match common {
            None => dir,
            Some(prefix) => prefix
                .into_iter()
                .zip(dir)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    common
        .map(|components| components.iter().map(|c| c.as_os_str()).collect())
        .unwrap_or_default()
}

/// Path of `to` relative to the directory `from_dir`.
pub(crate) fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let (from_dir, to) = (from_dir.clean(), to.clean());
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();
    let shared = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut out = PathBuf::new();
    for _ in shared..from.len() {
        out.push("..");
    }
    for component in &to[shared..] {
        out.push(component.as_os_str());
    }
    out
}

/// Forward-slash form of a path.
pub(crate) fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Import specifier reaching `to` from a module in `from_dir`.
pub(crate) fn relative_specifier(from_dir: &Path, to: &Path) -> String {
    let relative = to_slash(&relative_path(from_dir, to));
    if relative.starts_with("../") {
        relative
    } else {
        format!("./{relative}")
    }
}

/// Output location of a module, relative to the target's output directory.
///
/// Project modules mirror their layout below `base`; files inside
/// `node_modules` move under `vendor/`.
pub(crate) fn module_output_path(path: &Path, base: &Path, extension: &str) -> PathBuf {
    let components: Vec<Component<'_>> = path.components().collect();
    let vendored = components
        .iter()
        .rposition(|c| c.as_os_str() == "node_modules")
        .map(|index| {
            let mut out = PathBuf::from(VENDOR_DIR);
            for component in &components[index + 1..] {
                out.push(component.as_os_str());
            }
            out
        });
    let relative = vendored.unwrap_or_else(|| match path.strip_prefix(base) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => path.file_name().map(PathBuf::from).unwrap_or_default(),
    });
    relative.with_extension(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_dir() {
        let paths = [
            Path::new("/app/src/a.ts"),
            Path::new("/app/src/lib/b.ts"),
            Path::new("/app/src/lib/deep/c.ts"),
        ];
        assert_eq!(common_dir(paths), PathBuf::from("/app/src"));
        assert_eq!(common_dir([Path::new("/app/src/a.ts")]), PathBuf::from("/app/src"));
    }

    #[test]
    fn test_relative_specifiers() {
        assert_eq!(
            relative_specifier(Path::new("/out"), Path::new("/out/b.js")),
            "./b.js"
        );
        assert_eq!(
            relative_specifier(Path::new("/out/lib"), Path::new("/out/b.js")),
            "../b.js"
        );
        assert_eq!(
            relative_specifier(Path::new("/out"), Path::new("/out/lib/c.cjs")),
            "./lib/c.cjs"
        );
    }

    #[test]
    fn test_module_output_paths() {
        let base = Path::new("/app/src");
        assert_eq!(
            module_output_path(Path::new("/app/src/lib/b.ts"), base, "js"),
            PathBuf::from("lib/b.js")
        );
        assert_eq!(
            module_output_path(Path::new("/app/node_modules/dep/esm/index.js"), base, "cjs"),
            PathBuf::from("vendor/dep/esm/index.cjs")
        );
    }

    #[test]
    fn test_relative_path_climbs() {
        assert_eq!(
            to_slash(&relative_path(Path::new("/app/dist"), Path::new("/app/src/a.ts"))),
            "../src/a.ts"
        );
        assert_eq!(
            relative_specifier(Path::new("/app/dist/./esm"), Path::new("/app/dist/esm/lib/../b.js")),
            "./b.js"
        );
    }
}
