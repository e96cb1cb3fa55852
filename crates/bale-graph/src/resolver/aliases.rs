//! Path alias handling (`@` → `./src`, `~lib` → `./vendor/lib`).

use indexmap::IndexMap;

/// Rewrite `specifier` through the longest matching alias.
///
/// An alias key matches the whole specifier or a `/`-separated prefix of it;
/// `@` matches `@/utils` but not `@scope/pkg`'s sibling `@scoped`.
pub fn resolve_path_alias(specifier: &str, aliases: &IndexMap<String, String>) -> Option<String> {
    let mut best: Option<(&str, &str)> = None;

    for (key, target) in aliases {
        let key = key.trim_end_matches('/');
        if key.is_empty() {
            continue;
        }
        let matches = specifier == key
            || specifier
                .strip_prefix(key)
                .is_some_and(|rest| rest.starts_with('/'));
        if matches && best.is_none_or(|(current, _)| key.len() > current.len()) {
            best = Some((key, target.as_str()));
        }
    }

    best.map(|(key, target)| {
        let rest = &specifier[key.len()..];
        format!("{}{}", target.trim_end_matches('/'), rest)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_alias_prefix_and_exact_match() {
        let map = aliases(&[("@", "./src"), ("~utils", "./src/utils/index.ts")]);

        assert_eq!(
            resolve_path_alias("@/components/button", &map).as_deref(),
            Some("./src/components/button")
        );
        assert_eq!(
            resolve_path_alias("~utils", &map).as_deref(),
            Some("./src/utils/index.ts")
        );
        assert_eq!(resolve_path_alias("@scope/pkg", &map), None);
        assert_eq!(resolve_path_alias("react", &map), None);
    }

    #[test]
    fn test_longest_alias_wins() {
        let map = aliases(&[("@", "./src"), ("@/lib", "./vendor/lib")]);

        assert_eq!(
            resolve_path_alias("@/lib/x", &map).as_deref(),
            Some("./vendor/lib/x")
        );
        assert_eq!(resolve_path_alias("@/app", &map).as_deref(), Some("./src/app"));
    }
}
