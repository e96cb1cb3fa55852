//! Collision-free naming.

use bale_graph::module_id::is_reserved_word;
use rustc_hash::FxHashSet;

/// Hands out names in one shared scope.
///
/// The first claimant of a name keeps it; later claimants get `name$1`,
/// `name$2`, ... Claim order alone decides the result, so identical inputs
/// always produce identical names.
#[derive(Debug, Default)]
pub(crate) struct NameAllocator {
    taken: FxHashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` as unavailable (host globals, wrapper parameters).
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.taken.insert(name.into());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Claim `base`, or the first free `base$N` that `allowed` accepts.
    pub fn claim(&mut self, base: &str, allowed: impl Fn(&str) -> bool) -> String {
        if !self.is_taken(base) && !is_reserved_word(base) && allowed(base) {
            self.taken.insert(base.to_string());
            return base.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}${n}");
            if !self.is_taken(&candidate) && allowed(&candidate) {
                self.taken.insert(candidate.clone());
                return candidate;
            }
            n += 1;
        }
    }
}

/// Whether `name` can be written as a bare property name or identifier.
pub(crate) fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first == '$' || first.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|ch| ch == '_' || ch == '$' || ch.is_alphanumeric())
}

/// `object.name`, or `object["name"]` when `name` is not an identifier.
pub(crate) fn member(object: &str, name: &str) -> String {
    if is_identifier_name(name) {
        format!("{object}.{name}")
    } else {
        format!("{object}[{}]", string_literal(name))
    }
}

/// Key for an object literal property or accessor.
pub(crate) fn property_key(name: &str) -> String {
    if is_identifier_name(name) {
        name.to_string()
    } else {
        string_literal(name)
    }
}

/// Double-quoted JavaScript string literal.
pub(crate) fn string_literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}
