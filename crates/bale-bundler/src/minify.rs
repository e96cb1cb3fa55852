//! Minification level configuration.
//!
//! Levels are accepted as strings so an external configuration loader can
//! pass them through untouched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How aggressively generated JavaScript is minified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MinifyLevel {
    /// No minification - output readable code.
    #[default]
    None,
    /// Remove whitespace and comments only.
    Whitespace,
    /// Syntax-level compression (names preserved).
    Syntax,
    /// Compression plus identifier mangling.
    Identifiers,
}

impl MinifyLevel {
    /// Parse a minification level from a string.
    ///
    /// # Supported Values
    ///
    /// - `"none"` / `"false"` - No minification
    /// - `"whitespace"` - Remove whitespace only
    /// - `"syntax"` - Syntax-level minification
    /// - `"identifiers"` / `"true"` - Full minification with identifier mangling
    ///
    /// Values are case-insensitive.
    ///
    /// # Examples
    ///
    /// ```
    /// use bale_bundler::MinifyLevel;
    ///
    /// assert_eq!(MinifyLevel::parse("none").unwrap(), MinifyLevel::None);
    /// assert_eq!(MinifyLevel::parse("IDENTIFIERS").unwrap(), MinifyLevel::Identifiers);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error for unrecognized values.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "false" => Ok(Self::None),
            "whitespace" => Ok(Self::Whitespace),
            "syntax" => Ok(Self::Syntax),
            "identifiers" | "true" => Ok(Self::Identifiers),
            _ => Err(Error::InvalidConfig(format!(
                "Invalid minify level: '{}'. Expected: none, whitespace, syntax, identifiers",
                s
            ))),
        }
    }

    /// Returns true if any minification is enabled.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether the compressor runs (dead-code elimination, constant folding).
    pub fn compresses(&self) -> bool {
        *self >= Self::Syntax
    }

    pub fn mangles(&self) -> bool {
        *self == Self::Identifiers
    }
}

impl FromStr for MinifyLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MinifyLevel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MinifyLevel> for String {
    fn from(level: MinifyLevel) -> Self {
        level.to_string()
    }
}

impl fmt::Display for MinifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Whitespace => write!(f, "whitespace"),
            Self::Syntax => write!(f, "syntax"),
            Self::Identifiers => write!(f, "identifiers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_levels() {
        assert_eq!(MinifyLevel::parse("none").unwrap(), MinifyLevel::None);
        assert_eq!(
            MinifyLevel::parse("whitespace").unwrap(),
            MinifyLevel::Whitespace
        );
        assert_eq!(MinifyLevel::parse("syntax").unwrap(), MinifyLevel::Syntax);
        assert_eq!(
            MinifyLevel::parse("identifiers").unwrap(),
            MinifyLevel::Identifiers
        );
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(MinifyLevel::parse("NONE").unwrap(), MinifyLevel::None);
        assert_eq!(
            MinifyLevel::parse("Whitespace").unwrap(),
            MinifyLevel::Whitespace
        );
        assert_eq!(
            MinifyLevel::parse("IDENTIFIERS").unwrap(),
            MinifyLevel::Identifiers
        );
    }

    #[test]
    fn test_parse_boolean_aliases() {
        assert_eq!(MinifyLevel::parse("true").unwrap(), MinifyLevel::Identifiers);
        assert_eq!(MinifyLevel::parse("false").unwrap(), MinifyLevel::None);
    }

    #[test]
    fn test_parse_invalid() {
        let err = MinifyLevel::parse("aggressive").unwrap_err();
        assert!(err.to_string().contains("Invalid minify level"));
    }

    #[test]
    fn test_stage_switches() {
        assert!(!MinifyLevel::None.is_enabled());
        assert!(!MinifyLevel::Whitespace.compresses());
        assert!(MinifyLevel::Syntax.compresses());
        assert!(!MinifyLevel::Syntax.mangles());
        assert!(MinifyLevel::Identifiers.mangles());
    }

    #[test]
    fn test_serde_uses_strings() {
        let level: MinifyLevel = serde_json::from_str("\"syntax\"").unwrap();
        assert_eq!(level, MinifyLevel::Syntax);
        assert_eq!(serde_json::to_string(&MinifyLevel::Whitespace).unwrap(), "\"whitespace\"");
        assert!(serde_json::from_str::<MinifyLevel>("\"loud\"").is_err());
    }
}
