//! Symbol key - Stable structural identity for every symbol occurrence
//!
//! Format: `<tex_path>#<equation_index>/<token_index>`
//!
//! Examples:
//! - `main.tex#3/0`
//! - `sections/results.tex#12/4`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Structural identity of one symbol occurrence within a document.
///
/// Assigned by the upstream extractor, unique within a document and stable
/// across runs. All linkage (parent/child, geometry, matches) resolves
/// through this key until database ids exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolKey {
    /// TeX source file the equation came from, relative to the bundle root
    pub tex_path: String,
    /// Index of the equation within that file (0-indexed)
    pub equation_index: i32,
    /// Index of the token within that equation (0-indexed)
    pub token_index: i32,
}

impl SymbolKey {
    /// Create a new SymbolKey
    pub fn new(tex_path: impl Into<String>, equation_index: i32, token_index: i32) -> Self {
        Self {
            tex_path: tex_path.into(),
            equation_index,
            token_index,
        }
    }

    /// Parse a key string into a SymbolKey
    ///
    /// Expected format: `<tex_path>#<equation_index>/<token_index>`
    pub fn parse(key: &str) -> Result<Self> {
        let (tex_path, indices) = key
            .rsplit_once('#')
            .ok_or_else(|| Error::InvalidKey(format!("missing # in {}", key)))?;

        let (equation_str, token_str) = indices
            .split_once('/')
            .ok_or_else(|| Error::InvalidKey(format!("missing /token in {}", key)))?;

        let equation_index: i32 = equation_str
            .parse()
            .map_err(|_| Error::InvalidKey(format!("bad equation index in {}", key)))?;
        let token_index: i32 = token_str
            .parse()
            .map_err(|_| Error::InvalidKey(format!("bad token index in {}", key)))?;

        Ok(Self {
            tex_path: tex_path.to_string(),
            equation_index,
            token_index,
        })
    }

    /// Convert to key string
    pub fn to_key_string(&self) -> String {
        format!("{}#{}/{}", self.tex_path, self.equation_index, self.token_index)
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key_string())
    }
}

impl FromStr for SymbolKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for SymbolKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_key_string())
    }
}

impl<'de> Deserialize<'de> for SymbolKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SymbolKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_roundtrip() {
        let key = SymbolKey::new("sections/results.tex", 12, 4);
        let key_str = key.to_key_string();
        assert_eq!(key_str, "sections/results.tex#12/4");

        let parsed = SymbolKey::parse(&key_str).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_key_parse() {
        let key = SymbolKey::parse("main.tex#3/0").unwrap();
        assert_eq!(key.tex_path, "main.tex");
        assert_eq!(key.equation_index, 3);
        assert_eq!(key.token_index, 0);
    }

    #[test]
    fn test_invalid_key() {
        assert!(SymbolKey::parse("main.tex").is_err());
        assert!(SymbolKey::parse("main.tex#3").is_err());
        assert!(SymbolKey::parse("main.tex#a/b").is_err());
    }
}
