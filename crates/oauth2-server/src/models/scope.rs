//! Space-delimited scope sets.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A set of scope tokens, parsed from and rendered as a space-delimited string.
///
/// Duplicate tokens collapse and ordering is canonical, so `"write read read"`
/// and `"read write"` are the same scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Scope {
    tokens: BTreeSet<String>,
}

impl Scope {
    /// Parse a space-delimited scope string. Empty tokens are ignored.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self { tokens: raw.split_whitespace().map(str::to_owned).collect() }
    }

    /// Parse a scope string, rejecting tokens outside the RFC 6749 §3.3 character set.
    #[must_use]
    pub fn parse_strict(raw: &str) -> Option<Self> {
        let well_formed = raw
            .split(' ')
            .flat_map(str::chars)
            .all(|c| matches!(c, '\x21' | '\x23'..='\x5b' | '\x5d'..='\x7e'));
        well_formed.then(|| Self::parse(raw))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// True when every token of `self` is also in `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.tokens.is_subset(&other.tokens)
    }

    /// True when `self` grants every token of `required`.
    #[must_use]
    pub fn contains_all(&self, required: &Self) -> bool {
        required.is_subset_of(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    /// `None` for an empty scope, so empty scopes are omitted from responses.
    #[must_use]
    pub fn to_option_string(&self) -> Option<String> {
        (!self.is_empty()).then(|| self.to_string())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in &self.tokens {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(token)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Scope {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for Scope {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for Scope {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

impl<'a> FromIterator<&'a str> for Scope {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self { tokens: iter.into_iter().filter(|t| !t.is_empty()).map(str::to_owned).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collapses_duplicates_and_whitespace() {
        let scope = Scope::parse("  write read  read ");
        assert_eq!(scope.len(), 2);
        assert_eq!(scope.to_string(), "read write");
    }

    #[test]
    fn test_subset() {
        let granted = Scope::parse("read write");
        assert!(Scope::parse("read").is_subset_of(&granted));
        assert!(Scope::parse("").is_subset_of(&granted));
        assert!(!Scope::parse("admin").is_subset_of(&granted));
        assert!(!Scope::parse("read admin").is_subset_of(&granted));
        assert!(granted.contains_all(&Scope::parse("write")));
    }

    #[test]
    fn test_strict_parse_rejects_quotes_and_backslashes() {
        assert!(Scope::parse_strict("read write:all").is_some());
        assert!(Scope::parse_strict("read \"write\"").is_none());
        assert!(Scope::parse_strict("read\\write").is_none());
        assert!(Scope::parse_strict("read\twrite").is_none());
    }

    #[test]
    fn test_empty_scope_is_omitted() {
        assert_eq!(Scope::default().to_option_string(), None);
        assert_eq!(Scope::parse("read").to_option_string().as_deref(), Some("read"));
    }

    #[test]
    fn test_serde_as_string() {
        let scope = Scope::parse("write read");
        assert_eq!(serde_json::to_string(&scope).unwrap(), "\"read write\"");
        let back: Scope = serde_json::from_str("\"read  write\"").unwrap();
        assert_eq!(back, scope);
    }
}
