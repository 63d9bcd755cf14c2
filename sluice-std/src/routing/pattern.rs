use regex::Regex;
use sluice_core::ConfigurationError;
use std::fmt;

/// A name pattern where `*` matches any sequence of characters and
/// everything else matches literally.
///
/// Used for wildcard routing keys, interceptor targets and pointcuts.
#[derive(Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
}

impl WildcardPattern {
    /// Compile `pattern` into an anchored matcher.
    pub fn new(pattern: &str) -> Result<Self, ConfigurationError> {
        let anchored = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*"));
        let regex = Regex::new(&anchored).map_err(|e| ConfigurationError::InvalidPattern {
            pattern: pattern.to_string(),
            source: e.into(),
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Whether `name` matches the whole pattern.
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WildcardPattern").field(&self.source).finish()
    }
}

impl fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_any_suffix() {
        let pattern = WildcardPattern::new("order.*").unwrap();
        assert!(pattern.is_match("order.created"));
        assert!(pattern.is_match("order."));
        assert!(!pattern.is_match("orders.created"));
        assert!(!pattern.is_match("my.order.created"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pattern = WildcardPattern::new("a+b(c)?").unwrap();
        assert!(pattern.is_match("a+b(c)?"));
        assert!(!pattern.is_match("aab"));
    }

    #[test]
    fn test_star_alone_matches_everything() {
        let pattern = WildcardPattern::new("*").unwrap();
        assert!(pattern.is_match(""));
        assert!(pattern.is_match("anything.at.all"));
    }
}
