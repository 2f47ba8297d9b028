//! Validators run on every assignment to an attribute binding.
//!
//! A binding carries a chain of [`Validator`]s; the first one that rejects a
//! value aborts the assignment with a [`ValidationError`](crate::ValidationError)
//! and the record is left untouched. `NULL` passes every validator except
//! [`NotNull`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use regex::Regex;

use crate::value::Value;

/// A check applied to values before they are stored.
pub trait Validator: fmt::Debug + Send + Sync {
    /// Returns the reason for rejecting `value`, if any.
    fn check(&self, value: &Value) -> Result<(), String>;
}

/// Rejects `NULL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotNull;

impl Validator for NotNull {
    fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            Err("may not be NULL".to_string())
        } else {
            Ok(())
        }
    }
}

/// Rejects empty strings and empty byte strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotEmpty;

impl Validator for NotEmpty {
    fn check(&self, value: &Value) -> Result<(), String> {
        match value {
            Value::Text(s) if s.is_empty() => Err("may not be empty".to_string()),
            Value::Bytes(b) if b.is_empty() => Err("may not be empty".to_string()),
            _ => Ok(()),
        }
    }
}

/// Upper bound on the length of text (in characters) or bytes.
#[derive(Debug, Clone, Copy)]
pub struct MaxLength(pub usize);

impl Validator for MaxLength {
    fn check(&self, value: &Value) -> Result<(), String> {
        let len = match value {
            Value::Text(s) => s.chars().count(),
            Value::Bytes(b) => b.len(),
            _ => return Ok(()),
        };
        if len > self.0 {
            Err(format!("length {len} exceeds maximum of {}", self.0))
        } else {
            Ok(())
        }
    }
}

/// `lo < value < hi`, or `lo <= value <= hi` with [`Range::include_bounds`].
///
/// Works for anything [`Value::compare`] can order: numbers, text, dates.
#[derive(Debug, Clone)]
pub struct Range {
    lo: Value,
    hi: Value,
    include_bounds: bool,
}

impl Range {
    pub fn new(lo: impl Into<Value>, hi: impl Into<Value>) -> Self {
        Self {
            lo: lo.into(),
            hi: hi.into(),
            include_bounds: false,
        }
    }

    pub fn include_bounds(mut self) -> Self {
        self.include_bounds = true;
        self
    }
}

impl Validator for Range {
    fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Ok(());
        }
        let above = self.lo.compare(value);
        let below = value.compare(&self.hi);
        let ok = if self.include_bounds {
            matches!(above, Some(Ordering::Less | Ordering::Equal))
                && matches!(below, Some(Ordering::Less | Ordering::Equal))
        } else {
            above == Some(Ordering::Less) && below == Some(Ordering::Less)
        };
        if ok {
            Ok(())
        } else {
            let op = if self.include_bounds { "<=" } else { "<" };
            Err(format!(
                "unmatched condition: {:?} {op} {:?} {op} {:?}",
                self.lo, value, self.hi
            ))
        }
    }
}

const EMAIL_PATTERN: &str = r"^[-a-z0-9_.]+@([0-9a-z]([0-9a-z-]*[0-9a-z])?\.)+[a-z]{2,}$";
const FQDN_PATTERN: &str = r"^([0-9a-z]([0-9a-z-]*[0-9a-z])?\.)+[a-z]{2,}$";

/// Text must match a regular expression.
#[derive(Debug, Clone)]
pub struct Pattern {
    pattern: String,
}

impl Pattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Lowercase e-mail addresses.
    pub fn email() -> Self {
        Self::new(EMAIL_PATTERN)
    }

    /// Lowercase fully qualified domain names.
    pub fn fqdn() -> Self {
        Self::new(FQDN_PATTERN)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Validator for Pattern {
    fn check(&self, value: &Value) -> Result<(), String> {
        match value {
            Value::Text(s) if !matches_pattern(s, &self.pattern) => {
                Err(format!("{s:?} does not match regular expression {}", self.pattern))
            }
            _ => Ok(()),
        }
    }
}

/// An arbitrary predicate with a description used as the rejection reason.
#[derive(Clone)]
pub struct Predicate {
    description: String,
    check: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl Predicate {
    pub fn new(
        description: impl Into<String>,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl Validator for Predicate {
    fn check(&self, value: &Value) -> Result<(), String> {
        if value.is_null() || (self.check)(value) {
            Ok(())
        } else {
            Err(self.description.clone())
        }
    }
}

/// Compiled patterns, shared by every [`Pattern`] in the process.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern.
///
/// An invalid pattern is logged and treated as a non-match.
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation, treating as non-match"
            );
            false
        }
    }
}

/// Returns an error message if the pattern does not compile.
pub fn validate_pattern(pattern: &str) -> Option<String> {
    match Regex::new(pattern) {
        Ok(_) => None,
        Err(e) => Some(format!("invalid regex pattern: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_null() {
        assert!(NotNull.check(&Value::Null).is_err());
        assert!(NotNull.check(&Value::Int(0)).is_ok());
    }

    #[test]
    fn test_not_empty_ignores_null() {
        assert!(NotEmpty.check(&Value::Text(String::new())).is_err());
        assert!(NotEmpty.check(&Value::Null).is_ok());
        assert!(NotEmpty.check(&Value::Text("x".into())).is_ok());
    }

    #[test]
    fn test_max_length_counts_chars() {
        let v = MaxLength(3);
        assert!(v.check(&Value::Text("äöü".into())).is_ok());
        assert!(v.check(&Value::Text("abcd".into())).is_err());
        assert!(v.check(&Value::Null).is_ok());
    }

    #[test]
    fn test_range_exclusive_by_default() {
        let r = Range::new(0, 10);
        assert!(r.check(&Value::Int(5)).is_ok());
        assert!(r.check(&Value::Int(0)).is_err());
        assert!(r.check(&Value::Int(10)).is_err());
        assert!(r.check(&Value::Double(9.5)).is_ok());
        assert!(r.check(&Value::Null).is_ok());
    }

    #[test]
    fn test_range_include_bounds() {
        let r = Range::new(0, 10).include_bounds();
        assert!(r.check(&Value::Int(0)).is_ok());
        assert!(r.check(&Value::Int(10)).is_ok());
        assert!(r.check(&Value::Int(11)).is_err());
    }

    #[test]
    fn test_range_rejects_incomparable() {
        let r = Range::new(0, 10);
        assert!(r.check(&Value::Text("5".into())).is_err());
    }

    #[test]
    fn test_email_pattern() {
        let v = Pattern::email();
        assert!(v.check(&Value::Text("diedrich@tux4web.de".into())).is_ok());
        assert!(v.check(&Value::Text("not an address".into())).is_err());
        assert!(v.check(&Value::Null).is_ok());
    }

    #[test]
    fn test_fqdn_pattern() {
        let v = Pattern::fqdn();
        assert!(v.check(&Value::Text("www.example.org".into())).is_ok());
        assert!(v.check(&Value::Text("localhost".into())).is_err());
    }

    #[test]
    fn test_invalid_pattern_is_non_match() {
        assert!(!matches_pattern("anything", r"[unclosed"));
        assert!(validate_pattern(r"[unclosed").is_some());
        assert!(validate_pattern(r"^\d+$").is_none());
    }

    #[test]
    fn test_predicate() {
        let even = Predicate::new("must be even", |v| v.as_i64().is_some_and(|n| n % 2 == 0));
        assert!(even.check(&Value::Int(4)).is_ok());
        assert_eq!(even.check(&Value::Int(3)), Err("must be even".to_string()));
    }
}
