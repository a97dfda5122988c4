use crate::engine::runtime::{Error, ErrorCode};
use std::collections::HashMap;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::canonical_combining_class as ccc;

/// String ordering policy looked up by URI.
///
/// `key` must be consistent with `compare`: two strings compare equal exactly
/// when their keys are equal. Hashing and substring matching rely on it.
pub trait Collation: Send + Sync {
    fn uri(&self) -> &str;
    fn compare(&self, a: &str, b: &str) -> core::cmp::Ordering;
    fn key(&self, s: &str) -> String {
        s.to_string()
    }
}

pub use crate::consts::CODEPOINT_URI;
pub use crate::consts::SIMPLE_ACCENT_URI;
pub use crate::consts::SIMPLE_CASE_ACCENT_URI;
pub use crate::consts::SIMPLE_CASE_URI;

/// Resolve an explicit collation argument, falling back to `default` and then
/// to codepoint order. An unknown URI is `err:FOCH0002`.
pub fn resolve_collation(
    registry: &CollationRegistry,
    default: Option<&str>,
    uri: Option<&str>,
) -> Result<Arc<dyn Collation>, Error> {
    match uri.or(default) {
        Some(u) => registry
            .get(u)
            .ok_or_else(|| Error::from_code(ErrorCode::FOCH0002, format!("unknown collation URI: {u}"))),
        None => Ok(Arc::new(CodepointCollation)),
    }
}

pub struct CodepointCollation;

impl Collation for CodepointCollation {
    fn uri(&self) -> &str {
        CODEPOINT_URI
    }
    fn compare(&self, a: &str, b: &str) -> core::cmp::Ordering {
        a.cmp(b)
    }
}

fn strip_marks(s: &str) -> String {
    s.nfd().filter(|&ch| ccc(ch) == 0).collect()
}

/// Case-insensitive.
pub struct SimpleCaseCollation;

impl Collation for SimpleCaseCollation {
    fn uri(&self) -> &str {
        SIMPLE_CASE_URI
    }
    fn compare(&self, a: &str, b: &str) -> core::cmp::Ordering {
        self.key(a).cmp(&self.key(b))
    }
    fn key(&self, s: &str) -> String {
        s.to_lowercase()
    }
}

/// Accent-insensitive (NFD with combining marks removed).
pub struct SimpleAccentCollation;

impl Collation for SimpleAccentCollation {
    fn uri(&self) -> &str {
        SIMPLE_ACCENT_URI
    }
    fn compare(&self, a: &str, b: &str) -> core::cmp::Ordering {
        self.key(a).cmp(&self.key(b))
    }
    fn key(&self, s: &str) -> String {
        strip_marks(s)
    }
}

pub struct SimpleCaseAccentCollation;

impl Collation for SimpleCaseAccentCollation {
    fn uri(&self) -> &str {
        SIMPLE_CASE_ACCENT_URI
    }
    fn compare(&self, a: &str, b: &str) -> core::cmp::Ordering {
        self.key(a).cmp(&self.key(b))
    }
    fn key(&self, s: &str) -> String {
        strip_marks(s).to_lowercase()
    }
}

/// Registry of available collations, keyed by their URI.
pub struct CollationRegistry {
    by_uri: HashMap<String, Arc<dyn Collation>>,
}

impl Default for CollationRegistry {
    fn default() -> Self {
        let mut reg = Self { by_uri: HashMap::new() };
        reg.insert(Arc::new(CodepointCollation));
        reg.insert(Arc::new(SimpleCaseCollation));
        reg.insert(Arc::new(SimpleAccentCollation));
        reg.insert(Arc::new(SimpleCaseAccentCollation));
        reg
    }
}

impl CollationRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self, uri: &str) -> Option<Arc<dyn Collation>> {
        self.by_uri.get(uri).cloned()
    }
    pub fn insert(&mut self, collation: Arc<dyn Collation>) {
        self.by_uri.insert(collation.uri().to_string(), collation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accent_and_case_keys_agree_with_compare() {
        let c = SimpleCaseAccentCollation;
        assert_eq!(c.compare("Élan", "elan"), core::cmp::Ordering::Equal);
        assert_eq!(c.key("Élan"), c.key("elan"));
        assert_ne!(SimpleCaseCollation.key("Élan"), SimpleCaseCollation.key("elan"));
    }

    #[test]
    fn unknown_uri_is_foch0002() {
        let reg = CollationRegistry::default();
        let err = resolve_collation(&reg, None, Some("urn:nope")).err().map(|e| e.code_enum());
        assert_eq!(err, Some(ErrorCode::FOCH0002));
        assert_eq!(resolve_collation(&reg, None, None).map(|c| c.uri().to_string()).ok().as_deref(), Some(CODEPOINT_URI));
    }
}
