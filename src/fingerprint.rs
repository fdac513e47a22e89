//! Fingerprint guard - detects whether a patch is already present.
//!
//! A fingerprint is the leading slice of a patch's trimmed content. If that
//! slice already occurs anywhere in the document, the patch counts as applied.
//! Short fingerprints are cheap and tolerate whitespace drift in the rest of
//! the content, at the price of occasional false positives.

use crate::engine::PatchRule;
use serde::Serialize;
use std::fmt;

/// Default fingerprint length, in characters.
pub const DEFAULT_FINGERPRINT_LEN: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive a fingerprint from patch content.
    ///
    /// Takes the first `len` characters of the trimmed content, or the whole
    /// trimmed content when it is shorter. Never splits a code point.
    pub fn of(content: &str, len: usize) -> Self {
        let trimmed = content.trim();
        let end = trimmed
            .char_indices()
            .nth(len)
            .map_or(trimmed.len(), |(idx, _)| idx);
        Self(trimmed[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the fingerprint occurs anywhere in `document`.
    pub fn is_present_in(&self, document: &str) -> bool {
        !self.0.is_empty() && document.contains(self.0.as_str())
    }

    /// Number of non-overlapping occurrences in `document`.
    pub fn occurrences(&self, document: &str) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        document.matches(self.0.as_str()).count()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Check whether `rule` has already been applied to `document`.
pub fn is_applied(document: &str, rule: &PatchRule) -> bool {
    rule.fingerprint().is_present_in(document)
}
