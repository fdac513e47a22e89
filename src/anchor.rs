//! Anchor resolution - locating fixed points in the current document text.
//!
//! Anchors are either literal substrings or regular expressions. Only the
//! first occurrence counts. Resolution is purely textual; no markup is parsed.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Minimum similarity for a line to be suggested as the intended anchor.
const SUGGESTION_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone)]
pub enum Anchor {
    /// Exact substring match
    Literal(String),
    /// First match of a regular expression
    Pattern(Regex),
}

/// Where content goes relative to the resolved anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Placement {
    /// Immediately after the anchor's end, or after the first `close` marker
    /// that ends at or beyond the anchor's end.
    AfterAnchorEnd { close: Option<String> },
    /// Immediately before the anchor's start.
    BeforeAnchorStart,
}

/// Byte span of a resolved anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorMatch {
    pub start: usize,
    pub end: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AnchorError {
    #[error("anchor not found: {anchor}")]
    NotFound {
        anchor: String,
        /// Closest line in the document, for literal anchors
        suggestion: Option<String>,
    },

    #[error("closing marker {marker:?} not found after anchor {anchor}")]
    CloseMarkerNotFound { anchor: String, marker: String },
}

impl Anchor {
    /// Locate the first occurrence of this anchor in `document`.
    pub fn find(&self, document: &str) -> Option<AnchorMatch> {
        match self {
            Anchor::Literal(text) => document.find(text.as_str()).map(|start| AnchorMatch {
                start,
                end: start + text.len(),
            }),
            Anchor::Pattern(regex) => regex.find(document).map(|m| AnchorMatch {
                start: m.start(),
                end: m.end(),
            }),
        }
    }

    /// Compute the insertion offset for `placement`.
    pub fn resolve_offset(
        &self,
        document: &str,
        placement: &Placement,
    ) -> Result<usize, AnchorError> {
        let found = self.find(document).ok_or_else(|| AnchorError::NotFound {
            anchor: self.to_string(),
            suggestion: self.suggest(document),
        })?;

        match placement {
            Placement::BeforeAnchorStart => Ok(found.start),
            Placement::AfterAnchorEnd { close: None } => Ok(found.end),
            Placement::AfterAnchorEnd {
                close: Some(marker),
            } => close_marker_end(document, found, marker).ok_or_else(|| {
                AnchorError::CloseMarkerNotFound {
                    anchor: self.to_string(),
                    marker: marker.clone(),
                }
            }),
        }
    }

    /// Find the document line most similar to a literal anchor.
    fn suggest(&self, document: &str) -> Option<String> {
        let Anchor::Literal(text) = self else {
            return None;
        };
        let needle = text.trim();
        if needle.is_empty() {
            return None;
        }

        document
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| (strsim::normalized_levenshtein(needle, line), line))
            .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, line)| line.to_string())
    }
}

/// End offset of the first `marker` occurrence that begins at or after the
/// anchor start and ends at or beyond the anchor end.
fn close_marker_end(document: &str, found: AnchorMatch, marker: &str) -> Option<usize> {
    if marker.is_empty() {
        return Some(found.end);
    }
    document[found.start..]
        .match_indices(marker)
        .map(|(idx, m)| found.start + idx + m.len())
        .find(|&end| end >= found.end)
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Literal(text) => write!(f, "{text:?}"),
            Anchor::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::AfterAnchorEnd { close: None } => write!(f, "after anchor end"),
            Placement::AfterAnchorEnd { close: Some(marker) } => {
                write!(f, "after {marker:?} following anchor")
            }
            Placement::BeforeAnchorStart => write!(f, "before anchor start"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "<body><h2 id=\"what-is\">What is Make.com?</h2><p>text</p></body>";

    fn after() -> Placement {
        Placement::AfterAnchorEnd { close: None }
    }

    #[test]
    fn test_literal_after_end() {
        let anchor = Anchor::Literal("<body>".to_string());
        assert_eq!(anchor.resolve_offset(DOC, &after()), Ok(6));
    }

    #[test]
    fn test_literal_before_start() {
        let anchor = Anchor::Literal("<p>".to_string());
        let offset = anchor
            .resolve_offset(DOC, &Placement::BeforeAnchorStart)
            .unwrap();
        assert!(DOC[offset..].starts_with("<p>text"));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let doc = "a-X-b-X-c";
        let anchor = Anchor::Literal("X".to_string());
        assert_eq!(anchor.resolve_offset(doc, &after()), Ok(3));
    }

    #[test]
    fn test_pattern_anchor() {
        let anchor = Anchor::Pattern(Regex::new(r#"<h2 id="what-is"[^>]*>"#).unwrap());
        let offset = anchor
            .resolve_offset(DOC, &Placement::BeforeAnchorStart)
            .unwrap();
        assert_eq!(offset, 6);
    }

    #[test]
    fn test_close_marker_after_opening_tag() {
        let anchor = Anchor::Literal("<h2 id=\"what-is\">".to_string());
        let placement = Placement::AfterAnchorEnd {
            close: Some("</h2>".to_string()),
        };
        let offset = anchor.resolve_offset(DOC, &placement).unwrap();
        assert!(DOC[..offset].ends_with("Make.com?</h2>"));
        assert!(DOC[offset..].starts_with("<p>"));
    }

    #[test]
    fn test_close_marker_inside_anchor_resolves_to_anchor_end() {
        let anchor = Anchor::Literal("<h2 id=\"what-is\">What is Make.com?</h2>".to_string());
        let placement = Placement::AfterAnchorEnd {
            close: Some("</h2>".to_string()),
        };
        let offset = anchor.resolve_offset(DOC, &placement).unwrap();
        assert_eq!(offset, anchor.resolve_offset(DOC, &after()).unwrap());
    }

    #[test]
    fn test_close_marker_missing() {
        let anchor = Anchor::Literal("<p>".to_string());
        let placement = Placement::AfterAnchorEnd {
            close: Some("</section>".to_string()),
        };
        assert!(matches!(
            anchor.resolve_offset(DOC, &placement),
            Err(AnchorError::CloseMarkerNotFound { .. })
        ));
    }

    #[test]
    fn test_not_found_suggests_closest_line() {
        let doc = "<html>\n  <h2 id=\"what-is\">What is Make?</h2>\n</html>\n";
        let anchor = Anchor::Literal("<h2 id=\"what-is\">What is Make.com?</h2>".to_string());
        match anchor.resolve_offset(doc, &after()) {
            Err(AnchorError::NotFound { suggestion, .. }) => {
                assert_eq!(
                    suggestion.as_deref(),
                    Some("<h2 id=\"what-is\">What is Make?</h2>")
                );
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_not_found_without_similar_line() {
        let anchor = Anchor::Literal("<h2 id=\"missing\">".to_string());
        match anchor.resolve_offset("<p>unrelated</p>", &after()) {
            Err(AnchorError::NotFound { suggestion, .. }) => assert!(suggestion.is_none()),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
