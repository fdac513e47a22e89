//! Patch engine - applies ordered rules to a document held in memory.
//!
//! Each rule is consulted against the *current* text, so a later rule can
//! anchor on content inserted by an earlier one. Rule order is part of the
//! contract.

use crate::anchor::{Anchor, AnchorError, Placement};
use crate::companion::CompanionLink;
use crate::edit::{EditError, Splice};
use crate::fingerprint::{self, Fingerprint};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// A declarative insertion: put `content` at `placement` relative to `anchor`.
#[derive(Debug, Clone)]
pub struct PatchRule {
    pub id: String,
    pub anchor: Anchor,
    pub placement: Placement,
    pub content: String,
    fingerprint: Fingerprint,
}

/// Outcome of applying one rule (or companion link) to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
#[must_use = "RuleOutcome should be checked for applied/skipped"]
pub enum RuleOutcome {
    /// Content was spliced in at `offset`
    Applied { offset: usize, bytes: usize },
    /// Fingerprint already present; document untouched
    AlreadyApplied,
    /// Anchor could not be resolved; document untouched
    Skipped(AnchorError),
}

impl RuleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RuleOutcome::Applied { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, RuleOutcome::Skipped(_))
    }
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOutcome::Applied { offset, bytes } => {
                write!(f, "inserted {bytes} bytes at offset {offset}")
            }
            RuleOutcome::AlreadyApplied => write!(f, "already applied"),
            RuleOutcome::Skipped(err) => write!(f, "skipped: {err}"),
        }
    }
}

impl PatchRule {
    pub fn new(
        id: impl Into<String>,
        anchor: Anchor,
        placement: Placement,
        content: impl Into<String>,
        fingerprint_len: usize,
    ) -> Self {
        let content = content.into();
        let fingerprint = Fingerprint::of(&content, fingerprint_len);
        Self {
            id: id.into(),
            anchor,
            placement,
            content,
            fingerprint,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Work out where this rule would insert, without touching the document.
    pub fn plan(&self, document: &str) -> Result<Option<Splice>, AnchorError> {
        if fingerprint::is_applied(document, self) {
            return Ok(None);
        }
        let offset = self.anchor.resolve_offset(document, &self.placement)?;
        Ok(Some(Splice::new(offset, self.content.as_str())))
    }

    /// Apply this rule to `document` in place.
    pub fn apply(&self, document: &mut String) -> Result<RuleOutcome, EditError> {
        let outcome = match self.plan(document) {
            Ok(None) => RuleOutcome::AlreadyApplied,
            Ok(Some(splice)) => {
                let bytes = splice.apply(document)?;
                RuleOutcome::Applied {
                    offset: splice.offset,
                    bytes,
                }
            }
            Err(err) => RuleOutcome::Skipped(err),
        };
        debug!(rule = %self.id, %outcome, "rule evaluated");
        Ok(outcome)
    }
}

/// Apply `rules` in order, threading the document through each one.
pub fn apply_all(
    document: &str,
    rules: &[PatchRule],
) -> Result<(String, Vec<RuleOutcome>), EditError> {
    let mut text = document.to_string();
    let outcomes = rules
        .iter()
        .map(|rule| rule.apply(&mut text))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((text, outcomes))
}

/// An ordered rule sequence bound to one target document.
#[derive(Debug, Clone)]
pub struct PatchSet {
    /// Document path, relative to the site root
    pub file: PathBuf,
    /// Resource link ensured before any rule runs
    pub companion: Option<CompanionLink>,
    pub rules: Vec<PatchRule>,
}

/// A document after a [`PatchSet`] has run over it.
#[derive(Debug, Clone)]
pub struct PatchedDocument {
    pub text: String,
    pub companion: Option<RuleOutcome>,
    /// One outcome per rule, in declared order
    pub outcomes: Vec<(String, RuleOutcome)>,
}

impl PatchedDocument {
    /// Whether anything was inserted.
    pub fn changed(&self) -> bool {
        self.companion.as_ref().is_some_and(RuleOutcome::is_applied)
            || self.outcomes.iter().any(|(_, o)| o.is_applied())
    }

    /// Whether any rule or the companion link was skipped.
    pub fn any_skipped(&self) -> bool {
        self.companion.as_ref().is_some_and(RuleOutcome::is_skipped)
            || self.outcomes.iter().any(|(_, o)| o.is_skipped())
    }
}

impl PatchSet {
    pub fn apply(&self, document: &str) -> Result<PatchedDocument, EditError> {
        let mut text = document.to_string();

        let companion = self
            .companion
            .as_ref()
            .map(|link| link.ensure(&mut text))
            .transpose()?;

        let mut outcomes = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            outcomes.push((rule.id.clone(), rule.apply(&mut text)?));
        }

        Ok(PatchedDocument {
            text,
            companion,
            outcomes,
        })
    }
}
