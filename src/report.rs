//! Batch reporting - what happened to each document and each rule.

use crate::engine::RuleOutcome;
use crate::fingerprint::Fingerprint;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentStatus {
    /// At least one insertion was made
    Patched,
    /// Everything was already present
    Unchanged,
    /// Nothing inserted and at least one anchor was missing
    Skipped,
    /// Document could not be read, written, or was rejected
    Failed,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentStatus::Patched => "patched",
            DocumentStatus::Unchanged => "unchanged",
            DocumentStatus::Skipped => "skipped",
            DocumentStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Whether a rule's fingerprint occurs exactly once after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Verification {
    Verified,
    /// Rule would still insert content
    Pending,
    Missing,
    Duplicated { count: usize },
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Verified => write!(f, "verified"),
            Verification::Pending => write!(f, "not yet applied"),
            Verification::Missing => write!(f, "missing"),
            Verification::Duplicated { count } => write!(f, "duplicated ({count} copies)"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleReport {
    pub id: String,
    pub outcome: RuleOutcome,
    pub fingerprint: Fingerprint,
    /// Fingerprint occurrences in the final document text
    pub occurrences: usize,
}

impl RuleReport {
    pub fn verification(&self) -> Verification {
        if self.outcome.is_applied() {
            return Verification::Pending;
        }
        match self.occurrences {
            0 => Verification::Missing,
            1 => Verification::Verified,
            count => Verification::Duplicated { count },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub file: PathBuf,
    pub status: DocumentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companion: Option<RuleOutcome>,
    pub rules: Vec<RuleReport>,
    /// Whether the document was rewritten on disk
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest_after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub before: Option<String>,
    #[serde(skip)]
    pub after: Option<String>,
}

impl DocumentReport {
    pub fn failed(file: PathBuf, error: impl fmt::Display) -> Self {
        Self {
            file,
            status: DocumentStatus::Failed,
            companion: None,
            rules: Vec::new(),
            written: false,
            digest_before: None,
            digest_after: None,
            error: Some(error.to_string()),
            before: None,
            after: None,
        }
    }

    /// True when nothing is pending and every fingerprint occurs exactly once.
    pub fn is_verified(&self) -> bool {
        self.status != DocumentStatus::Failed
            && !self
                .companion
                .as_ref()
                .is_some_and(|c| c.is_applied() || c.is_skipped())
            && self
                .rules
                .iter()
                .all(|r| r.verification() == Verification::Verified)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub patched: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Documents rewritten on disk
    pub touched: usize,
    pub rules_applied: usize,
    pub rules_already_applied: usize,
    pub rules_skipped: usize,
}

impl Summary {
    pub fn merge(&mut self, other: &Summary) {
        self.patched += other.patched;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.touched += other.touched;
        self.rules_applied += other.rules_applied;
        self.rules_already_applied += other.rules_already_applied;
        self.rules_skipped += other.rules_skipped;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub catalog: String,
    pub documents: Vec<DocumentReport>,
}

impl BatchReport {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for doc in &self.documents {
            match doc.status {
                DocumentStatus::Patched => summary.patched += 1,
                DocumentStatus::Unchanged => summary.unchanged += 1,
                DocumentStatus::Skipped => summary.skipped += 1,
                DocumentStatus::Failed => summary.failed += 1,
            }
            if doc.written {
                summary.touched += 1;
            }
            for rule in &doc.rules {
                match rule.outcome {
                    RuleOutcome::Applied { .. } => summary.rules_applied += 1,
                    RuleOutcome::AlreadyApplied => summary.rules_already_applied += 1,
                    RuleOutcome::Skipped(_) => summary.rules_skipped += 1,
                }
            }
        }
        summary
    }
}
