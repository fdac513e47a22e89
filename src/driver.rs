//! Batch driver - runs patch sets over documents on disk.
//!
//! Each document is read once, patched entirely in memory, and written once.
//! Failures are contained at the document boundary: a document that cannot
//! be read or written becomes a `failed` report entry and the batch moves on.

use crate::edit::{atomic_write, digest, EditError};
use crate::engine::PatchSet;
use crate::report::{BatchReport, DocumentReport, DocumentStatus, RuleReport};
use crate::safety::{SafetyError, SiteGuard};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Write patched documents back to disk
    Apply,
    /// Compute everything, write nothing
    DryRun,
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Unwritable { path: PathBuf, source: EditError },

    #[error("{path} is outside site root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("{file} resolves to {path}, already listed as {first}")]
    Duplicate {
        file: PathBuf,
        path: PathBuf,
        first: PathBuf,
    },

    #[error("splice failed: {0}")]
    Edit(#[from] EditError),
}

impl From<SafetyError> for DocumentError {
    fn from(err: SafetyError) -> Self {
        match err {
            SafetyError::OutsideRoot { path, root } => DocumentError::OutsideRoot { path, root },
            SafetyError::Canonicalize { path, source } => {
                DocumentError::Unreadable { path, source }
            }
        }
    }
}

/// Canonical path -> catalog entry that claimed it first.
type Claims = HashMap<PathBuf, PathBuf>;

/// Record `set`'s document; fails if another set already claimed the same
/// file. Paths that do not resolve are left for `process_document` to report.
fn claim(claims: &mut Claims, set: &PatchSet, guard: &SiteGuard) -> Result<(), DocumentError> {
    let Ok(path) = guard.resolve(&set.file) else {
        return Ok(());
    };
    if let Some(first) = claims.get(&path) {
        return Err(DocumentError::Duplicate {
            file: set.file.clone(),
            path,
            first: first.clone(),
        });
    }
    claims.insert(path, set.file.clone());
    Ok(())
}

/// Check that no two patch sets target the same document on disk.
///
/// Run this over every set of a session before any document is read; each
/// document must be read and written at most once.
pub fn check_distinct<'a>(
    sets: impl IntoIterator<Item = &'a PatchSet>,
    guard: &SiteGuard,
) -> Result<(), DocumentError> {
    let mut claims = Claims::new();
    sets.into_iter()
        .try_for_each(|set| claim(&mut claims, set, guard))
}

/// Run every patch set in `sets` against the documents under `guard`'s root.
///
/// A set whose document was already handled earlier in the batch is
/// reported as failed and never read.
pub fn run_batch(
    catalog: &str,
    sets: &[PatchSet],
    guard: &SiteGuard,
    mode: RunMode,
) -> BatchReport {
    let mut claims = Claims::new();
    let documents = sets
        .iter()
        .map(|set| {
            let result = claim(&mut claims, set, guard)
                .and_then(|()| process_document(set, guard, mode));
            match result {
                Ok(report) => report,
                Err(err) => {
                    warn!(file = %set.file.display(), error = %err, "document failed");
                    DocumentReport::failed(set.file.clone(), err)
                }
            }
        })
        .collect();

    BatchReport {
        catalog: catalog.to_string(),
        documents,
    }
}

/// Read, patch and (in apply mode) write a single document.
pub fn process_document(
    set: &PatchSet,
    guard: &SiteGuard,
    mode: RunMode,
) -> Result<DocumentReport, DocumentError> {
    let path = guard.resolve(&set.file)?;
    let original = fs::read_to_string(&path).map_err(|source| DocumentError::Unreadable {
        path: path.clone(),
        source,
    })?;
    debug!(file = %path.display(), bytes = original.len(), "document read");

    let patched = set.apply(&original)?;

    let status = if patched.changed() {
        DocumentStatus::Patched
    } else if patched.any_skipped() {
        DocumentStatus::Skipped
    } else {
        DocumentStatus::Unchanged
    };

    for (id, outcome) in &patched.outcomes {
        if outcome.is_skipped() {
            warn!(file = %set.file.display(), rule = %id, %outcome, "rule skipped");
        }
    }

    let written = mode == RunMode::Apply && patched.text != original;
    if written {
        atomic_write(&path, patched.text.as_bytes()).map_err(|source| {
            DocumentError::Unwritable {
                path: path.clone(),
                source,
            }
        })?;
        info!(file = %path.display(), "document written");
    }

    let rules = set
        .rules
        .iter()
        .zip(patched.outcomes)
        .map(|(rule, (id, outcome))| RuleReport {
            id,
            outcome,
            fingerprint: rule.fingerprint().clone(),
            occurrences: rule.fingerprint().occurrences(&patched.text),
        })
        .collect();

    Ok(DocumentReport {
        file: set.file.clone(),
        status,
        companion: patched.companion,
        rules,
        written,
        digest_before: Some(format!("{:016x}", digest(&original))),
        digest_after: Some(format!("{:016x}", digest(&patched.text))),
        error: None,
        before: Some(original),
        after: Some(patched.text),
    })
}
