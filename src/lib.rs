//! Anchor Patcher: idempotent anchor-based document patching
//!
//! Inserts declared snippets into text documents next to anchor strings or
//! patterns, exactly once. Re-running the same catalog over already patched
//! documents converges without duplicating anything.
//!
//! # Architecture
//!
//! All insertions compile down to a single primitive: [`Splice`], a byte
//! offset plus text. Intelligence lives in offset acquisition (anchor
//! resolution) and in the fingerprint guard that decides whether a rule
//! already ran, not in the splice itself.
//!
//! - [`fingerprint`] decides whether a rule is already applied
//! - [`anchor`] finds the insertion offset
//! - [`engine`] applies ordered rules to one in-memory document
//! - [`driver`] reads, patches and writes documents, one at a time
//!
//! # Safety
//!
//! - Each document is read once and written once (tempfile + fsync + rename)
//! - Unchanged documents are never rewritten
//! - Document paths must stay inside the site root
//! - Catalog templates are rendered before any document is touched
//!
//! # Example
//!
//! ```
//! use anchor_patcher::{apply_all, Anchor, PatchRule, Placement};
//!
//! let rule = PatchRule::new(
//!     "badge",
//!     Anchor::Literal("<h2 id=\"x\">Title</h2>".to_string()),
//!     Placement::AfterAnchorEnd { close: None },
//!     "<figure>BADGE</figure>",
//!     30,
//! );
//!
//! let doc = "<body><h2 id=\"x\">Title</h2></body>";
//! let (once, _) = apply_all(doc, std::slice::from_ref(&rule)).unwrap();
//! let (twice, _) = apply_all(&once, std::slice::from_ref(&rule)).unwrap();
//! assert_eq!(once, "<body><h2 id=\"x\">Title</h2><figure>BADGE</figure></body>");
//! assert_eq!(once, twice);
//! ```

pub mod anchor;
pub mod companion;
pub mod config;
pub mod driver;
pub mod edit;
pub mod engine;
pub mod fingerprint;
pub mod report;
pub mod safety;

// Re-exports
pub use anchor::{Anchor, AnchorError, AnchorMatch, Placement};
pub use companion::CompanionLink;
pub use config::{
    discover_catalogs, load_from_path, load_from_str, Catalog, CompileError, ConfigError,
    MalformedRule, ValidationError,
};
pub use driver::{check_distinct, process_document, run_batch, DocumentError, RunMode};
pub use edit::{atomic_write, EditError, Splice};
pub use engine::{apply_all, PatchRule, PatchSet, PatchedDocument, RuleOutcome};
pub use fingerprint::{is_applied, Fingerprint, DEFAULT_FINGERPRINT_LEN};
pub use report::{BatchReport, DocumentReport, DocumentStatus, RuleReport, Summary, Verification};
pub use safety::{SafetyError, SiteGuard};
