//! Companion resource links (e.g. an extra stylesheet) that every patched
//! document needs before content rules run.

use crate::anchor::{Anchor, Placement};
use crate::edit::{EditError, Splice};
use crate::engine::RuleOutcome;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionLink {
    /// Resource name; its presence anywhere means the link exists
    pub resource: String,
    /// Existing reference line the link is placed after
    pub after: String,
    /// Text inserted right after `after`
    pub text: String,
}

impl CompanionLink {
    pub fn new(
        resource: impl Into<String>,
        after: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            after: after.into(),
            text: text.into(),
        }
    }

    /// Ensure the link is present in `document`.
    pub fn ensure(&self, document: &mut String) -> Result<RuleOutcome, EditError> {
        if document.contains(self.resource.as_str()) {
            debug!(resource = %self.resource, "companion link already present");
            return Ok(RuleOutcome::AlreadyApplied);
        }

        let anchor = Anchor::Literal(self.after.clone());
        let placement = Placement::AfterAnchorEnd { close: None };
        let offset = match anchor.resolve_offset(document, &placement) {
            Ok(offset) => offset,
            Err(err) => {
                debug!(resource = %self.resource, %err, "companion anchor missing");
                return Ok(RuleOutcome::Skipped(err));
            }
        };

        let bytes = Splice::new(offset, self.text.as_str()).apply(document)?;
        debug!(resource = %self.resource, offset, "companion link inserted");
        Ok(RuleOutcome::Applied { offset, bytes })
    }
}
