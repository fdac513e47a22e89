//! Turns a validated [`Catalog`] into executable [`PatchSet`]s.
//!
//! Every template is rendered and every regex compiled up front, so a
//! malformed rule is caught before any document is read or written.

use crate::anchor::{Anchor, Placement};
use crate::companion::CompanionLink;
use crate::config::schema::{
    AnchorDefinition, Catalog, CompanionDefinition, PatchDefinition, PlacementKind,
};
use crate::config::template::Template;
use crate::engine::{PatchRule, PatchSet};
use regex::Regex;
use std::fmt;
use std::path::PathBuf;

/// A rule that cannot be turned into concrete content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRule {
    pub document: String,
    pub patch_id: String,
    pub reason: String,
}

impl fmt::Display for MalformedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patch '{}' in '{}': {}",
            self.patch_id, self.document, self.reason
        )
    }
}

#[derive(Debug, Clone)]
pub struct CompileError {
    pub rules: Vec<MalformedRule>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} malformed rule(s)", self.rules.len())?;
        for rule in &self.rules {
            write!(f, "\n  {rule}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

impl Catalog {
    /// Render and compile every rule.
    ///
    /// `fingerprint_len` overrides the catalog's own setting when given.
    pub fn compile(&self, fingerprint_len: Option<usize>) -> Result<Vec<PatchSet>, CompileError> {
        let fingerprint_len = fingerprint_len.unwrap_or_else(|| self.fingerprint_len());
        let mut malformed = Vec::new();
        let mut sets = Vec::with_capacity(self.documents.len());

        for document in &self.documents {
            let companion = if document.skip_companion {
                None
            } else {
                document
                    .companion
                    .as_ref()
                    .or(self.companion.as_ref())
                    .map(companion_link)
            };

            let mut rules = Vec::with_capacity(document.patches.len());
            for patch in &document.patches {
                match self.compile_rule(patch, fingerprint_len) {
                    Ok(rule) => rules.push(rule),
                    Err(reason) => malformed.push(MalformedRule {
                        document: document.file.clone(),
                        patch_id: patch.id.clone(),
                        reason,
                    }),
                }
            }

            sets.push(PatchSet {
                file: PathBuf::from(document.file.trim()),
                companion,
                rules,
            });
        }

        if malformed.is_empty() {
            Ok(sets)
        } else {
            Err(CompileError { rules: malformed })
        }
    }

    fn compile_rule(
        &self,
        patch: &PatchDefinition,
        fingerprint_len: usize,
    ) -> Result<PatchRule, String> {
        let anchor = match &patch.anchor {
            AnchorDefinition::Literal { text } => Anchor::Literal(text.clone()),
            AnchorDefinition::Pattern { regex } => Anchor::Pattern(
                Regex::new(regex).map_err(|e| format!("invalid anchor regex: {e}"))?,
            ),
        };

        let placement = match patch.placement {
            PlacementKind::AfterAnchorEnd => Placement::AfterAnchorEnd {
                close: patch.close.clone(),
            },
            PlacementKind::BeforeAnchorStart => Placement::BeforeAnchorStart,
        };

        let template = match (&patch.template, &patch.content) {
            (Some(name), _) => {
                let def = self
                    .templates
                    .get(name)
                    .ok_or_else(|| format!("unknown template '{name}'"))?;
                Template::new(&def.text, def.row.as_deref())
            }
            (None, Some(content)) => Template::new(content, None),
            (None, None) => return Err("no template or content".to_string()),
        };

        let content = template
            .render(&patch.params, &patch.rows)
            .map_err(|e| format!("template render failed: {e}"))?;
        if content.trim().is_empty() {
            return Err("rendered content is empty".to_string());
        }

        Ok(PatchRule::new(
            patch.id.trim(),
            anchor,
            placement,
            content,
            fingerprint_len,
        ))
    }
}

fn companion_link(def: &CompanionDefinition) -> CompanionLink {
    CompanionLink::new(&def.resource, &def.after, &def.text)
}

#[cfg(test)]
mod tests {
    use crate::config::load_from_str;

    #[test]
    fn test_compile_renders_templates() {
        let catalog = load_from_str(
            r#"
[templates.badge]
text = "<figure>{{name|initials}} {{name}}</figure>"

[[documents]]
file = "a.html"

[[documents.patches]]
id = "badge"
anchor = { type = "literal", text = "<h2>" }
close = "</h2>"
template = "badge"
params = { name = "Semrush" }
"#,
        )
        .unwrap();

        let sets = catalog.compile(None).unwrap();
        assert_eq!(sets.len(), 1);
        let rule = &sets[0].rules[0];
        assert_eq!(rule.content, "<figure>SE Semrush</figure>");
        assert_eq!(rule.fingerprint().as_str(), "<figure>SE Semrush</figure>");
    }

    #[test]
    fn test_fingerprint_len_override() {
        let catalog = load_from_str(
            r#"
[meta]
fingerprint_len = 12

[[documents]]
file = "a.html"

[[documents.patches]]
id = "p"
anchor = { type = "literal", text = "<main>" }
content = "  <section class=\"long-enough\">"
"#,
        )
        .unwrap();

        let from_meta = catalog.compile(None).unwrap();
        assert_eq!(from_meta[0].rules[0].fingerprint().as_str(), "<section cla");

        let overridden = catalog.compile(Some(4)).unwrap();
        assert_eq!(overridden[0].rules[0].fingerprint().as_str(), "<sec");
    }

    #[test]
    fn test_companion_inheritance() {
        let catalog = load_from_str(
            r#"
[companion]
resource = "visuals.css"
after = "<link href=\"style.css\" />"
text = "<link href=\"visuals.css\" />"

[[documents]]
file = "a.html"
patches = [{ id = "p", anchor = { type = "literal", text = "<main>" }, content = "x" }]

[[documents]]
file = "b.html"
skip_companion = true

[[documents]]
file = "c.html"
companion = { resource = "print.css", after = "<head>", text = "<link href=\"print.css\" />" }
"#,
        )
        .unwrap();

        let sets = catalog.compile(None).unwrap();
        assert_eq!(sets[0].companion.as_ref().unwrap().resource, "visuals.css");
        assert!(sets[1].companion.is_none());
        assert_eq!(sets[2].companion.as_ref().unwrap().resource, "print.css");
    }

    #[test]
    fn test_malformed_rules_are_collected() {
        let catalog = load_from_str(
            r#"
[templates.badge]
text = "<figure>{{name}} {{tagline}}</figure>"

[[documents]]
file = "a.html"

[[documents.patches]]
id = "missing-param"
anchor = { type = "literal", text = "<h2>" }
template = "badge"
params = { name = "Ahrefs" }

[[documents.patches]]
id = "bad-regex"
anchor = { type = "pattern", regex = "<h2 (" }
content = "<hr/>"
"#,
        )
        .unwrap();

        let err = catalog.compile(None).unwrap_err();
        assert_eq!(err.rules.len(), 2);
        assert_eq!(err.rules[0].patch_id, "missing-param");
        assert!(err.rules[0].reason.contains("missing parameter 'tagline'"));
        assert_eq!(err.rules[1].patch_id, "bad-regex");
        assert!(err.rules[1].reason.contains("invalid anchor regex"));
    }
}
