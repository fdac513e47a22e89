use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Catalog {
    #[serde(default)]
    pub meta: Metadata,
    /// Companion link ensured in every document unless overridden
    #[serde(default)]
    pub companion: Option<CompanionDefinition>,
    #[serde(default)]
    pub templates: BTreeMap<String, TemplateDefinition>,
    #[serde(default)]
    pub documents: Vec<DocumentDefinition>,
}

impl Catalog {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.documents.is_empty() {
            issues.push(ValidationIssue::EmptyDocumentList);
        }

        if self.meta.fingerprint_len == Some(0) {
            issues.push(ValidationIssue::InvalidCombo {
                document: None,
                patch_id: None,
                message: "meta.fingerprint_len must be at least 1".to_string(),
            });
        }

        if let Some(companion) = &self.companion {
            companion.validate(None, &mut issues);
        }

        for (name, template) in &self.templates {
            if template.text.trim().is_empty() {
                issues.push(ValidationIssue::InvalidCombo {
                    document: None,
                    patch_id: None,
                    message: format!("template '{name}' has empty text"),
                });
            }
        }

        let mut seen_files = HashSet::new();
        for document in &self.documents {
            let file = document.file.trim();
            if file.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    document: None,
                    patch_id: None,
                    field: "file",
                });
            } else if !seen_files.insert(document_key(file)) {
                issues.push(ValidationIssue::DuplicateDocument {
                    file: file.to_string(),
                });
            }

            if let Some(companion) = &document.companion {
                companion.validate(Some(file), &mut issues);
            }

            let mut seen_ids = HashSet::new();
            for patch in &document.patches {
                self.validate_patch(file, patch, &mut seen_ids, &mut issues);
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    fn validate_patch<'a>(
        &self,
        file: &str,
        patch: &'a PatchDefinition,
        seen_ids: &mut HashSet<&'a str>,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let document = Some(file.to_string());
        let id = patch.id.trim();
        if id.is_empty() {
            issues.push(ValidationIssue::MissingField {
                document: document.clone(),
                patch_id: None,
                field: "id",
            });
        } else if !seen_ids.insert(id) {
            issues.push(ValidationIssue::DuplicatePatch {
                document: file.to_string(),
                patch_id: id.to_string(),
            });
        }
        let patch_id = (!id.is_empty()).then(|| id.to_string());

        match &patch.anchor {
            AnchorDefinition::Literal { text } => {
                if text.is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        document: document.clone(),
                        patch_id: patch_id.clone(),
                        field: "anchor.text",
                    });
                }
            }
            AnchorDefinition::Pattern { regex } => {
                if regex.is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        document: document.clone(),
                        patch_id: patch_id.clone(),
                        field: "anchor.regex",
                    });
                }
            }
        }

        if patch.close.is_some() && patch.placement == PlacementKind::BeforeAnchorStart {
            issues.push(ValidationIssue::InvalidCombo {
                document: document.clone(),
                patch_id: patch_id.clone(),
                message: "close marker requires placement 'after-anchor-end'".to_string(),
            });
        }
        if patch.close.as_deref() == Some("") {
            issues.push(ValidationIssue::MissingField {
                document: document.clone(),
                patch_id: patch_id.clone(),
                field: "close",
            });
        }

        match (&patch.template, &patch.content) {
            (Some(_), Some(_)) => issues.push(ValidationIssue::InvalidCombo {
                document: document.clone(),
                patch_id: patch_id.clone(),
                message: "template and content are mutually exclusive".to_string(),
            }),
            (None, None) => issues.push(ValidationIssue::MissingField {
                document: document.clone(),
                patch_id: patch_id.clone(),
                field: "template or content",
            }),
            (Some(name), None) => match self.templates.get(name) {
                None => issues.push(ValidationIssue::UnknownTemplate {
                    document: file.to_string(),
                    patch_id: patch_id.clone(),
                    template: name.clone(),
                }),
                Some(template) if !patch.rows.is_empty() && template.row.is_none() => {
                    issues.push(ValidationIssue::InvalidCombo {
                        document: document.clone(),
                        patch_id: patch_id.clone(),
                        message: format!("rows given but template '{name}' has no row fragment"),
                    })
                }
                Some(_) => {}
            },
            (None, Some(content)) => {
                if content.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        document: document.clone(),
                        patch_id: patch_id.clone(),
                        field: "content",
                    });
                }
                if !patch.rows.is_empty() {
                    issues.push(ValidationIssue::InvalidCombo {
                        document,
                        patch_id,
                        message: "rows require a template with a row fragment".to_string(),
                    });
                }
            }
        }
    }

    /// Effective fingerprint length for this catalog.
    pub fn fingerprint_len(&self) -> usize {
        self.meta
            .fingerprint_len
            .unwrap_or(crate::fingerprint::DEFAULT_FINGERPRINT_LEN)
    }
}

/// Lexical identity of a document path: `./a.html` and `a.html` are the same.
fn document_key(file: &str) -> PathBuf {
    Path::new(file)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fingerprint_len: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompanionDefinition {
    pub resource: String,
    pub after: String,
    pub text: String,
}

impl CompanionDefinition {
    fn validate(&self, document: Option<&str>, issues: &mut Vec<ValidationIssue>) {
        let fields = [
            ("companion.resource", &self.resource),
            ("companion.after", &self.after),
            ("companion.text", &self.text),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    document: document.map(str::to_string),
                    patch_id: None,
                    field,
                });
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TemplateDefinition {
    pub text: String,
    /// Fragment repeated once per row wherever `{{rows}}` appears
    #[serde(default)]
    pub row: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentDefinition {
    pub file: String,
    #[serde(default)]
    pub companion: Option<CompanionDefinition>,
    #[serde(default)]
    pub skip_companion: bool,
    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PatchDefinition {
    pub id: String,
    pub anchor: AnchorDefinition,
    #[serde(default)]
    pub placement: PlacementKind,
    /// Closing marker to skip past after the anchor
    #[serde(default)]
    pub close: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub rows: Vec<BTreeMap<String, ParamValue>>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnchorDefinition {
    /// Exact substring
    Literal { text: String },
    /// Regular expression; first match wins
    Pattern { regex: String },
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementKind {
    #[default]
    AfterAnchorEnd,
    BeforeAnchorStart,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Integer(i) => Some(*i as f64),
            ParamValue::Float(f) => Some(*f),
            ParamValue::Text(s) => s.trim().parse().ok(),
            ParamValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.1}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyDocumentList,
    MissingField {
        document: Option<String>,
        patch_id: Option<String>,
        field: &'static str,
    },
    DuplicateDocument {
        file: String,
    },
    DuplicatePatch {
        document: String,
        patch_id: String,
    },
    UnknownTemplate {
        document: String,
        patch_id: Option<String>,
        template: String,
    },
    InvalidCombo {
        document: Option<String>,
        patch_id: Option<String>,
        message: String,
    },
}

fn write_location(
    f: &mut fmt::Formatter<'_>,
    document: Option<&str>,
    patch_id: Option<&str>,
) -> fmt::Result {
    match (document, patch_id) {
        (Some(doc), Some(id)) => write!(f, "patch '{id}' in '{doc}'"),
        (Some(doc), None) => write!(f, "document '{doc}'"),
        (None, Some(id)) => write!(f, "patch '{id}'"),
        (None, None) => write!(f, "catalog"),
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyDocumentList => write!(f, "catalog contains no documents"),
            ValidationIssue::MissingField {
                document,
                patch_id,
                field,
            } => {
                write_location(f, document.as_deref(), patch_id.as_deref())?;
                write!(f, " missing required field '{field}'")
            }
            ValidationIssue::DuplicateDocument { file } => {
                write!(f, "document '{file}' is listed more than once")
            }
            ValidationIssue::DuplicatePatch { document, patch_id } => {
                write!(f, "patch id '{patch_id}' is repeated in '{document}'")
            }
            ValidationIssue::UnknownTemplate {
                document,
                patch_id,
                template,
            } => {
                write_location(f, Some(document), patch_id.as_deref())?;
                write!(f, " references unknown template '{template}'")
            }
            ValidationIssue::InvalidCombo {
                document,
                patch_id,
                message,
            } => {
                write_location(f, document.as_deref(), patch_id.as_deref())?;
                write!(f, " has invalid configuration: {message}")
            }
        }
    }
}
