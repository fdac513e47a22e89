//! Content template rendering.
//!
//! Templates are plain text with `{{key}}` placeholders. A placeholder may
//! carry one filter: `{{key|upper}}`, `{{key|lower}}`, `{{key|initials}}` or
//! `{{key|percent:5}}`. The special placeholder `{{rows}}` expands the row
//! fragment once per row, with row parameters shadowing rule parameters.

use crate::config::schema::ParamValue;
use std::collections::BTreeMap;
use thiserror::Error;

pub type Params = BTreeMap<String, ParamValue>;

const ROWS_KEY: &str = "rows";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing parameter '{0}'")]
    MissingParam(String),

    #[error("unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("parameter '{key}' is not numeric (value: {value})")]
    NotNumeric { key: String, value: String },

    #[error("invalid filter argument '{0}'")]
    InvalidFilterArg(String),

    #[error("unterminated placeholder at byte {0}")]
    Unterminated(usize),

    #[error("'{{{{rows}}}}' used but no row fragment is defined")]
    NoRowFragment,
}

/// A template body with an optional repeated row fragment.
#[derive(Debug, Clone, Copy)]
pub struct Template<'a> {
    pub text: &'a str,
    pub row: Option<&'a str>,
}

impl<'a> Template<'a> {
    pub fn new(text: &'a str, row: Option<&'a str>) -> Self {
        Self { text, row }
    }

    /// Render with rule-level `params` and per-row parameter tables.
    pub fn render(&self, params: &Params, rows: &[Params]) -> Result<String, TemplateError> {
        render_with(self.text, &|key| {
            if key == ROWS_KEY && !params.contains_key(ROWS_KEY) {
                let row = self.row.ok_or(TemplateError::NoRowFragment)?;
                return rows
                    .iter()
                    .map(|row_params| render_with(row, &|k| lookup(k, &[row_params, params])))
                    .collect::<Result<String, _>>()
                    .map(Resolved::Rendered);
            }
            lookup(key, &[params])
        })
    }
}

enum Resolved<'v> {
    Value(&'v ParamValue),
    Rendered(String),
}

fn lookup<'v>(key: &str, scopes: &[&'v Params]) -> Result<Resolved<'v>, TemplateError> {
    scopes
        .iter()
        .find_map(|scope| scope.get(key))
        .map(Resolved::Value)
        .ok_or_else(|| TemplateError::MissingParam(key.to_string()))
}

fn render_with<'v>(
    text: &str,
    resolve: &dyn Fn(&str) -> Result<Resolved<'v>, TemplateError>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut consumed = 0;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("}}")
            .ok_or(TemplateError::Unterminated(consumed + open))?;
        let expr = after_open[..close].trim();

        let (key, filter) = match expr.split_once('|') {
            Some((key, filter)) => (key.trim(), Some(filter.trim())),
            None => (expr, None),
        };

        let value = match resolve(key)? {
            Resolved::Value(value) => apply_filter(key, value, filter)?,
            Resolved::Rendered(text) => match filter {
                None => text,
                Some(f) => apply_filter(key, &ParamValue::Text(text), Some(f))?,
            },
        };
        out.push_str(&value);

        let advance = open + 2 + close + 2;
        consumed += advance;
        rest = &rest[advance..];
    }
    out.push_str(rest);
    Ok(out)
}

fn apply_filter(
    key: &str,
    value: &ParamValue,
    filter: Option<&str>,
) -> Result<String, TemplateError> {
    let Some(filter) = filter else {
        return Ok(value.to_string());
    };
    let (name, arg) = match filter.split_once(':') {
        Some((name, arg)) => (name.trim(), Some(arg.trim())),
        None => (filter, None),
    };

    match name {
        "upper" => Ok(value.to_string().to_uppercase()),
        "lower" => Ok(value.to_string().to_lowercase()),
        "initials" => Ok(value
            .to_string()
            .chars()
            .take(2)
            .collect::<String>()
            .to_uppercase()),
        "percent" => {
            let max: f64 = arg
                .unwrap_or("100")
                .parse()
                .map_err(|_| TemplateError::InvalidFilterArg(filter.to_string()))?;
            if max == 0.0 {
                return Err(TemplateError::InvalidFilterArg(filter.to_string()));
            }
            let number = value.as_f64().ok_or_else(|| TemplateError::NotNumeric {
                key: key.to_string(),
                value: value.to_string(),
            })?;
            Ok(format!("{:.1}", number / max * 100.0))
        }
        other => Err(TemplateError::UnknownFilter(other.to_string())),
    }
}
