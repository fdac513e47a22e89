//! Catalog loading and discovery.

use crate::config::schema::{Catalog, ValidationError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where catalog text came from; used to label errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Inline,
    File(PathBuf),
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogSource::Inline => write!(f, "inline catalog"),
            CatalogSource::File(path) => write!(f, "catalog {}", path.display()),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    /// Catalog file could not be read
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Catalog is not well-formed TOML or does not match the schema
    Toml {
        origin: CatalogSource,
        source: toml_edit::de::Error,
    },
    /// Catalog parsed but breaks one or more structural rules
    Validation {
        origin: CatalogSource,
        source: ValidationError,
    },
    Discovery {
        path: PathBuf,
        source: walkdir::Error,
    },
    NoCatalogs {
        searched: Vec<PathBuf>,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read catalog {}: {source}", path.display())
            }
            ConfigError::Toml { origin, source } => {
                write!(f, "{origin} is not a valid catalog: {source}")
            }
            ConfigError::Validation { origin, source } => {
                write!(f, "{origin} has {} problem(s):", source.issues.len())?;
                for issue in &source.issues {
                    write!(f, "\n  - {issue}")?;
                }
                Ok(())
            }
            ConfigError::Discovery { path, source } => {
                write!(f, "cannot scan {} for catalogs: {source}", path.display())
            }
            ConfigError::NoCatalogs { searched } => {
                let dirs: Vec<_> = searched.iter().map(|p| p.display().to_string()).collect();
                write!(f, "no *.toml catalogs found (searched {})", dirs.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            ConfigError::Discovery { source, .. } => Some(source),
            ConfigError::NoCatalogs { .. } => None,
        }
    }
}

fn parse_catalog(input: &str, origin: CatalogSource) -> Result<Catalog, ConfigError> {
    let catalog: Catalog = match toml_edit::de::from_str(input) {
        Ok(catalog) => catalog,
        Err(source) => return Err(ConfigError::Toml { origin, source }),
    };
    match catalog.validate() {
        Ok(()) => Ok(catalog),
        Err(source) => Err(ConfigError::Validation { origin, source }),
    }
}

pub fn load_from_str(input: &str) -> Result<Catalog, ConfigError> {
    parse_catalog(input, CatalogSource::Inline)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Catalog, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&contents, CatalogSource::File(path.to_path_buf()))
}

/// Find catalog files.
///
/// A file path is returned as-is. A directory yields its `*.toml` files
/// (depth 1, sorted). The first candidate directory containing any catalog
/// wins.
pub fn discover_catalogs(candidates: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigError> {
    for candidate in candidates {
        if candidate.is_file() {
            return Ok(vec![candidate.clone()]);
        }
        if !candidate.is_dir() {
            continue;
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(candidate).max_depth(1) {
            let entry = entry.map_err(|source| ConfigError::Discovery {
                path: candidate.clone(),
                source,
            })?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
            {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();

        if !files.is_empty() {
            return Ok(files);
        }
    }

    Err(ConfigError::NoCatalogs {
        searched: candidates.to_vec(),
    })
}
