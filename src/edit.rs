use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: insert text at a byte offset.
///
/// Every rule and companion link compiles down to this single primitive.
/// Intelligence lives in offset acquisition (anchor resolution), not in
/// the splice itself, which never touches bytes outside the inserted span.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Splice does nothing until apply() is called"]
pub struct Splice {
    /// Byte offset the text is inserted at
    pub offset: usize,
    /// Text to insert
    pub text: String,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Invalid splice offset {offset} in document of length {len}")]
    InvalidOffset { offset: usize, len: usize },

    #[error("Splice offset {offset} is not on a UTF-8 character boundary")]
    NotCharBoundary { offset: usize },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Splice {
    pub fn new(offset: usize, text: impl Into<String>) -> Self {
        Self {
            offset,
            text: text.into(),
        }
    }

    fn validate(&self, document: &str) -> Result<(), EditError> {
        if self.offset > document.len() {
            return Err(EditError::InvalidOffset {
                offset: self.offset,
                len: document.len(),
            });
        }
        if !document.is_char_boundary(self.offset) {
            return Err(EditError::NotCharBoundary {
                offset: self.offset,
            });
        }
        Ok(())
    }

    /// Insert the text into `document` in place.
    ///
    /// Returns the number of bytes inserted.
    pub fn apply(&self, document: &mut String) -> Result<usize, EditError> {
        self.validate(document)?;
        document.insert_str(self.offset, &self.text);
        Ok(self.text.len())
    }
}

/// xxh3 digest of a document, used in reports to identify content versions.
pub fn digest(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the file on disk is left untouched.
/// Permissions of an existing target are carried over to the replacement.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    // Create tempfile in same directory to ensure same filesystem
    let parent = path.parent().ok_or_else(|| {
        EditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no parent directory",
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
