use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The write-back primitive: whole-file replacement with verification.
///
/// Every policy renders its edited tree to text and hands the result to a
/// `Rewrite`. The rewrite only lands if the file still holds the text the
/// tree was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Rewrite does nothing until apply() is called"]
pub struct Rewrite {
    /// Path to the file to rewrite
    pub file: PathBuf,
    /// Text the file held when the edit was planned
    pub original: String,
    /// Full replacement text
    pub new_text: String,
    /// What the file must still hold when the rewrite is applied
    pub expected_before: Fingerprint,
}

/// Outcome of planning an edit on one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePlan {
    Rewrite(Rewrite),
    NoOp(String),
}

impl FilePlan {
    /// `NoOp` when the new text equals the original.
    pub fn from_texts(
        file: impl Into<PathBuf>,
        original: &str,
        new_text: String,
        noop_reason: &str,
    ) -> Self {
        if original == new_text {
            FilePlan::NoOp(noop_reason.to_string())
        } else {
            FilePlan::Rewrite(Rewrite::new(file, original, new_text))
        }
    }

    pub fn rewrite(&self) -> Option<&Rewrite> {
        match self {
            FilePlan::Rewrite(rewrite) => Some(rewrite),
            FilePlan::NoOp(_) => None,
        }
    }

    /// Applies the rewrite, if any.
    pub fn apply(&self) -> Result<Option<EditResult>, EditError> {
        self.rewrite().map(Rewrite::apply).transpose()
    }
}

/// Length and xxh3 digest of a file's text as it was read.
///
/// A rewrite compares the file against this before replacing it, so an
/// edit planned from stale text never lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    len: usize,
    digest: u64,
}

impl Fingerprint {
    pub fn of(text: &str) -> Self {
        Self {
            len: text.len(),
            digest: xxh3_64(text.as_bytes()),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        self.len == text.len() && self.digest == xxh3_64(text.as_bytes())
    }

    /// Fails unless `path` still holds the fingerprinted text. A missing
    /// file matches the fingerprint of empty text.
    pub fn verify(&self, path: &Path) -> Result<String, EditError> {
        let current = read_existing(path)?.unwrap_or_default();
        if !self.matches(&current) {
            return Err(EditError::ConcurrentModification {
                file: path.to_path_buf(),
            });
        }
        Ok(current)
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("{file} changed on disk after it was read")]
    ConcurrentModification { file: PathBuf },

    #[error("File I/O error on {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file} is not valid UTF-8: {source}")]
    Utf8 {
        file: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },
}

/// Result of applying a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for success/already-applied"]
pub enum EditResult {
    /// Rewrite was written to disk
    Applied { file: PathBuf, bytes_written: usize },
    /// File already held the new text
    AlreadyApplied { file: PathBuf },
}

impl Rewrite {
    /// Create a rewrite with automatic verification generation.
    pub fn new(file: impl Into<PathBuf>, original: &str, new_text: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            original: original.to_string(),
            new_text: new_text.into(),
            expected_before: Fingerprint::of(original),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.original == self.new_text
    }

    /// Writes the new text through a temporary file in the same directory.
    ///
    /// The file's permissions are carried over. A rewrite planned from
    /// empty text creates the file when it is missing.
    pub fn apply(&self) -> Result<EditResult, EditError> {
        let current = read_existing(&self.file)?;

        if current.as_deref() == Some(self.new_text.as_str()) {
            return Ok(EditResult::AlreadyApplied {
                file: self.file.clone(),
            });
        }

        if !self.expected_before.matches(current.as_deref().unwrap_or_default()) {
            return Err(EditError::ConcurrentModification {
                file: self.file.clone(),
            });
        }

        atomic_write(&self.file, self.new_text.as_bytes()).map_err(|source| EditError::Io {
            file: self.file.clone(),
            source,
        })?;

        Ok(EditResult::Applied {
            file: self.file.clone(),
            bytes_written: self.new_text.len(),
        })
    }
}

/// Reads a file that must be UTF-8 text.
pub fn read_text(path: &Path) -> Result<String, EditError> {
    let bytes = fs::read(path).map_err(|source| EditError::Io {
        file: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|err| EditError::Utf8 {
        file: path.to_path_buf(),
        source: err.utf8_error(),
    })
}

/// Like [`read_text`], but a missing file is `None`.
pub fn read_existing(path: &Path) -> Result<Option<String>, EditError> {
    match read_text(path) {
        Ok(text) => Ok(Some(text)),
        Err(EditError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no parent directory",
            ))
        }
    };

    let permissions = fs::metadata(path).ok().map(|meta| meta.permissions());
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;

    temp.write_all(content)?;
    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions)?;
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|err| err.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_tracks_content() {
        let text = "packages: []\n";
        let fingerprint = Fingerprint::of(text);
        assert!(fingerprint.matches(text));
        assert!(!fingerprint.matches("packages: [a]\n"));
        assert!(!fingerprint.matches(""));
        assert_eq!(fingerprint, Fingerprint::of(&text.to_string()));
    }

    #[test]
    fn test_fingerprint_verify() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("pkg.yaml");
        fs::write(&file_path, "packages:\n").unwrap();

        assert_eq!(Fingerprint::of("packages:\n").verify(&file_path).unwrap(), "packages:\n");
        assert!(matches!(
            Fingerprint::of("packages: []\n").verify(&file_path),
            Err(EditError::ConcurrentModification { .. })
        ));
        let missing = temp_dir.path().join("missing.yaml");
        assert_eq!(Fingerprint::of("").verify(&missing).unwrap(), "");
    }

    #[test]
    fn test_rewrite_creates_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("registry.yaml");

        let rewrite = Rewrite::new(&file_path, "", "packages:\n");
        assert!(matches!(rewrite.apply().unwrap(), EditResult::Applied { .. }));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "packages:\n");

        let missing = Rewrite::new(temp_dir.path().join("gone.yaml"), "a: 1\n", "a: 2\n");
        assert!(matches!(
            missing.apply(),
            Err(EditError::ConcurrentModification { .. })
        ));
    }

    #[test]
    fn test_rewrite_applies_and_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("registry.yaml");
        fs::write(&file_path, "packages:\n").unwrap();

        let rewrite = Rewrite::new(&file_path, "packages:\n", "packages: []\n");
        let result = rewrite.apply().unwrap();
        assert!(matches!(result, EditResult::Applied { bytes_written: 13, .. }));
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "packages: []\n");

        let again = rewrite.apply().unwrap();
        assert!(matches!(again, EditResult::AlreadyApplied { .. }));
    }

    #[test]
    fn test_rewrite_refuses_changed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("registry.yaml");
        fs::write(&file_path, "packages:\n  - name: edited/elsewhere\n").unwrap();

        let rewrite = Rewrite::new(&file_path, "packages:\n", "packages: []\n");
        let err = rewrite.apply().unwrap_err();
        assert!(matches!(err, EditError::ConcurrentModification { .. }));
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "packages:\n  - name: edited/elsewhere\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("aqua.yaml");
        fs::write(&file_path, "a: 1\n").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o644)).unwrap();

        Rewrite::new(&file_path, "a: 1\n", "a: 2\n").apply().unwrap();
        let mode = fs::metadata(&file_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_file_plan_noop() {
        let plan = FilePlan::from_texts("x.yaml", "a: 1\n", "a: 1\n".to_string(), "unchanged");
        assert_eq!(plan, FilePlan::NoOp("unchanged".to_string()));
        assert!(plan.apply().unwrap().is_none());
    }

    #[test]
    fn test_read_text_rejects_binary() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("bin.yaml");
        fs::write(&file_path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(read_text(&file_path), Err(EditError::Utf8 { .. })));
    }
}
