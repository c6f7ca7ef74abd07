use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Directory holding one subdirectory per package.
pub const PACKAGES_DIR: &str = "pkgs";
pub const PKG_FILE: &str = "pkg.yaml";
pub const REGISTRY_FILE: &str = "registry.yaml";

/// Maps package identifiers onto the registry tree and keeps edits inside it.
#[derive(Debug, Clone)]
pub struct RegistryLayout {
    /// Registry checkout root (the directory holding `pkgs/`)
    root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("invalid package name {name:?}: {reason}")]
    InvalidPackageName { name: String, reason: &'static str },

    #[error("Path is outside the package tree: {path} (packages: {packages})")]
    OutsideRegistry { path: PathBuf, packages: PathBuf },

    #[error("Failed to canonicalize {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RegistryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join(PACKAGES_DIR)
    }

    /// `pkgs/<name>`, after checking that every segment of `name` is a
    /// plain directory name.
    pub fn package_dir(&self, name: &str) -> Result<PathBuf, SafetyError> {
        check_package_name(name)?;
        Ok(self.packages_dir().join(name))
    }

    pub fn pkg_file(&self, name: &str) -> Result<PathBuf, SafetyError> {
        Ok(self.package_dir(name)?.join(PKG_FILE))
    }

    pub fn registry_file(&self, name: &str) -> Result<PathBuf, SafetyError> {
        Ok(self.package_dir(name)?.join(REGISTRY_FILE))
    }

    /// Check that an existing path resolves inside `pkgs/`.
    ///
    /// Returns the canonicalized absolute path if safe. Symlinks are
    /// resolved, so a link pointing out of the tree is rejected.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        // Resolve relative paths against the registry root
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let canonical = canonicalize(&absolute)?;
        let packages = canonicalize(&self.packages_dir())?;

        if !canonical.starts_with(&packages) {
            return Err(SafetyError::OutsideRegistry {
                path: canonical,
                packages,
            });
        }

        Ok(canonical)
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize()
        .map_err(|source| SafetyError::Canonicalize {
            path: path.to_path_buf(),
            source,
        })
}

fn check_package_name(name: &str) -> Result<(), SafetyError> {
    let invalid = |reason| SafetyError::InvalidPackageName {
        name: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('\\') {
        return Err(invalid("backslashes are not allowed"));
    }
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) => {}
            Component::ParentDir => return Err(invalid("'..' segments are not allowed")),
            Component::CurDir => return Err(invalid("'.' segments are not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("name must be relative"))
            }
        }
    }
    if name.split('/').any(str::is_empty) {
        return Err(invalid("empty path segment"));
    }
    Ok(())
}
