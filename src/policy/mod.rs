//! Registry edits built from the tree mutators.
//!
//! Each policy reads a file once, decides on the typed view, mutates the
//! lossless tree and hands the rendered text to [`crate::edit`] as a
//! single rewrite. Nothing is written until every mutation for the file
//! has succeeded. `generate` is the exception to the tree edits: it lays
//! the root registry out afresh.

pub mod checksum;
pub mod generate;
pub mod insert;
pub mod prune;
pub mod redirect;
pub mod rename;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::edit::{self, EditError, FilePlan};
use crate::github::GitHubError;
use crate::registry::RegistryConfig;
use crate::safety::SafetyError;
use crate::yaml::{Document, Node, Sequence, YamlError};

pub use checksum::{
    graft_checksum, infer_checksum, is_eligible, list_release_assets, patch_checksum,
    patch_packages, plan_checksum_patch, select_checksum_asset, ChecksumReport,
};
pub use generate::{collect_registry_files, generate_registry, plan_generate, render_registry};
pub use insert::{insert_import, plan_insert};
pub use prune::{collect_targets, plan_prune, prune_document, prune_files};
pub use redirect::{
    check_redirect, classify_status, parse_location, replace_identifier, Redirect, StatusKind,
};
pub use rename::{move_package, rename_package_document, rename_registry_document, MoveReport};

/// Band of a non-success, non-redirect HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Client,
    Server,
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusClass::Client => write!(f, "client error"),
            StatusClass::Server => write!(f, "server error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path} as a registry: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: YamlError,
    },

    #[error("{what} isn't found in {}{}", path.display(), suggestion_hint(.suggestion))]
    NotFound {
        what: String,
        path: PathBuf,
        suggestion: Option<String>,
    },

    #[error("http status code {status} ({class})")]
    HttpStatus { status: u16, class: StatusClass },

    #[error("invalid location header: {0}")]
    Location(String),

    #[error("the number of packages in {path} must be one, found {count}")]
    PackageCount { path: PathBuf, count: usize },

    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Safety(#[from] SafetyError),
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|name| format!(" (did you mean {name}?)"))
        .unwrap_or_default()
}

impl PolicyError {
    pub(crate) fn yaml(path: &Path) -> impl FnOnce(YamlError) -> PolicyError + '_ {
        move |source| PolicyError::Yaml {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One registry file as read from disk: its text, the lossless tree and the
/// typed view, all decoded from the same bytes.
#[derive(Debug, Clone)]
pub struct RegistryFile {
    pub path: PathBuf,
    pub text: String,
    pub document: Document,
    pub config: RegistryConfig,
}

impl RegistryFile {
    pub fn read(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let text = edit::read_text(path)?;
        Self::from_text(path, text)
    }

    pub fn from_text(path: impl Into<PathBuf>, text: String) -> Result<Self, PolicyError> {
        let path = path.into();
        let config = RegistryConfig::from_yaml(&text).map_err(|source| PolicyError::Decode {
            path: path.clone(),
            source,
        })?;
        let document = Document::parse(&text).map_err(PolicyError::yaml(&path))?;
        Ok(Self {
            path,
            text,
            document,
            config,
        })
    }

    /// Rewrite of the file with the current tree, or a no-op when the tree
    /// renders back to the text that was read.
    pub fn plan(&self, noop_reason: &str) -> FilePlan {
        FilePlan::from_texts(&self.path, &self.text, self.document.render(), noop_reason)
    }
}

/// The `packages` sequence of a registry document.
///
/// A missing key is an error; `packages: null` yields `None`.
pub fn packages_mut<'a>(document: &'a mut Document) -> Result<Option<&'a mut Sequence>, YamlError> {
    let root = document.root_mapping_mut()?;
    let node = root
        .get_mut("packages")
        .ok_or_else(|| YamlError::not_found("packages"))?;
    match node {
        Node::Null(_) => Ok(None),
        Node::Sequence(sequence) => Ok(Some(sequence)),
        other => Err(YamlError::shape(format!(
            "packages must be null or a sequence, found {}",
            other.kind()
        ))),
    }
}
