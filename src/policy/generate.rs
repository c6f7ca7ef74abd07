//! Rebuilding the root `registry.yaml` from `pkgs/**/registry.yaml`
//! (`generate-registry`).

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use walkdir::WalkDir;

use super::PolicyError;
use crate::edit::{self, EditResult, FilePlan};
use crate::registry::{self, PackageInfo};
use crate::safety::{RegistryLayout, REGISTRY_FILE};
use crate::yaml::{merge, Document, YamlError};

/// First line of the generated file.
pub const SCHEMA_COMMENT: &str = "# yaml-language-server: $schema=https://raw.githubusercontent.com/aquaproj/aqua/main/json-schema/registry.json";

/// Every `registry.yaml` under `pkgs/`, in path order.
pub fn collect_registry_files(layout: &RegistryLayout) -> Result<Vec<PathBuf>, PolicyError> {
    let root = layout.packages_dir();
    let mut files = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|err| PolicyError::Io {
            path: err.path().unwrap_or(&root).to_path_buf(),
            source: err.into(),
        })?;
        if entry.file_type().is_file() && entry.file_name() == OsStr::new(REGISTRY_FILE) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_packages(path: &Path) -> Result<Vec<(PackageInfo, Value)>, PolicyError> {
    let text = edit::read_text(path)?;
    registry::package_values(&text).map_err(|source| PolicyError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Lays out the merged registry. Packages are sorted by identifier and
/// packages sharing one keep the order they were read in.
pub fn render_registry(mut packages: Vec<(PackageInfo, Value)>) -> Result<String, YamlError> {
    packages.sort_by_cached_key(|(package, _)| package.name());
    for pair in packages.windows(2) {
        let name = pair[0].0.name();
        if !name.is_empty() && name == pair[1].0.name() {
            tracing::warn!(pkg_name = %name, "a package is defined more than once");
        }
    }

    let mut document = Document::parse(&format!("{SCHEMA_COMMENT}\npackages:\n"))?;
    if packages.is_empty() {
        return Ok(document.render());
    }
    let fragment = document.fragment();
    let slot = document
        .root_mapping_mut()?
        .slot_mut("packages")
        .ok_or_else(|| YamlError::not_found("packages"))?;
    let values = packages.into_iter().map(|(_, value)| value).collect();
    merge(slot, &Value::Sequence(values), &fragment)?;
    Ok(document.render())
}

/// Reads every package's registry and works out the root file without
/// writing it. Returns the package count with the plan.
pub fn plan_generate(layout: &RegistryLayout) -> Result<(usize, FilePlan), PolicyError> {
    let target = layout.root().join(REGISTRY_FILE);
    let mut packages = Vec::new();
    for file in collect_registry_files(layout)? {
        let found = read_packages(&file)?;
        tracing::debug!(file_path = %file.display(), packages = found.len(), "read a registry file");
        packages.extend(found);
    }
    let count = packages.len();
    let text = render_registry(packages).map_err(PolicyError::yaml(&target))?;
    let original = edit::read_existing(&target)?.unwrap_or_default();
    let plan = FilePlan::from_texts(&target, &original, text, "registry.yaml is up to date");
    Ok((count, plan))
}

/// Regenerates the root `registry.yaml` in place.
pub fn generate_registry(layout: &RegistryLayout) -> Result<usize, PolicyError> {
    let (count, plan) = plan_generate(layout)?;
    if let Some(EditResult::Applied { file, .. }) = plan.apply()? {
        tracing::info!(file_path = %file.display(), packages = count, "update the registry");
    }
    Ok(count)
}
