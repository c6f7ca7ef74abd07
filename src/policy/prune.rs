//! Legacy checksum field removal (`conv-to-default-checksum-parser`).

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{PolicyError, RegistryFile};
use crate::edit::{EditResult, FilePlan};
use crate::safety::{PKG_FILE, REGISTRY_FILE};
use crate::yaml::{prune_slot, prune_tree, Document, Node};

/// Removes `fields` from checksum blocks, then from every mapping that is
/// the value of a key anywhere in the document. Returns how many entries
/// went.
pub fn prune_document<S: AsRef<str>>(document: &mut Document, fields: &[S]) -> usize {
    let mut removed = 0;
    if let Some(Node::Sequence(packages)) = document
        .root_mapping_mut()
        .ok()
        .and_then(|root| root.get_mut("packages"))
    {
        for item in packages.items_mut() {
            let Some(package) = item.value_mut().as_mapping_mut() else {
                continue;
            };
            if let Some(slot) = package.slot_mut("checksum") {
                removed += prune_slot(slot, fields);
            }
            if let Some(Node::Sequence(overrides)) = package.get_mut("version_overrides") {
                for item in overrides.items_mut() {
                    if let Some(slot) = item
                        .value_mut()
                        .as_mapping_mut()
                        .and_then(|o| o.slot_mut("checksum"))
                    {
                        removed += prune_slot(slot, fields);
                    }
                }
            }
        }
    }
    removed + prune_tree(document.root_mut(), fields)
}

/// Reads `path` and works out the pruned text without writing it.
pub fn plan_prune<S: AsRef<str>>(path: &Path, fields: &[S]) -> Result<(usize, FilePlan), PolicyError> {
    let mut file = RegistryFile::read(path)?;
    let removed = prune_document(&mut file.document, fields);
    Ok((removed, file.plan("nothing to prune")))
}

/// Expands directories into the `registry.yaml` and `pkg.yaml` files under
/// them. Plain file arguments are kept as given.
pub fn collect_targets(paths: &[PathBuf]) -> Result<Vec<PathBuf>, PolicyError> {
    let mut targets = Vec::new();
    for path in paths {
        if !path.is_dir() {
            targets.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|err| PolicyError::Io {
                path: err.path().unwrap_or(path).to_path_buf(),
                source: err.into(),
            })?;
            let is_target = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name == REGISTRY_FILE || name == PKG_FILE);
            if entry.file_type().is_file() && is_target {
                found.push(entry.into_path());
            }
        }
        found.sort();
        targets.extend(found);
    }
    Ok(targets)
}

/// Prunes every target in turn and returns the files that were rewritten.
/// The first failure stops the run.
pub fn prune_files<S: AsRef<str>>(paths: &[PathBuf], fields: &[S]) -> Result<Vec<PathBuf>, PolicyError> {
    let mut changed = Vec::new();
    for path in collect_targets(paths)? {
        let (removed, plan) = plan_prune(&path, fields)?;
        if let Some(EditResult::Applied { file, .. }) = plan.apply()? {
            tracing::info!(file_path = %file.display(), removed, "remove legacy checksum fields");
            changed.push(file);
        }
    }
    Ok(changed)
}
