//! Checksum inference (`patch-checksum`).
//!
//! For every `github_release` package without a checksum block, the latest
//! release's assets are listed and the first asset that looks like a
//! checksum manifest becomes the package's `checksum` config. Failures are
//! per package: they are logged and the loop moves on.

use std::path::Path;

use thiserror::Error;

use super::{packages_mut, PolicyError, RegistryFile};
use crate::config::ChecksumSettings;
use crate::edit::FilePlan;
use crate::github::{GitHubError, ReleaseAsset, ReleaseSource};
use crate::registry::{Checksum, ChecksumPattern, PackageInfo, RegistryConfig};
use crate::yaml::{
    insert_entry, merge, Document, Fragment, Mapping, Node, Placement, YamlError,
};

/// What happened to the packages of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumReport {
    /// Packages that received a checksum block.
    pub patched: Vec<String>,
    /// Packages whose lookup or edit failed.
    pub failed: Vec<String>,
    /// Eligible packages written as something other than a plain mapping,
    /// such as an alias.
    pub unmatched: usize,
}

impl ChecksumReport {
    pub fn is_unchanged(&self) -> bool {
        self.patched.is_empty()
    }
}

#[derive(Debug, Error)]
enum PackageError {
    #[error(transparent)]
    GitHub(#[from] GitHubError),
    #[error(transparent)]
    Yaml(#[from] YamlError),
}

/// Whether `package` should get an inferred checksum at all.
pub fn is_eligible(package: &PackageInfo, settings: &ChecksumSettings) -> bool {
    let Some(kind) = package.kind.as_deref() else {
        return false;
    };
    if !settings.package_types.iter().any(|allowed| allowed == kind) {
        return false;
    }
    if package.checksum.is_some() || package.repository().is_none() {
        return false;
    }
    // A checksum tool's own release checksums would just match itself.
    !contains_ignore_case(&package.name(), &settings.asset_keyword)
}

/// All assets of a release, page by page.
///
/// Stops on a short page or after `max_pages`. A listing error ends the
/// walk and keeps what was gathered so far.
pub async fn list_release_assets(
    source: &dyn ReleaseSource,
    settings: &ChecksumSettings,
    owner: &str,
    repo: &str,
    release_id: u64,
) -> Vec<ReleaseAsset> {
    let mut assets = Vec::new();
    for page in 1..=settings.max_pages {
        let batch = match source
            .list_release_assets(owner, repo, release_id, page, settings.per_page)
            .await
        {
            Ok(batch) => batch,
            Err(err) => {
                tracing::warn!(repo_owner = owner, repo_name = repo, error = %err, "list release assets");
                break;
            }
        };
        let short = batch.len() < settings.per_page as usize;
        assets.extend(batch);
        if short {
            break;
        }
    }
    assets
}

/// First asset whose name contains the checksum keyword, ignoring case.
pub fn select_checksum_asset<'a>(
    assets: &'a [ReleaseAsset],
    settings: &ChecksumSettings,
) -> Option<&'a ReleaseAsset> {
    assets
        .iter()
        .find(|asset| contains_ignore_case(&asset.name, &settings.asset_keyword))
}

/// Checksum config for a manifest asset of the release tagged `tag`.
///
/// The tag in the asset name becomes the version placeholder, then the tag
/// without its leading `v` becomes the trimmed placeholder.
pub fn infer_checksum(asset_name: &str, tag: &str, settings: &ChecksumSettings) -> Checksum {
    let mut path = asset_name.to_string();
    if !tag.is_empty() {
        path = path.replace(tag, &settings.version_placeholder);
    }
    let trimmed = tag.strip_prefix('v').unwrap_or(tag);
    if !trimmed.is_empty() {
        path = path.replace(trimmed, &settings.trimmed_version_placeholder);
    }
    Checksum {
        kind: Some(settings.checksum_type.clone()),
        path: Some(path),
        file_format: Some(settings.file_format.clone()),
        pattern: Some(ChecksumPattern {
            checksum: settings.checksum_regex.clone(),
            file: Some(settings.file_regex.clone()),
        }),
        ..Checksum::default()
    }
}

/// Adds `checksum` to a package mapping. A `checksum: null` entry is
/// filled in place; an existing block is an error.
pub fn graft_checksum(
    mapping: &mut Mapping,
    checksum: &Checksum,
    fragment: &Fragment,
) -> Result<(), YamlError> {
    let value = serde_yaml::to_value(checksum)
        .map_err(|err| YamlError::emit(format!("checksum config: {err}")))?;
    match mapping.slot_mut("checksum") {
        Some(slot) if slot.value().is_null() => merge(slot, &value, fragment),
        Some(_) => Err(YamlError::DuplicateKey {
            key: "checksum".to_string(),
        }),
        None => insert_entry(mapping, Placement::AtEnd, "checksum", &value, fragment).map(|_| ()),
    }
}

/// Infers and grafts checksum blocks for every eligible package.
///
/// Only structural problems with `packages` itself are errors.
pub async fn patch_packages(
    document: &mut Document,
    config: &RegistryConfig,
    source: &dyn ReleaseSource,
    settings: &ChecksumSettings,
) -> Result<ChecksumReport, YamlError> {
    let mut report = ChecksumReport::default();
    let fragment = document.fragment();
    let Some(sequence) = packages_mut(document)? else {
        return Ok(report);
    };

    for package in &config.packages {
        if !is_eligible(package, settings) {
            continue;
        }
        let pkg_name = package.name();
        let Some(mapping) = sequence
            .get_mut(package.position)
            .and_then(Node::as_mapping_mut)
        else {
            report.unmatched += 1;
            tracing::warn!(
                pkg_name = %pkg_name,
                position = package.position,
                "the package isn't a plain mapping in the file; skip it"
            );
            continue;
        };
        match patch_package(mapping, package, source, settings, &fragment).await {
            Ok(true) => {
                tracing::info!(pkg_name = %pkg_name, "patch a checksum config");
                report.patched.push(pkg_name);
            }
            Ok(false) => {
                tracing::debug!(pkg_name = %pkg_name, "no checksum asset is found");
            }
            Err(err) => {
                tracing::error!(pkg_name = %pkg_name, error = %err, "patch a checksum config");
                report.failed.push(pkg_name);
            }
        }
    }
    Ok(report)
}

async fn patch_package(
    mapping: &mut Mapping,
    package: &PackageInfo,
    source: &dyn ReleaseSource,
    settings: &ChecksumSettings,
    fragment: &Fragment,
) -> Result<bool, PackageError> {
    let Some((owner, repo)) = package.repository() else {
        return Ok(false);
    };
    let release = source.latest_release(owner, repo).await?;
    let assets = list_release_assets(source, settings, owner, repo, release.id).await;
    let Some(asset) = select_checksum_asset(&assets, settings) else {
        return Ok(false);
    };
    let checksum = infer_checksum(&asset.name, &release.tag_name, settings);
    graft_checksum(mapping, &checksum, fragment)?;
    Ok(true)
}

/// Reads `path` and works out the patched text without writing it.
pub async fn plan_checksum_patch(
    path: &Path,
    source: &dyn ReleaseSource,
    settings: &ChecksumSettings,
) -> Result<(ChecksumReport, FilePlan), PolicyError> {
    let mut file = RegistryFile::read(path)?;
    let report = patch_packages(&mut file.document, &file.config, source, settings)
        .await
        .map_err(PolicyError::yaml(path))?;
    if report.is_unchanged() {
        return Ok((report, FilePlan::NoOp("no checksum config was added".to_string())));
    }
    let mut text = file.document.render();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    let plan = FilePlan::from_texts(path, &file.text, text, "no checksum config was added");
    Ok((report, plan))
}

/// Patches `path` in place.
pub async fn patch_checksum(
    path: &Path,
    source: &dyn ReleaseSource,
    settings: &ChecksumSettings,
) -> Result<ChecksumReport, PolicyError> {
    let (report, plan) = plan_checksum_patch(path, source, settings).await?;
    if let Some(result) = plan.apply()? {
        tracing::debug!(?result, "write the configuration file");
    }
    Ok(report)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
