//! Repository transfer detection (`check-repo`).

use reqwest::Url;

use super::{PolicyError, StatusClass};
use crate::edit;
use crate::github::RedirectCheck;
use crate::registry::RegistryConfig;
use crate::safety::RegistryLayout;

/// A package whose repository answers with a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub repo_owner: String,
    pub repo_name: String,
    pub new_repo_owner: String,
    pub new_repo_name: String,
    /// The package identifier rewritten for the new repository.
    pub new_package_name: String,
}

impl Redirect {
    pub fn new_repository(&self) -> String {
        format!("{}/{}", self.new_repo_owner, self.new_repo_name)
    }
}

/// How a HEAD status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    NotMoved,
    Redirected,
    Failed(StatusClass),
}

pub fn classify_status(status: u16) -> StatusKind {
    match status {
        0..=299 => StatusKind::NotMoved,
        300..=399 => StatusKind::Redirected,
        400..=499 => StatusKind::Failed(StatusClass::Client),
        _ => StatusKind::Failed(StatusClass::Server),
    }
}

/// Owner and repository named by a `Location` header, resolved against
/// the URL that was requested. The path must be exactly `/<owner>/<repo>`.
pub fn parse_location(base: &str, location: &str) -> Result<(String, String), PolicyError> {
    let base = Url::parse(base).map_err(|err| PolicyError::Location(format!("{base}: {err}")))?;
    let url = base
        .join(location)
        .map_err(|err| PolicyError::Location(format!("{location}: {err}")))?;
    let segments: Vec<&str> = url.path().split('/').collect();
    match segments.as_slice() {
        ["", owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(PolicyError::Location(format!(
            "location path format must be /<repo_owner>/<repo_name>: {}",
            url.path()
        ))),
    }
}

/// Rewrites `package` for a repository move from `old` to `new`
/// (`owner/repo` each). Identifiers that are neither `old` nor below it
/// come back unchanged.
pub fn replace_identifier(package: &str, old: &str, new: &str) -> String {
    if package == old {
        return new.to_string();
    }
    match package.strip_prefix(old).and_then(|rest| rest.strip_prefix('/')) {
        Some(rest) => format!("{new}/{rest}"),
        None => package.to_string(),
    }
}

/// Sends a HEAD request to the repository of `pkgs/<package>/registry.yaml`.
///
/// `Ok(None)` means the repository did not move or the package has no
/// repository to check.
pub async fn check_redirect(
    layout: &RegistryLayout,
    checker: &dyn RedirectCheck,
    package: &str,
) -> Result<Option<Redirect>, PolicyError> {
    let path = layout.registry_file(package)?;
    let text = edit::read_text(&path)?;
    let config = RegistryConfig::from_yaml(&text).map_err(|source| PolicyError::Decode {
        path: path.clone(),
        source,
    })?;
    let [info] = config.packages.as_slice() else {
        return Err(PolicyError::PackageCount {
            path,
            count: config.packages.len(),
        });
    };
    let Some((owner, repo)) = info.repository() else {
        tracing::debug!(pkg_name = package, "the package has no repository");
        return Ok(None);
    };

    let response = checker.head(owner, repo).await?;
    match classify_status(response.status) {
        StatusKind::NotMoved => return Ok(None),
        StatusKind::Failed(class) => {
            return Err(PolicyError::HttpStatus {
                status: response.status,
                class,
            })
        }
        StatusKind::Redirected => {}
    }

    let location = response
        .location
        .as_deref()
        .ok_or_else(|| PolicyError::Location("the location header is missing".to_string()))?;
    let (new_repo_owner, new_repo_name) = parse_location(&response.url, location)?;
    let new_package_name = replace_identifier(
        package,
        &format!("{owner}/{repo}"),
        &format!("{new_repo_owner}/{new_repo_name}"),
    );
    Ok(Some(Redirect {
        repo_owner: owner.to_string(),
        repo_name: repo.to_string(),
        new_repo_owner,
        new_repo_name,
        new_package_name,
    }))
}
