use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;

/// Decoded view of a `registry.yaml` (or the registry section of any
/// package configuration file).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RegistryConfig {
    #[serde(default, deserialize_with = "mappings_only")]
    pub packages: Vec<PackageInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub repo_owner: Option<String>,
    #[serde(default)]
    pub repo_name: Option<String>,
    #[serde(default)]
    pub checksum: Option<Checksum>,
    #[serde(default)]
    pub aliases: Option<Vec<Alias>>,
    #[serde(default)]
    pub version_overrides: Option<Vec<Value>>,
    /// Index of the element in the raw `packages` sequence.
    #[serde(skip)]
    pub position: usize,
}

impl PackageInfo {
    /// The package identifier: `name` when set, otherwise `owner/repo`.
    pub fn name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|name| !name.is_empty()) {
            return name.to_string();
        }
        match (self.repo_owner.as_deref(), self.repo_name.as_deref()) {
            (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
                format!("{owner}/{repo}")
            }
            _ => String::new(),
        }
    }

    /// Owner and repository, when both are set and non-empty.
    pub fn repository(&self) -> Option<(&str, &str)> {
        let owner = self.repo_owner.as_deref().filter(|owner| !owner.is_empty())?;
        let repo = self.repo_name.as_deref().filter(|repo| !repo.is_empty())?;
        Some((owner, repo))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
}

/// Checksum settings of a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<ChecksumPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumPattern {
    #[serde(default)]
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// `packages` may hold scalars or other junk next to package mappings;
/// only the mappings are packages. Tags are looked through, so `!tag {...}`
/// still counts as a mapping.
fn mappings_only<'de, D>(deserializer: D) -> Result<Vec<PackageInfo>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    values
        .unwrap_or_default()
        .into_iter()
        .map(untag)
        .enumerate()
        .filter(|(_, value)| value.is_mapping())
        .map(|(position, value)| {
            let mut package: PackageInfo = serde_yaml::from_value(value).map_err(D::Error::custom)?;
            package.position = position;
            Ok(package)
        })
        .collect()
}

pub(crate) fn untag(value: Value) -> Value {
    match value {
        Value::Tagged(tagged) => untag(tagged.value),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_falls_back_to_repository() {
        let package = PackageInfo {
            repo_owner: Some("cli".to_string()),
            repo_name: Some("cli".to_string()),
            ..PackageInfo::default()
        };
        assert_eq!(package.name(), "cli/cli");

        let named = PackageInfo {
            name: Some("cli/cli/gh".to_string()),
            ..package.clone()
        };
        assert_eq!(named.name(), "cli/cli/gh");
        assert_eq!(PackageInfo::default().name(), "");
    }

    #[test]
    fn non_mapping_packages_are_skipped() {
        let config: RegistryConfig = serde_yaml::from_str(
            "packages:\n  - import: x\n  - just a string\n  - type: github_release\n    repo_owner: a\n    repo_name: b\n",
        )
        .unwrap();
        assert_eq!(config.packages.len(), 2);
        assert_eq!(config.packages[1].kind.as_deref(), Some("github_release"));
        assert_eq!(config.packages[0].position, 0);
        assert_eq!(config.packages[1].position, 2);
    }

    #[test]
    fn tagged_packages_are_mappings() {
        let config: RegistryConfig = serde_yaml::from_str(
            "packages:\n  - !custom {type: http, url: x}\n  - repo_owner: a\n    repo_name: b\n",
        )
        .unwrap();
        assert_eq!(config.packages.len(), 2);
        assert_eq!(config.packages[0].kind.as_deref(), Some("http"));
        assert_eq!(config.packages[1].name(), "a/b");
        assert_eq!(config.packages[1].position, 1);
    }

    #[test]
    fn null_packages_decode_to_empty() {
        let config: RegistryConfig = serde_yaml::from_str("packages:\n").unwrap();
        assert!(config.packages.is_empty());
        let config: RegistryConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.packages.is_empty());
    }

    #[test]
    fn null_checksum_is_absent() {
        let config: RegistryConfig =
            serde_yaml::from_str("packages:\n  - name: a\n    checksum:\n").unwrap();
        assert!(config.packages[0].checksum.is_none());
    }

    #[test]
    fn checksum_serializes_in_field_order() {
        let checksum = Checksum {
            kind: Some("github_release".to_string()),
            path: Some("checksums.txt".to_string()),
            file_format: Some("regexp".to_string()),
            pattern: Some(ChecksumPattern {
                checksum: "^(.{64})".to_string(),
                file: Some("^.{64}\\s+(\\S*)$".to_string()),
            }),
            ..Checksum::default()
        };
        let value = serde_yaml::to_value(&checksum).unwrap();
        let keys: Vec<_> = value
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(|key| key.as_str())
            .collect();
        assert_eq!(keys, vec!["type", "path", "file_format", "pattern"]);
    }
}
