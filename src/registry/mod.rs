//! Typed, read-only decoding of registry files.
//!
//! Decisions (which package, whether it already has a checksum) are made
//! on this view; edits go through [`crate::yaml`].

pub mod schema;

use serde::Deserialize;
use serde_yaml::Value;

pub use schema::{Alias, Checksum, ChecksumPattern, PackageInfo, RegistryConfig};

#[derive(Debug, Default, Deserialize)]
struct RawRegistry {
    #[serde(default)]
    packages: Option<Vec<Value>>,
}

/// The package mappings of a registry file as raw values, each paired with
/// its decoded view. Tags are dropped; everything else is kept as written.
pub fn package_values(source: &str) -> Result<Vec<(PackageInfo, Value)>, serde_yaml::Error> {
    let raw: RawRegistry = serde_yaml::from_str(source)?;
    raw.packages
        .unwrap_or_default()
        .into_iter()
        .map(schema::untag)
        .enumerate()
        .filter(|(_, value)| value.is_mapping())
        .map(|(position, value)| {
            let mut package: PackageInfo = serde_yaml::from_value(value.clone())?;
            package.position = position;
            Ok((package, value))
        })
        .collect()
}

impl RegistryConfig {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// Position and package whose identifier equals `name`.
    pub fn find(&self, name: &str) -> Option<(usize, &PackageInfo)> {
        self.packages
            .iter()
            .enumerate()
            .find(|(_, package)| package.name() == name)
    }

    /// The known identifier closest to `name`, for "did you mean" hints.
    pub fn closest_name(&self, name: &str) -> Option<String> {
        self.packages
            .iter()
            .map(PackageInfo::name)
            .filter(|candidate| !candidate.is_empty())
            .map(|candidate| (strsim::normalized_levenshtein(name, &candidate), candidate))
            .filter(|(score, _)| *score >= 0.6)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate)
    }
}
