use serde::Deserialize;
use std::fmt;

/// Settings file for the registry tool (`.aqua-registry.toml` by default).
///
/// Every section is optional; missing keys fall back to the values the
/// registry has always used.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct ToolConfig {
    #[serde(default)]
    pub checksum: ChecksumSettings,
    #[serde(default)]
    pub prune: PruneSettings,
    #[serde(default)]
    pub github: GitHubSettings,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ChecksumSettings {
    /// Release assets requested per page.
    pub per_page: u32,
    /// Upper bound on pages fetched per release.
    pub max_pages: u32,
    /// Case-insensitive marker of a checksum asset (and of packages that
    /// are themselves checksum files).
    pub asset_keyword: String,
    /// Package types eligible for checksum inference.
    pub package_types: Vec<String>,
    /// `type` written into the generated checksum block.
    pub checksum_type: String,
    pub file_format: String,
    pub checksum_regex: String,
    pub file_regex: String,
    pub version_placeholder: String,
    pub trimmed_version_placeholder: String,
}

impl Default for ChecksumSettings {
    fn default() -> Self {
        Self {
            per_page: 100,
            max_pages: 10,
            asset_keyword: "checksum".to_string(),
            package_types: vec!["github_release".to_string()],
            checksum_type: "github_release".to_string(),
            file_format: "regexp".to_string(),
            checksum_regex: "^(.{64})".to_string(),
            file_regex: "^.{64}\\s+(\\S*)$".to_string(),
            version_placeholder: "{{.Version}}".to_string(),
            trimmed_version_placeholder: "{{trimV .Version}}".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PruneSettings {
    /// Keys removed from checksum blocks.
    pub fields: Vec<String>,
}

impl Default for PruneSettings {
    fn default() -> Self {
        Self {
            fields: vec!["file_format".to_string(), "pattern".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GitHubSettings {
    pub api_base: String,
    pub web_base: String,
    /// Environment variables consulted, in order, for an API token.
    pub token_env: Vec<String>,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            web_base: "https://github.com".to_string(),
            token_env: vec!["AQUA_GITHUB_TOKEN".to_string(), "GITHUB_TOKEN".to_string()],
        }
    }
}

impl GitHubSettings {
    /// First non-empty token found in the configured variables.
    pub fn token(&self) -> Option<String> {
        self.token_env
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
    }
}

impl ToolConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let checksum = &self.checksum;

        if !(1..=100).contains(&checksum.per_page) {
            issues.push(ValidationIssue::OutOfRange {
                field: "checksum.per_page",
                message: format!("{} is not within 1..=100", checksum.per_page),
            });
        }
        if checksum.max_pages == 0 {
            issues.push(ValidationIssue::OutOfRange {
                field: "checksum.max_pages",
                message: "must be at least 1".to_string(),
            });
        }
        for (field, value) in [
            ("checksum.asset_keyword", &checksum.asset_keyword),
            ("checksum.checksum_type", &checksum.checksum_type),
            ("checksum.file_format", &checksum.file_format),
            ("checksum.checksum_regex", &checksum.checksum_regex),
            ("checksum.version_placeholder", &checksum.version_placeholder),
            (
                "checksum.trimmed_version_placeholder",
                &checksum.trimmed_version_placeholder,
            ),
            ("github.api_base", &self.github.api_base),
            ("github.web_base", &self.github.web_base),
        ] {
            if value.trim().is_empty() {
                issues.push(ValidationIssue::MissingField { field });
            }
        }
        if checksum.package_types.is_empty() {
            issues.push(ValidationIssue::EmptyList {
                field: "checksum.package_types",
            });
        }
        if self.prune.fields.is_empty() {
            issues.push(ValidationIssue::EmptyList {
                field: "prune.fields",
            });
        }
        for base in [&self.github.api_base, &self.github.web_base] {
            if !base.is_empty() && !base.starts_with("http://") && !base.starts_with("https://") {
                issues.push(ValidationIssue::InvalidUrl { url: base.clone() });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField { field: &'static str },
    EmptyList { field: &'static str },
    OutOfRange { field: &'static str, message: String },
    InvalidUrl { url: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => write!(f, "'{field}' must not be empty"),
            ValidationIssue::EmptyList { field } => {
                write!(f, "'{field}' must list at least one entry")
            }
            ValidationIssue::OutOfRange { field, message } => {
                write!(f, "'{field}' is out of range: {message}")
            }
            ValidationIssue::InvalidUrl { url } => {
                write!(f, "'{url}' is not an http(s) URL")
            }
        }
    }
}
