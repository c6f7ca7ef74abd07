use thiserror::Error;

/// Failures talking to GitHub.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The release, repository or asset list does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The client could not be built from the settings.
    #[error("invalid GitHub settings: {0}")]
    InvalidSettings(String),
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        GitHubError::NetworkError(err.to_string())
    }
}
