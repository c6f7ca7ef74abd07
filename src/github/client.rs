use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LOCATION, USER_AGENT};
use reqwest::{redirect, Client, Response, StatusCode};
use serde::Deserialize;

use super::{GitHubError, HeadResponse, RedirectCheck, Release, ReleaseAsset, ReleaseSource};
use crate::config::GitHubSettings;

/// User-Agent header value for every request.
const USER_AGENT_VALUE: &str = concat!("aqua-registry/", env!("CARGO_PKG_VERSION"));

/// REST client for release listings plus a web client for redirect checks.
pub struct GitHubClient {
    /// API client with auth and JSON headers
    api: Client,
    /// Web client that never follows redirects
    web: Client,
    api_base: String,
    web_base: String,
    has_token: bool,
}

// Custom Debug to avoid exposing the token-bearing headers
impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("web_base", &self.web_base)
            .field("has_token", &self.has_token)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

impl GitHubClient {
    /// Builds a client from the settings, picking the token up from the
    /// environment.
    pub fn from_settings(settings: &GitHubSettings) -> Result<Self, GitHubError> {
        Self::new(&settings.api_base, &settings.web_base, settings.token())
    }

    pub fn new(
        api_base: impl Into<String>,
        web_base: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let has_token = token.is_some();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| GitHubError::InvalidSettings("token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let api = Client::builder().default_headers(headers).build()?;
        let web = Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            api,
            web,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            web_base: web_base.into().trim_end_matches('/').to_string(),
            has_token,
        })
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, owner, repo, path)
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        response: Response,
    ) -> Result<T, GitHubError> {
        let status = response.status();

        if status.is_success() {
            return response.json().await.map_err(|e| GitHubError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            });
        }

        let rate_limited = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|remaining| remaining == "0");

        // Try to get error message from body
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        Err(match status {
            StatusCode::NOT_FOUND => GitHubError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => GitHubError::RateLimited,
            StatusCode::FORBIDDEN if rate_limited => GitHubError::RateLimited,
            _ if status.is_server_error() => GitHubError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => GitHubError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait]
impl ReleaseSource for GitHubClient {
    async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release, GitHubError> {
        let url = self.repo_url(owner, repo, "releases/latest");
        tracing::debug!(repo_owner = owner, repo_name = repo, "get the latest release");
        let response = self.api.get(&url).send().await?;
        Self::handle_response(response).await
    }

    async fn list_release_assets(
        &self,
        owner: &str,
        repo: &str,
        release_id: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ReleaseAsset>, GitHubError> {
        let url = self.repo_url(owner, repo, &format!("releases/{release_id}/assets"));
        let response = self
            .api
            .get(&url)
            .query(&[("per_page", per_page), ("page", page)])
            .send()
            .await?;
        Self::handle_response(response).await
    }
}

#[async_trait]
impl RedirectCheck for GitHubClient {
    async fn head(&self, owner: &str, repo: &str) -> Result<HeadResponse, GitHubError> {
        let url = format!("{}/{}/{}", self.web_base, owner, repo);
        let response = self.web.head(&url).send().await?;
        let status = response.status().as_u16();
        tracing::info!(repo_owner = owner, repo_name = repo, http_status_code = status, "request repository");
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(HeadResponse {
            url,
            status,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, token: Option<&str>) -> GitHubClient {
        GitHubClient::new(server.uri(), server.uri(), token.map(str::to_string)).unwrap()
    }

    #[tokio::test]
    async fn latest_release_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/cli/cli/releases/latest"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 42, "tag_name": "v2.0.0", "draft": false})),
            )
            .mount(&server)
            .await;

        let release = client(&server, Some("secret"))
            .latest_release("cli", "cli")
            .await
            .unwrap();
        assert_eq!(
            release,
            Release {
                id: 42,
                tag_name: "v2.0.0".to_string()
            }
        );
    }

    #[tokio::test]
    async fn asset_pages_are_requested_by_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/cli/cli/releases/42/assets"))
            .and(query_param("page", "2"))
            .and(query_param("per_page", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "gh_2.0.0_checksums.txt", "size": 10}
            ])))
            .mount(&server)
            .await;

        let assets = client(&server, None)
            .list_release_assets("cli", "cli", 42, 2, 100)
            .await
            .unwrap();
        assert_eq!(assets, vec![ReleaseAsset::new("gh_2.0.0_checksums.txt")]);
    }

    #[tokio::test]
    async fn error_statuses_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/a/missing/releases/latest"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/a/limited/releases/latest"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("x-ratelimit-remaining", "0")
                    .set_body_json(json!({"message": "API rate limit exceeded"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/a/broken/releases/latest"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client(&server, None);
        assert!(matches!(
            client.latest_release("a", "missing").await,
            Err(GitHubError::NotFound(message)) if message == "Not Found"
        ));
        assert!(matches!(
            client.latest_release("a", "limited").await,
            Err(GitHubError::RateLimited)
        ));
        assert!(matches!(
            client.latest_release("a", "broken").await,
            Err(GitHubError::ApiError { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn head_does_not_follow_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/old/repo"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new/repo"))
            .mount(&server)
            .await;

        let response = client(&server, None).head("old", "repo").await.unwrap();
        assert_eq!(response.status, 301);
        assert_eq!(response.location.as_deref(), Some("/new/repo"));
        assert_eq!(response.url, format!("{}/old/repo", server.uri()));
    }
}
