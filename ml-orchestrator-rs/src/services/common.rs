//! Common utilities for HTTP collaborators

use std::fmt;
use std::time::Duration;

use reqwest::{header, Client};
use tracing::debug;
use url::Url;

use crate::error::mapping::{classify_http_error, map_http_error};
use crate::error::{Result, ServiceError};

/// UserAgent structure for identifying the client to upstream services
#[derive(Debug, Clone)]
pub struct UserAgent {
    pub app_name: String,
    pub version: String,
    pub extra: Option<String>,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            app_name: "trader-ml-orchestrator".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            extra: None,
        }
    }
}

impl UserAgent {
    /// Default agent tagged with the collaborator name
    pub fn for_service(service: &str) -> Self {
        Self {
            extra: Some(service.to_string()),
            ..Self::default()
        }
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_name, self.version)?;

        if let Some(ref extra) = self.extra {
            write!(f, " ({})", extra)?;
        }

        Ok(())
    }
}

/// Build an HTTP client with default headers and an optional bearer token
pub fn build_http_client(
    user_agent: UserAgent,
    timeout: Duration,
    bearer_token: Option<&str>,
) -> Result<Client> {
    let mut headers = header::HeaderMap::new();

    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_str(&user_agent.to_string())
            .map_err(|e| ServiceError::configuration(format!("Invalid user agent: {}", e)))?,
    );

    if let Some(token) = bearer_token {
        let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ServiceError::configuration(format!("Invalid auth header: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(|e| ServiceError::configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Join a base endpoint and a relative path without dropping the base path
pub fn endpoint_url(base: &str, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined)
        .map_err(|e| ServiceError::configuration(format!("Invalid endpoint {}: {}", joined, e)))
}

/// Turn a non-success response into a ServiceError
pub async fn parse_error_response(service: &str, response: reqwest::Response) -> ServiceError {
    let status = response.status();

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => format!("Failed to read error response: {}", e),
    };

    debug!(
        service,
        status = status.as_u16(),
        category = classify_http_error(status),
        "collaborator returned an error response"
    );

    map_http_error(service, status, &body)
}

/// Return the response if successful, otherwise the mapped error
pub async fn check_response(service: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(parse_error_response(service, response).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let url = endpoint_url("http://localhost:4566/batch/", "/v1/submitjob").unwrap();
        assert_eq!(url.as_str(), "http://localhost:4566/batch/v1/submitjob");
    }

    #[test]
    fn test_endpoint_url_rejects_garbage() {
        assert!(endpoint_url("not a url", "v1").is_err());
    }

    #[test]
    fn test_user_agent_display() {
        let agent = UserAgent::for_service("batch");
        assert!(agent.to_string().starts_with("trader-ml-orchestrator/"));
        assert!(agent.to_string().ends_with("(batch)"));
    }
}
