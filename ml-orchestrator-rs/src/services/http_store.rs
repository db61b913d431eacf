//! Object store client over plain HTTP
//!
//! Objects are addressed path-style: `{endpoint}/{bucket}/{key}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use crate::core::ArtifactStore;
use crate::error::{Result, ServiceError};
use crate::services::common::{build_http_client, check_response, endpoint_url, UserAgent};

const SERVICE: &str = "artifact-store";

/// HTTP artifact store client
#[derive(Debug, Clone)]
pub struct HttpArtifactStore {
    http_client: Client,
    endpoint: String,
    bucket: String,
}

impl HttpArtifactStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        timeout: Duration,
        bearer_token: Option<&str>,
    ) -> Result<Self> {
        let http_client = build_http_client(UserAgent::for_service(SERVICE), timeout, bearer_token)?;
        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            bucket: bucket.into(),
        })
    }

    fn object_url(&self, key: &str) -> Result<url::Url> {
        if key.is_empty() {
            return Err(ServiceError::validation("Object key must not be empty"));
        }
        endpoint_url(&self.endpoint, &format!("{}/{}", self.bucket, key))
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(key)?;
        debug!(url = url.as_str(), "fetching object");

        let response = self.http_client.get(url).send().await?;
        let response = check_response(SERVICE, response).await?;
        let bytes = response.bytes().await?;

        debug!(key, bytes = bytes.len(), "object fetched");
        Ok(bytes.to_vec())
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.object_url(key)?;
        let size = body.len();

        let response = self
            .http_client
            .put(url)
            .header(header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        check_response(SERVICE, response).await?;

        debug!(key, bytes = size, content_type, "object stored");
        Ok(())
    }
}
