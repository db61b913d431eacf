//! Message queue client
//!
//! Publishes JSON-protocol `SendMessage` requests to a queue URL.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::MessageQueue;
use crate::error::{Result, ServiceError};
use crate::services::common::{build_http_client, check_response, UserAgent};

const SERVICE: &str = "queue";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageInput<'a> {
    queue_url: &'a str,
    message_body: &'a str,
    message_attributes: BTreeMap<&'a str, MessageAttributeValue<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MessageAttributeValue<'a> {
    data_type: &'static str,
    string_value: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageOutput {
    message_id: String,
}

/// HTTP message queue client
#[derive(Debug, Clone)]
pub struct HttpMessageQueue {
    http_client: Client,
}

impl HttpMessageQueue {
    pub fn new(timeout: Duration, bearer_token: Option<&str>) -> Result<Self> {
        let http_client = build_http_client(UserAgent::for_service(SERVICE), timeout, bearer_token)?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl MessageQueue for HttpMessageQueue {
    async fn publish(
        &self,
        destination: &str,
        body: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<String> {
        let url = url::Url::parse(destination)
            .map_err(|e| ServiceError::configuration(format!("Invalid queue URL {}: {}", destination, e)))?;

        let input = SendMessageInput {
            queue_url: destination,
            message_body: body,
            message_attributes: attributes
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str(),
                        MessageAttributeValue {
                            data_type: "String",
                            string_value: value.as_str(),
                        },
                    )
                })
                .collect(),
        };

        let response = self.http_client.post(url).json(&input).send().await?;
        let output: SendMessageOutput = check_response(SERVICE, response).await?.json().await?;

        debug!(message_id = %output.message_id, "message published");
        Ok(output.message_id)
    }
}
