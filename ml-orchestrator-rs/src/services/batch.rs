//! Batch scheduler client
//!
//! Speaks the managed-batch REST shapes (`/v1/submitjob`, `/v1/describejobs`)
//! against an endpoint that takes care of request signing.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::BatchScheduler;
use crate::error::Result;
use crate::models::{JobDescription, JobHandle, JobRequest, JobStatus};
use crate::services::common::{build_http_client, check_response, endpoint_url, UserAgent};

const SERVICE: &str = "batch";

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobInput {
    pub job_name: String,
    pub job_queue: String,
    pub job_definition: String,
    pub container_overrides: ContainerOverrides,
    pub tags: HashMap<String, String>,
    pub timeout: JobTimeout,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerOverrides {
    pub environment: Vec<KeyValuePair>,
    pub resource_requirements: Vec<ResourceRequirement>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct KeyValuePair {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ResourceRequirement {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobTimeout {
    pub attempt_duration_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitJobOutput {
    job_id: String,
    #[serde(default)]
    job_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct DescribeJobsInput<'a> {
    jobs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct DescribeJobsOutput {
    #[serde(default)]
    jobs: Vec<JobDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobDetail {
    job_id: String,
    #[serde(default)]
    job_name: String,
    status: JobStatus,
    #[serde(default)]
    status_reason: Option<String>,
}

impl From<&JobRequest> for SubmitJobInput {
    fn from(request: &JobRequest) -> Self {
        Self {
            job_name: request.job_name.clone(),
            job_queue: request.job_queue.clone(),
            job_definition: request.job_definition.clone(),
            container_overrides: ContainerOverrides {
                environment: request
                    .environment
                    .iter()
                    .map(|(name, value)| KeyValuePair {
                        name: name.clone(),
                        value: value.clone(),
                    })
                    .collect(),
                resource_requirements: vec![
                    ResourceRequirement {
                        kind: "VCPU".to_string(),
                        value: request.resources.vcpus.to_string(),
                    },
                    ResourceRequirement {
                        kind: "MEMORY".to_string(),
                        value: request.resources.memory_mib.to_string(),
                    },
                ],
            },
            tags: request.tags.clone(),
            timeout: JobTimeout {
                attempt_duration_seconds: request.timeout.as_secs(),
            },
        }
    }
}

/// HTTP batch scheduler client
#[derive(Debug, Clone)]
pub struct HttpBatchScheduler {
    http_client: Client,
    endpoint: String,
}

impl HttpBatchScheduler {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, bearer_token: Option<&str>) -> Result<Self> {
        let http_client = build_http_client(UserAgent::for_service(SERVICE), timeout, bearer_token)?;
        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl BatchScheduler for HttpBatchScheduler {
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle> {
        let url = endpoint_url(&self.endpoint, "v1/submitjob")?;
        let input = SubmitJobInput::from(request);

        let response = self.http_client.post(url).json(&input).send().await?;
        let output: SubmitJobOutput = check_response(SERVICE, response).await?.json().await?;

        info!(job_id = %output.job_id, job_name = %request.job_name, "job accepted by scheduler");
        Ok(JobHandle {
            job_name: output.job_name.unwrap_or_else(|| request.job_name.clone()),
            job_id: output.job_id,
        })
    }

    async fn describe(&self, job_ids: &[String]) -> Result<Vec<JobDescription>> {
        let url = endpoint_url(&self.endpoint, "v1/describejobs")?;

        let response = self
            .http_client
            .post(url)
            .json(&DescribeJobsInput { jobs: job_ids })
            .send()
            .await?;
        let output: DescribeJobsOutput = check_response(SERVICE, response).await?.json().await?;

        debug!(requested = job_ids.len(), returned = output.jobs.len(), "jobs described");
        Ok(output
            .jobs
            .into_iter()
            .map(|job| JobDescription {
                job_id: job.job_id,
                job_name: job.job_name,
                status: job.status,
                status_reason: job.status_reason,
            })
            .collect())
    }
}
