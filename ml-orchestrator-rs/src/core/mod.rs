//! Core abstractions over the external collaborators
//!
//! - `ArtifactStore`: key/value object storage
//! - `BatchScheduler`: managed batch job submission and status queries
//! - `MessageQueue`: publishing structured messages
//! - `ScoringRoutine`: evaluating a trained model against a validation set
//!
//! The orchestrator only talks to these traits; concrete clients live in
//! `crate::services`.

pub mod cancellation;
pub use cancellation::{CancellationHandle, CancellationSignal};

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{JobDescription, JobHandle, JobRequest, ScoringOutput};

/// Object storage addressed by slash-delimited keys
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch an object's bytes; a missing object is `ServiceError::NotFound`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store an object, overwriting any existing one
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;
}

/// Managed batch scheduler
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BatchScheduler: Send + Sync {
    /// Submit a job and return its handle
    async fn submit(&self, request: &JobRequest) -> Result<JobHandle>;

    /// Describe jobs by id. Unknown ids are simply absent from the result.
    async fn describe(&self, job_ids: &[String]) -> Result<Vec<JobDescription>>;
}

/// Message queue with string attributes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Publish one message and return the queue's message id
    async fn publish(
        &self,
        destination: &str,
        body: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<String>;
}

/// Evaluates a trained model on a validation dataset
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoringRoutine: Send + Sync {
    async fn score(&self, model_path: &Path, dataset_path: &Path) -> Result<ScoringOutput>;
}
