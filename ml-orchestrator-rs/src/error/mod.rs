//! Error handling for the orchestrator
//!
//! Two layers:
//! - `ServiceError` describes what went wrong inside a collaborator
//!   (object store, batch scheduler, message queue, scoring routine)
//! - `OrchestratorError` tags a failure with the pipeline stage it happened in,
//!   so every message names the stage and the underlying cause

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod mapping;

/// Result type for collaborator operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Result type for orchestration operations
pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;

/// Errors raised by external collaborators
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Network or connection errors
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Remote service rejected or failed the request
    #[error("Service error: {0}")]
    Service(String),

    /// Requested object or resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Response parsing errors
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Local filesystem errors
    #[error("I/O error: {0}")]
    Io(String),

    /// External process failed to start or exited unsuccessfully
    #[error("Process error: {0}")]
    Process(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        ServiceError::Network(message.into())
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        ServiceError::Authentication(message.into())
    }

    /// Create a service error
    pub fn service(message: impl Into<String>) -> Self {
        ServiceError::Service(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        ServiceError::Parsing(message.into())
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        ServiceError::Io(message.into())
    }

    /// Create a process error
    pub fn process(message: impl Into<String>) -> Self {
        ServiceError::Process(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::Internal(message.into())
    }

    /// Whether the collaborator reported a missing object or resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}

/// Pipeline stage a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Poll,
    Fetch,
    Invoke,
    Persist,
    Notify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Submit => "submit",
            Stage::Poll => "poll",
            Stage::Fetch => "fetch",
            Stage::Invoke => "invoke",
            Stage::Persist => "persist",
            Stage::Notify => "notify",
        };
        f.write_str(name)
    }
}

/// Errors surfaced to callers of the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// A collaborator call failed during the given stage
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: ServiceError,
    },

    /// The scheduler reported the job as failed
    #[error("poll: training job {job_name} failed: {reason}")]
    JobFailed { job_name: String, reason: String },

    /// The scheduler reported the job as cancelled
    #[error("poll: training job {job_name} was cancelled")]
    JobCancelled { job_name: String },

    /// The scheduler no longer knows the job
    #[error("poll: job {job_id} not found")]
    JobNotFound { job_id: String },

    /// The job did not reach a terminal state before the deadline
    #[error("poll: job {job_name} timed out after {}", format_elapsed(.elapsed))]
    Timeout { job_name: String, elapsed: Duration },

    /// The caller gave up
    #[error("{stage}: cancelled: {cause}")]
    Cancelled { stage: Stage, cause: String },

    /// Invalid orchestrator configuration or invocation
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl OrchestratorError {
    /// Wrap a collaborator error with the stage it happened in
    pub fn stage(stage: Stage, source: ServiceError) -> Self {
        OrchestratorError::Stage { stage, source }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        OrchestratorError::Configuration(message.into())
    }

    /// Stage this error belongs to, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            OrchestratorError::Stage { stage, .. } => Some(*stage),
            OrchestratorError::JobFailed { .. }
            | OrchestratorError::JobCancelled { .. }
            | OrchestratorError::JobNotFound { .. }
            | OrchestratorError::Timeout { .. } => Some(Stage::Poll),
            OrchestratorError::Cancelled { stage, .. } => Some(*stage),
            OrchestratorError::Configuration(_) => None,
        }
    }

    /// Whether the caller cancelled the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrchestratorError::Cancelled { .. })
    }

    /// Whether the job exceeded its wall-clock deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, OrchestratorError::Timeout { .. })
    }

    /// Whether the scheduler itself decided the job's fate
    pub fn is_job_outcome(&self) -> bool {
        matches!(
            self,
            OrchestratorError::JobFailed { .. }
                | OrchestratorError::JobCancelled { .. }
                | OrchestratorError::JobNotFound { .. }
                | OrchestratorError::Timeout { .. }
        )
    }
}

fn format_elapsed(elapsed: &Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{} minutes", secs / 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

/// Convert reqwest errors to ServiceError
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ServiceError::network(format!("Connection error: {}", err))
        } else if err.is_request() {
            ServiceError::validation(format!("Invalid request: {}", err))
        } else if err.is_decode() {
            ServiceError::parsing(format!("Response decode error: {}", err))
        } else {
            ServiceError::internal(format!("HTTP client error: {}", err))
        }
    }
}

/// Convert serde_json errors to ServiceError
impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::parsing(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ServiceError::not_found(err.to_string()),
            _ => ServiceError::io(err.to_string()),
        }
    }
}
