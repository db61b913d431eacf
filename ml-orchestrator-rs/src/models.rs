//! Data model shared by the training and prediction paths

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Decision threshold the scoring routine applies to turn scores into classes
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Fixed vCPU allocation for training jobs
pub const TRAINING_VCPUS: u32 = 4;

/// Fixed memory allocation for training jobs
pub const TRAINING_MEMORY_MIB: u32 = 8192;

/// Maximum duration of a single training job attempt
pub const TRAINING_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1800);

/// What an invocation should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Train,
    Predict,
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "train" => Ok(Action::Train),
            "predict" => Ok(Action::Predict),
            other => Err(format!("Unknown action: {}", other)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Train => f.write_str("train"),
            Action::Predict => f.write_str("predict"),
        }
    }
}

/// Compute allocation for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceShape {
    pub vcpus: u32,
    pub memory_mib: u32,
}

impl Default for ResourceShape {
    fn default() -> Self {
        Self {
            vcpus: TRAINING_VCPUS,
            memory_mib: TRAINING_MEMORY_MIB,
        }
    }
}

/// The canonical hyperparameter profile shipped with the trainer.
///
/// No tuning happens at this layer; every training job gets the same set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperparameters {
    values: BTreeMap<String, String>,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        let values = [
            ("max_depth", "6"),
            ("eta", "0.1"),
            ("gamma", "1"),
            ("min_child_weight", "1"),
            ("subsample", "0.8"),
            ("colsample_bytree", "0.8"),
            ("objective", "binary:logistic"),
            ("eval_metric", "auc"),
            ("num_round", "100"),
            ("early_stopping", "10"),
            ("tree_method", "hist"),
            ("verbosity", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self { values }
    }
}

impl Hyperparameters {
    /// Environment entries exposing each hyperparameter to the training container
    pub fn to_env(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.values
            .iter()
            .map(|(k, v)| (format!("HYPERPARAM_{}", k.to_uppercase()), v.clone()))
    }
}

/// Everything the scheduler needs to run one training job
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub job_name: String,
    pub job_queue: String,
    pub job_definition: String,
    pub provider: String,
    pub product_id: String,
    pub correlation_id: String,
    pub resources: ResourceShape,
    pub timeout: Duration,
    /// Ordered so the submitted payload is deterministic
    pub environment: Vec<(String, String)>,
    pub tags: HashMap<String, String>,
    /// Where the training container writes the model
    pub output_path: String,
}

impl JobRequest {
    pub fn env(&self, name: &str) -> Option<&str> {
        self.environment
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Reference to a submitted job
#[derive(Debug, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub job_name: String,
}

/// Job state as reported by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitted,
    Pending,
    Runnable,
    Starting,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    /// Derived locally when the scheduler returns no entry for the job
    #[serde(skip)]
    NotFound,
    /// Any state name this client does not recognise
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled | JobStatus::NotFound
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Pending => "PENDING",
            JobStatus::Runnable => "RUNNABLE",
            JobStatus::Starting => "STARTING",
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::NotFound => "NOT_FOUND",
            JobStatus::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// One entry of a describe response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription {
    pub job_id: String,
    pub job_name: String,
    pub status: JobStatus,
    pub status_reason: Option<String>,
}

/// Outcome of a training job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingStatus {
    Completed,
    Failed,
}

/// Message published when a training job ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    pub provider: String,
    pub product_id: String,
    pub correlation_id: String,
    pub status: TrainingStatus,
    pub model_path: String,
    pub training_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    pub job_id: String,
}

/// Binary confusion matrix reduced to four counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: u64,
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
}

impl ConfusionMatrix {
    /// Reduce a raw matrix laid out as `[[tn, fp], [fn, tp]]`.
    ///
    /// Anything other than exactly 2x2 (a single-class validation set) yields
    /// all-zero counts.
    pub fn from_rows(rows: &[Vec<u64>]) -> Self {
        match rows {
            [first, second] if first.len() == 2 && second.len() == 2 => Self {
                true_negative: first[0],
                false_positive: first[1],
                false_negative: second[0],
                true_positive: second[1],
            },
            _ => Self::default(),
        }
    }

    pub fn total(&self) -> u64 {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }
}

/// Confusion matrix as emitted by a scoring routine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawConfusionMatrix {
    Counts(ConfusionMatrix),
    Rows(Vec<Vec<u64>>),
}

impl RawConfusionMatrix {
    pub fn reduce(&self) -> ConfusionMatrix {
        match self {
            RawConfusionMatrix::Counts(counts) => *counts,
            RawConfusionMatrix::Rows(rows) => ConfusionMatrix::from_rows(rows),
        }
    }
}

/// Structured output of a scoring routine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringOutput {
    pub predictions: Vec<f64>,
    pub accuracy: f64,
    pub auc: f64,
    #[serde(default)]
    pub confusion_matrix: Option<RawConfusionMatrix>,
    pub sample_count: u64,
}

impl ScoringOutput {
    pub fn confusion_counts(&self) -> ConfusionMatrix {
        self.confusion_matrix
            .as_ref()
            .map(RawConfusionMatrix::reduce)
            .unwrap_or_default()
    }
}

/// Prediction metrics for one product, persisted to the artifact store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub provider: String,
    pub product_id: String,
    pub correlation_id: String,
    pub predictions: Vec<f64>,
    pub accuracy: f64,
    pub auc: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub sample_count: u64,
}

impl PredictionResult {
    /// Merge routine output with the caller's identifiers.
    ///
    /// Identifiers are never taken from the routine.
    pub fn from_scoring(
        provider: &str,
        product_id: &str,
        correlation_id: &str,
        output: ScoringOutput,
    ) -> Self {
        let confusion_matrix = output.confusion_counts();
        Self {
            provider: provider.to_string(),
            product_id: product_id.to_string(),
            correlation_id: correlation_id.to_string(),
            predictions: output.predictions,
            accuracy: output.accuracy,
            auc: output.auc,
            confusion_matrix,
            sample_count: output.sample_count,
        }
    }
}

/// Artifact key prefix for a provider/product pair
pub fn artifact_key(provider: &str, product_id: &str) -> String {
    format!("{}/{}", provider, product_id)
}
