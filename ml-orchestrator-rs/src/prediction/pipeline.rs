//! Fetch → score → persist
//!
//! Every step before persistence is fatal. Persisting the result is
//! best-effort: the computed metrics are the deliverable, so an upload
//! failure is logged and the result is still returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::core::{ArtifactStore, ScoringRoutine};
use crate::error::{OrchestratorError, OrchestratorResult, ServiceError, Stage};
use crate::models::{artifact_key, PredictionResult};

pub const MODEL_FILE: &str = "xgb_model.joblib";
pub const DATASET_FILE: &str = "validation.libsvm";
pub const RESULTS_FILE: &str = "prediction_results.json";
pub const RESULTS_CONTENT_TYPE: &str = "application/json";

/// Store keys used for one provider/product pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    pub model: String,
    pub dataset: String,
    pub results: String,
}

impl ArtifactKeys {
    pub fn new(provider: &str, product_id: &str) -> Self {
        let base = artifact_key(provider, product_id);
        Self {
            model: format!("{}/trained_model/{}", base, MODEL_FILE),
            dataset: format!("{}/validation/{}", base, DATASET_FILE),
            results: format!("{}/predictions/{}", base, RESULTS_FILE),
        }
    }
}

/// Local working directory for one invocation, removed on drop
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a fresh directory under `root`, named after the correlation id.
    ///
    /// The filesystem calls run on the blocking pool.
    pub async fn create(root: &Path, correlation_id: &str) -> std::io::Result<Self> {
        let root = root.to_path_buf();
        let label: String = correlation_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .take(64)
            .collect();

        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root)?;
            let dir = tempfile::Builder::new()
                .prefix(&format!("predict-{}-", label))
                .tempdir_in(&root)?;
            Ok(Self { dir })
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.path().join(MODEL_FILE)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.dir.path().join(DATASET_FILE)
    }
}

pub struct ArtifactPipeline {
    store: Arc<dyn ArtifactStore>,
    routine: Arc<dyn ScoringRoutine>,
    scratch_root: PathBuf,
}

impl ArtifactPipeline {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        routine: Arc<dyn ScoringRoutine>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            routine,
            scratch_root: scratch_root.into(),
        }
    }

    pub async fn run(
        &self,
        provider: &str,
        product_id: &str,
        correlation_id: &str,
    ) -> OrchestratorResult<PredictionResult> {
        let keys = ArtifactKeys::new(provider, product_id);
        let scratch = ScratchSpace::create(&self.scratch_root, correlation_id)
            .await
            .map_err(|e| OrchestratorError::stage(Stage::Fetch, ServiceError::from(e)))?;
        debug!(scratch = %scratch.path().display(), "scratch directory created");

        let model_path = scratch.model_path();
        let dataset_path = scratch.dataset_path();
        self.fetch(&keys.model, &model_path).await?;
        self.fetch(&keys.dataset, &dataset_path).await?;

        let output = self
            .routine
            .score(&model_path, &dataset_path)
            .await
            .map_err(|e| OrchestratorError::stage(Stage::Invoke, e))?;

        let result = PredictionResult::from_scoring(provider, product_id, correlation_id, output);

        if let Err(e) = self.persist(&keys.results, &result).await {
            warn!(
                key = %keys.results,
                correlation_id,
                error = %e,
                "failed to upload prediction results"
            );
        }

        info!(
            provider,
            product_id,
            accuracy = result.accuracy,
            auc = result.auc,
            samples = result.sample_count,
            "prediction completed"
        );
        Ok(result)
    }

    async fn fetch(&self, key: &str, destination: &Path) -> OrchestratorResult<()> {
        let bytes = self
            .store
            .get(key)
            .await
            .map_err(|e| OrchestratorError::stage(Stage::Fetch, e))?;
        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|e| OrchestratorError::stage(Stage::Fetch, ServiceError::from(e)))?;
        debug!(key, bytes = bytes.len(), "artifact fetched");
        Ok(())
    }

    async fn persist(&self, key: &str, result: &PredictionResult) -> OrchestratorResult<()> {
        let body = serde_json::to_vec_pretty(result)
            .map_err(|e| OrchestratorError::stage(Stage::Persist, ServiceError::from(e)))?;
        self.store
            .put(key, body, RESULTS_CONTENT_TYPE)
            .await
            .map_err(|e| OrchestratorError::stage(Stage::Persist, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_keys() {
        let keys = ArtifactKeys::new("COINBASE", "BTC-USD");
        assert_eq!(keys.model, "COINBASE/BTC-USD/trained_model/xgb_model.joblib");
        assert_eq!(keys.dataset, "COINBASE/BTC-USD/validation/validation.libsvm");
        assert_eq!(keys.results, "COINBASE/BTC-USD/predictions/prediction_results.json");
    }

    #[tokio::test]
    async fn test_scratch_spaces_are_distinct_and_cleaned_up() {
        let root = tempfile::tempdir().unwrap();
        let first = ScratchSpace::create(root.path(), "test-123").await.unwrap();
        let second = ScratchSpace::create(root.path(), "test-123").await.unwrap();

        assert_ne!(first.path(), second.path());
        assert_ne!(first.model_path(), second.model_path());
        assert!(first
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("predict-test-123-"));

        let kept = first.path().to_path_buf();
        drop(first);
        assert!(!kept.exists());
    }

    #[tokio::test]
    async fn test_scratch_label_is_sanitized() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::create(root.path(), "../../etc").await.unwrap();
        assert_eq!(scratch.path().parent().unwrap(), root.path());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_scratch_root_is_created_off_the_runtime_thread() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("scratch").join("predict");

        let scratch = ScratchSpace::create(&nested, "test-123").await.unwrap();

        assert!(nested.is_dir());
        assert_eq!(scratch.path().parent().unwrap(), nested.as_path());
    }
}
