//! Builds training job requests and hands them to the scheduler

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::core::BatchScheduler;
use crate::error::{OrchestratorError, OrchestratorResult, Stage};
use crate::models::{
    artifact_key, Hyperparameters, JobHandle, JobRequest, ResourceShape, TRAINING_ATTEMPT_TIMEOUT,
};

/// Static settings every submitted job shares
#[derive(Debug, Clone)]
pub struct SubmitterSettings {
    pub bucket: String,
    pub region: String,
    pub job_queue: String,
    pub job_definition: String,
    pub job_name_prefix: String,
    pub deploy_environment: String,
}

pub struct JobSubmitter {
    scheduler: Arc<dyn BatchScheduler>,
    settings: SubmitterSettings,
    hyperparameters: Hyperparameters,
}

impl JobSubmitter {
    pub fn new(scheduler: Arc<dyn BatchScheduler>, settings: SubmitterSettings) -> Self {
        Self {
            scheduler,
            settings,
            hyperparameters: Hyperparameters::default(),
        }
    }

    /// Where the training container writes the model for a product
    pub fn model_path(&self, provider: &str, product_id: &str) -> String {
        format!(
            "s3://{}/{}/trained_model",
            self.settings.bucket,
            artifact_key(provider, product_id)
        )
    }

    /// Build the request for one invocation.
    ///
    /// The job name carries the submission second so retries by the caller
    /// never collide with an earlier job.
    pub fn build_request(&self, provider: &str, product_id: &str, correlation_id: &str) -> JobRequest {
        let key = artifact_key(provider, product_id);
        let output_path = self.model_path(provider, product_id);
        let job_name = format!(
            "{}-{}-{}-{}",
            self.settings.job_name_prefix,
            provider,
            product_id,
            chrono::Utc::now().timestamp()
        );

        let mut environment = vec![
            ("S3_BUCKET".to_string(), self.settings.bucket.clone()),
            ("S3_KEY".to_string(), key),
            ("OUTPUT_PATH".to_string(), output_path.clone()),
            ("PROVIDER".to_string(), provider.to_string()),
            ("PRODUCT_ID".to_string(), product_id.to_string()),
            ("CORRELATION_ID".to_string(), correlation_id.to_string()),
            ("AWS_DEFAULT_REGION".to_string(), self.settings.region.clone()),
        ];
        environment.extend(self.hyperparameters.to_env());

        let tags = HashMap::from([
            ("Provider".to_string(), provider.to_string()),
            ("ProductID".to_string(), product_id.to_string()),
            ("CorrelationID".to_string(), correlation_id.to_string()),
            ("JobType".to_string(), "xgboost-training".to_string()),
            ("Environment".to_string(), self.settings.deploy_environment.clone()),
        ]);

        JobRequest {
            job_name,
            job_queue: self.settings.job_queue.clone(),
            job_definition: self.settings.job_definition.clone(),
            provider: provider.to_string(),
            product_id: product_id.to_string(),
            correlation_id: correlation_id.to_string(),
            resources: ResourceShape::default(),
            timeout: TRAINING_ATTEMPT_TIMEOUT,
            environment,
            tags,
            output_path,
        }
    }

    /// Submit once. Failures are fatal; the caller decides whether to re-invoke.
    pub async fn submit(&self, request: &JobRequest) -> OrchestratorResult<JobHandle> {
        let handle = self
            .scheduler
            .submit(request)
            .await
            .map_err(|e| OrchestratorError::stage(Stage::Submit, e))?;

        info!(
            job_id = %handle.job_id,
            job_name = %handle.job_name,
            correlation_id = %request.correlation_id,
            "training job submitted"
        );
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MockBatchScheduler;
    use crate::error::ServiceError;

    fn settings() -> SubmitterSettings {
        SubmitterSettings {
            bucket: "trader-data".to_string(),
            region: "us-east-2".to_string(),
            job_queue: "trader-ml-training-queue".to_string(),
            job_definition: "trader-xgb-training-job".to_string(),
            job_name_prefix: "trader-xgb".to_string(),
            deploy_environment: "dev".to_string(),
        }
    }

    #[test]
    fn test_request_shape() {
        let submitter = JobSubmitter::new(Arc::new(MockBatchScheduler::new()), settings());
        let request = submitter.build_request("COINBASE", "BTC-USD", "test-123");

        assert!(request.job_name.starts_with("trader-xgb-COINBASE-BTC-USD-"));
        let suffix = request.job_name.rsplit('-').next().unwrap();
        assert!(suffix.parse::<i64>().unwrap() > 1_600_000_000);

        assert_eq!(request.env("S3_KEY"), Some("COINBASE/BTC-USD"));
        assert_eq!(request.env("S3_BUCKET"), Some("trader-data"));
        assert_eq!(request.env("OUTPUT_PATH"), Some("s3://trader-data/COINBASE/BTC-USD/trained_model"));
        assert_eq!(request.env("CORRELATION_ID"), Some("test-123"));
        assert_eq!(request.env("HYPERPARAM_NUM_ROUND"), Some("100"));
        assert_eq!(request.env("HYPERPARAM_TREE_METHOD"), Some("hist"));
        assert_eq!(request.environment.len(), 7 + 12);

        assert_eq!(request.resources, ResourceShape { vcpus: 4, memory_mib: 8192 });
        assert_eq!(request.timeout.as_secs(), 1800);
        assert_eq!(request.tags["JobType"], "xgboost-training");
        assert_eq!(request.tags["CorrelationID"], "test-123");
        assert_eq!(request.tags["Environment"], "dev");
    }

    #[tokio::test]
    async fn test_submit_returns_handle() {
        let mut scheduler = MockBatchScheduler::new();
        scheduler.expect_submit().times(1).returning(|request| {
            Ok(JobHandle {
                job_id: "job-123".to_string(),
                job_name: request.job_name.clone(),
            })
        });

        let submitter = JobSubmitter::new(Arc::new(scheduler), settings());
        let request = submitter.build_request("COINBASE", "BTC-USD", "test-123");
        let handle = submitter.submit(&request).await.unwrap();

        assert_eq!(handle.job_id, "job-123");
        assert_eq!(handle.job_name, request.job_name);
    }

    #[tokio::test]
    async fn test_submit_failure_is_not_retried() {
        let mut scheduler = MockBatchScheduler::new();
        scheduler
            .expect_submit()
            .times(1)
            .returning(|_| Err(ServiceError::service("batch service unavailable")));

        let submitter = JobSubmitter::new(Arc::new(scheduler), settings());
        let request = submitter.build_request("COINBASE", "BTC-USD", "test-123");
        let err = submitter.submit(&request).await.unwrap_err();

        assert_eq!(err.failed_stage(), Some(Stage::Submit));
        assert!(err.to_string().starts_with("submit failed"));
        assert!(err.to_string().contains("batch service unavailable"));
    }
}
