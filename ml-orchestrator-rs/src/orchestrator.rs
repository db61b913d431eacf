//! Root of the system: composes the training and prediction paths

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{error, instrument, warn};

use crate::config::{Invocation, OrchestratorConfig, StoreBackend};
use crate::core::{ArtifactStore, BatchScheduler, CancellationSignal, MessageQueue, ScoringRoutine};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::models::{Action, JobHandle, JobRequest, PredictionResult, TrainingResult, TrainingStatus};
use crate::prediction::ArtifactPipeline;
use crate::services::{
    FsArtifactStore, HttpArtifactStore, HttpBatchScheduler, HttpMessageQueue, ProcessScoringRoutine,
};
use crate::training::{CompletionNotifier, JobPoller, JobSubmitter, SubmitterSettings};

/// What an invocation produced
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Trained(TrainingResult),
    Predicted(PredictionResult),
}

/// Collaborators the orchestrator is wired with
pub struct Collaborators {
    pub scheduler: Arc<dyn BatchScheduler>,
    pub queue: Arc<dyn MessageQueue>,
    pub store: Arc<dyn ArtifactStore>,
    pub routine: Arc<dyn ScoringRoutine>,
}

impl Collaborators {
    /// Build the default clients described by the configuration
    pub fn from_config(config: &OrchestratorConfig) -> OrchestratorResult<Self> {
        let token = config.api_token.as_deref();
        let map = |e: crate::error::ServiceError| OrchestratorError::configuration(e.to_string());

        let scheduler = HttpBatchScheduler::new(&config.batch_endpoint, config.http_timeout, token).map_err(map)?;
        let queue = HttpMessageQueue::new(config.http_timeout, token).map_err(map)?;
        let store: Arc<dyn ArtifactStore> = match config.store {
            StoreBackend::Http { ref endpoint } => Arc::new(
                HttpArtifactStore::new(endpoint, &config.bucket, config.http_timeout, token).map_err(map)?,
            ),
            StoreBackend::Filesystem { ref root } => Arc::new(FsArtifactStore::new(root, &config.bucket)),
        };
        let routine = ProcessScoringRoutine::from_command(&config.scoring_command).map_err(map)?;

        Ok(Self {
            scheduler: Arc::new(scheduler),
            queue: Arc::new(queue),
            store,
            routine: Arc::new(routine),
        })
    }
}

pub struct Orchestrator {
    submitter: JobSubmitter,
    poller: JobPoller,
    notifier: CompletionNotifier,
    pipeline: ArtifactPipeline,
}

impl Orchestrator {
    pub fn new(config: &OrchestratorConfig, collaborators: Collaborators) -> Self {
        let settings = SubmitterSettings {
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            job_queue: config.job_queue.clone(),
            job_definition: config.job_definition.clone(),
            job_name_prefix: config.job_name_prefix.clone(),
            deploy_environment: config.deploy_environment.clone(),
        };

        Self {
            submitter: JobSubmitter::new(Arc::clone(&collaborators.scheduler), settings),
            poller: JobPoller::new(collaborators.scheduler, config.poll),
            notifier: CompletionNotifier::new(collaborators.queue, config.completion_queue_url.clone()),
            pipeline: ArtifactPipeline::new(
                collaborators.store,
                collaborators.routine,
                config.scratch_root.clone(),
            ),
        }
    }

    /// Dispatch one invocation
    pub async fn run(
        &self,
        invocation: &Invocation,
        cancellation: &CancellationSignal,
    ) -> OrchestratorResult<Outcome> {
        match invocation.action {
            Action::Train => self
                .train(
                    &invocation.provider,
                    &invocation.product_id,
                    &invocation.correlation_id,
                    cancellation,
                )
                .await
                .map(Outcome::Trained),
            Action::Predict => self
                .predict(&invocation.provider, &invocation.product_id, &invocation.correlation_id)
                .await
                .map(Outcome::Predicted),
        }
    }

    /// Submit a training job, wait for it, and publish the outcome.
    ///
    /// A job the scheduler finished unsuccessfully (or that ran out of time)
    /// is reported as `failed` on the completion queue before the error is
    /// returned. Caller cancellation and query errors publish nothing.
    #[instrument(skip(self, cancellation))]
    pub async fn train(
        &self,
        provider: &str,
        product_id: &str,
        correlation_id: &str,
        cancellation: &CancellationSignal,
    ) -> OrchestratorResult<TrainingResult> {
        let started = Instant::now();

        let request = self.submitter.build_request(provider, product_id, correlation_id);
        let handle = self.submitter.submit(&request).await?;

        match self.poller.wait(&handle, cancellation).await {
            Ok(()) => {
                let result = training_result(&request, &handle, started, TrainingStatus::Completed);
                self.notifier.notify(&result).await?;
                Ok(result)
            }
            Err(err) if err.is_job_outcome() => {
                error!(job_id = %handle.job_id, error = %err, "training job did not complete");
                let result = training_result(&request, &handle, started, TrainingStatus::Failed);
                if let Err(notify_err) = self.notifier.notify(&result).await {
                    warn!(error = %notify_err, "failed to report training failure");
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Score the latest trained model for a product
    #[instrument(skip(self))]
    pub async fn predict(
        &self,
        provider: &str,
        product_id: &str,
        correlation_id: &str,
    ) -> OrchestratorResult<PredictionResult> {
        self.pipeline.run(provider, product_id, correlation_id).await
    }
}

fn training_result(
    request: &JobRequest,
    handle: &JobHandle,
    started: Instant,
    status: TrainingStatus,
) -> TrainingResult {
    TrainingResult {
        provider: request.provider.clone(),
        product_id: request.product_id.clone(),
        correlation_id: request.correlation_id.clone(),
        status,
        model_path: request.output_path.clone(),
        training_time_ms: started.elapsed().as_millis() as u64,
        accuracy: None,
        job_id: handle.job_id.clone(),
    }
}
