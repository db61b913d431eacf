//! Publishes training outcomes to the completion queue

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::core::MessageQueue;
use crate::error::{OrchestratorError, OrchestratorResult, ServiceError, Stage};
use crate::models::TrainingResult;

/// Value of the `JobType` routing attribute on every completion message
pub const COMPLETION_JOB_TYPE: &str = "training_completion";

pub struct CompletionNotifier {
    queue: Arc<dyn MessageQueue>,
    destination: Option<String>,
}

impl CompletionNotifier {
    /// `destination: None` turns `notify` into a no-op
    pub fn new(queue: Arc<dyn MessageQueue>, destination: Option<String>) -> Self {
        Self { queue, destination }
    }

    /// Publish once. Returns the message id, or `None` when no destination is set.
    pub async fn notify(&self, result: &TrainingResult) -> OrchestratorResult<Option<String>> {
        let Some(ref destination) = self.destination else {
            info!(
                provider = %result.provider,
                product_id = %result.product_id,
                "no completion queue configured, skipping message"
            );
            return Ok(None);
        };

        let body = serde_json::to_string(result)
            .map_err(|e| OrchestratorError::stage(Stage::Notify, ServiceError::from(e)))?;

        let message_id = self
            .queue
            .publish(destination, &body, &routing_attributes(result))
            .await
            .map_err(|e| OrchestratorError::stage(Stage::Notify, e))?;

        info!(
            provider = %result.provider,
            product_id = %result.product_id,
            correlation_id = %result.correlation_id,
            %message_id,
            "completion message sent"
        );
        Ok(Some(message_id))
    }
}

/// Attributes consumers route on
pub fn routing_attributes(result: &TrainingResult) -> HashMap<String, String> {
    HashMap::from([
        ("Provider".to_string(), result.provider.clone()),
        ("ProductID".to_string(), result.product_id.clone()),
        ("JobType".to_string(), COMPLETION_JOB_TYPE.to_string()),
    ])
}
