// ml-orchestrator-rs/src/main.rs
// Entry point: run one training or prediction invocation configured from the environment

use anyhow::Context;
use tracing::{error, info};

use ml_orchestrator::config::EnvConfigProvider;
use ml_orchestrator::{
    init_logging, CancellationHandle, Collaborators, Invocation, LoggingConfig, Orchestrator,
    OrchestratorConfig, Outcome,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let provider = EnvConfigProvider::new();

    init_logging(Some(LoggingConfig::from_provider(&provider)))
        .context("failed to initialize logging")?;

    let config =
        OrchestratorConfig::from_provider(&provider).context("invalid orchestrator configuration")?;
    let invocation = Invocation::from_provider(&provider).context("invalid invocation")?;

    info!(
        action = %invocation.action,
        provider = %invocation.provider,
        product_id = %invocation.product_id,
        correlation_id = %invocation.correlation_id,
        "starting invocation"
    );

    let (handle, signal) = CancellationHandle::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel("interrupted");
        }
    });

    let collaborators = Collaborators::from_config(&config)?;
    let orchestrator = Orchestrator::new(&config, collaborators);

    match orchestrator.run(&invocation, &signal).await {
        Ok(outcome) => {
            let body = match outcome {
                Outcome::Trained(result) => serde_json::to_string_pretty(&result)?,
                Outcome::Predicted(result) => serde_json::to_string_pretty(&result)?,
            };
            println!("{}", body);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, stage = ?e.failed_stage(), "invocation failed");
            Err(e.into())
        }
    }
}
