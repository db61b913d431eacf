//! # ML Orchestrator
//!
//! Drives the trader ML pipeline for one provider/product pair per
//! invocation.
//!
//! This crate provides:
//!
//! - A training path that submits a batch job, polls it to a terminal state
//!   and publishes the outcome to a completion queue
//! - A prediction path that fetches a trained model and validation set,
//!   runs a scoring routine and persists the metrics
//! - Typed clients for the batch scheduler, message queue and artifact store
//! - Configuration management and structured logging
//!
//! ## Architecture
//!
//! External systems sit behind the traits in [`core`]:
//!
//! - `BatchScheduler`: submit and describe container jobs
//! - `MessageQueue`: publish completion messages
//! - `ArtifactStore`: read and write objects by key
//! - `ScoringRoutine`: compute metrics for a model against a dataset
//!
//! [`Orchestrator`] composes them; tests substitute mocks for each.

pub mod core;
pub use core::{
    ArtifactStore, BatchScheduler, CancellationHandle, CancellationSignal, MessageQueue,
    ScoringRoutine,
};

pub mod error;
pub use error::{OrchestratorError, OrchestratorResult, Result, ServiceError, Stage};

pub mod config;
pub use config::{ConfigProvider, Invocation, OrchestratorConfig, PollConfig, ServiceConfig};

pub mod logging;
pub use logging::{init_logging, LoggingConfig};

pub mod models;
pub mod orchestrator;
pub use orchestrator::{Collaborators, Orchestrator, Outcome};

pub mod prediction;
pub mod services;
pub mod training;

mod util;

#[cfg(test)]
mod tests;
