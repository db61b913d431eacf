//! Prediction path: score a trained model against held-out data

pub mod pipeline;

pub use pipeline::{ArtifactKeys, ArtifactPipeline, ScratchSpace};
