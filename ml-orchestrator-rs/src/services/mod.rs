//! Concrete collaborator clients

pub mod batch;
pub mod common;
pub mod fs_store;
pub mod http_store;
pub mod queue;
pub mod scoring;

pub use batch::HttpBatchScheduler;
pub use fs_store::FsArtifactStore;
pub use http_store::HttpArtifactStore;
pub use queue::HttpMessageQueue;
pub use scoring::ProcessScoringRoutine;
