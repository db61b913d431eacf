//! Training path: submit a job, wait for it, report the outcome

pub mod notifier;
pub mod poller;
pub mod submitter;

pub use notifier::{CompletionNotifier, COMPLETION_JOB_TYPE};
pub use poller::JobPoller;
pub use submitter::{JobSubmitter, SubmitterSettings};
