//! Unit tests for the orchestrator
//!
//! Collaborators are replaced with mockall mocks, the HTTP clients are
//! exercised against WireMock servers.

pub mod config_tests;
