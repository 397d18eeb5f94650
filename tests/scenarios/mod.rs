//! Scenario-based tests for buildgate

mod concurrency;
mod env_scoping;
mod failure_handling;
mod full_pipeline;
mod reporting;
mod secret_provisioning;
mod shell_isolation;
mod trigger_filtering;
