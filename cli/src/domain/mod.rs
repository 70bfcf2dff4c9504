//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod assertion;
pub mod config;
pub mod error;
pub mod options;
pub mod report;
pub mod retry;
pub mod scenario;
pub mod workspace;

pub use assertion::{Assertion, evaluate_all};
pub use config::{ConfigFile, EngineConfig};
pub use error::{ConfigError, PollError, SuiteError, WorkspaceError};
pub use options::{ProvisioningOptions, ToolFlags};
pub use report::{AssertionOutcome, FailureKind, Stage, StageOutcome, SuiteReport, TestResult};
pub use retry::{
    AttemptOutcome, AttemptRecord, Classification, RetryClassifier, RetryPolicy,
    RetryablePattern, ToolFailure,
};
pub use scenario::{Backoff, PollConfig, Scenario, select_scenarios, validate_suite};
pub use workspace::{WorkspaceRecord, generate_workspace_id, validate_workspace_id};
