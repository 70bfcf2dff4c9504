//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod cleanup_service;
pub mod provisioning;
pub mod readiness;
pub mod retry;
pub mod scenario_runner;

pub use provisioning::{Applied, Destroyed, ProvisioningDriver};
pub use readiness::{PollSummary, wait_until_ready};
pub use retry::ProvisionFailure;
pub use scenario_runner::ScenarioRunner;
