//! Tests for `destroy_retained`: tearing down a workspace kept after a
//! failed destroy.

#![allow(clippy::expect_used)]

use std::path::{Path, PathBuf};

use chrono::Utc;
use infracheck_cli::application::services::ProvisionFailure;
use infracheck_cli::application::services::cleanup_service::destroy_retained;
use infracheck_cli::domain::{ProvisioningOptions, WorkspaceError, WorkspaceRecord};

use crate::helpers::{engine_config, err_output};
use crate::mocks::{MemoryRecords, MemoryWorkspaces, RecordingReporter, ScriptedTool, Step};

const ID: &str = "infracheck-00000000000000aa";

/// Record written when the workspace lived somewhere else.
fn record(id: &str) -> WorkspaceRecord {
    WorkspaceRecord {
        workspace_id: id.to_string(),
        scenario: "lb-network".to_string(),
        created_at: Utc::now(),
        relative_dir: PathBuf::from("modules/lb"),
        options: ProvisioningOptions::new(format!("/tmp/{id}/modules/lb")).with_var("name", "test-lb"),
    }
}

fn root() -> PathBuf {
    PathBuf::from("/retained").join(ID)
}

#[tokio::test(start_paused = true)]
async fn destroys_at_the_current_location_and_removes_the_workspace() {
    let tool = ScriptedTool::new().already_initialized();
    let records = MemoryRecords::new().with(&root(), record(ID));
    let workspaces = MemoryWorkspaces::new();
    let reporter = RecordingReporter::new();

    let destroyed = destroy_retained(
        &tool,
        &records,
        &workspaces,
        &reporter,
        &engine_config(),
        &root(),
    )
    .await
    .expect("destroy");

    assert_eq!(destroyed.attempt_count(), 1);
    let seen = tool.seen_options();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].dir, root().join("modules/lb"));
    assert_eq!(workspaces.released(), vec![(ID.to_string(), false)]);
    assert!(reporter.messages().iter().any(|m| m.contains("lb-network")));
}

#[tokio::test(start_paused = true)]
async fn directory_without_record_is_rejected() {
    let tool = ScriptedTool::new().already_initialized();
    let workspaces = MemoryWorkspaces::new();

    let err = destroy_retained(
        &tool,
        &MemoryRecords::new(),
        &workspaces,
        &RecordingReporter::new(),
        &engine_config(),
        Path::new("/home/user/project"),
    )
    .await
    .expect_err("no record");

    assert!(matches!(
        err.downcast_ref::<WorkspaceError>(),
        Some(WorkspaceError::NoRecord(_))
    ));
    assert!(tool.calls().is_empty());
    assert!(workspaces.released().is_empty());
}

#[tokio::test(start_paused = true)]
async fn record_with_invalid_id_is_rejected() {
    let tool = ScriptedTool::new().already_initialized();
    let records = MemoryRecords::new().with(&root(), record("../../etc"));

    let err = destroy_retained(
        &tool,
        &records,
        &MemoryWorkspaces::new(),
        &RecordingReporter::new(),
        &engine_config(),
        &root(),
    )
    .await
    .expect_err("invalid id");

    assert!(matches!(
        err.downcast_ref::<WorkspaceError>(),
        Some(WorkspaceError::InvalidId(_))
    ));
    assert!(tool.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_destroy_keeps_the_workspace() {
    let tool = ScriptedTool::new()
        .already_initialized()
        .with_destroy(vec![Step::Out(err_output(1, b"Error: DependencyViolation: resource has a dependent object"))]);
    let records = MemoryRecords::new().with(&root(), record(ID));
    let workspaces = MemoryWorkspaces::new();

    let err = destroy_retained(
        &tool,
        &records,
        &workspaces,
        &RecordingReporter::new(),
        &engine_config(),
        &root(),
    )
    .await
    .expect_err("destroy fails");

    assert!(err.chain().any(|c| c.is::<ProvisionFailure>()));
    assert!(format!("{err:#}").contains("DependencyViolation"));
    assert!(workspaces.released().is_empty());
}
