//! Restart, reset, mesh config and close against a live server.

use super::helpers::{fast_config, launch, resource, snapshot};
use galley_harness::harness::domain::{LifecycleState, MESH_CONFIG_COLLECTION};
use galley_harness::harness::services::HarnessError;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn launched_harness_is_running_with_empty_mesh_config() {
    let galley = launch(fast_config()).await;

    assert_eq!(galley.state(), LifecycleState::Running);
    assert_ne!(galley.address().expect("address").port(), 0);
    galley
        .wait_for_snapshot(MESH_CONFIG_COLLECTION, &[snapshot("meshconfig", json!({}))])
        .await
        .expect("empty mesh config should be distributed");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn mesh_config_takes_effect_after_restart() {
    let mut galley = launch(fast_config()).await;

    galley
        .set_mesh_config("ingressClass: istio\n")
        .await
        .expect("set mesh config");

    assert_eq!(galley.state(), LifecycleState::Running);
    galley
        .wait_for_snapshot(
            MESH_CONFIG_COLLECTION,
            &[snapshot("meshconfig", json!({"ingressClass": "istio"}))],
        )
        .await
        .expect("new mesh config should be distributed");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn staged_config_survives_restart() {
    let mut galley = launch(fast_config()).await;
    galley
        .apply_config_text(&resource("foo", "a", &json!(1)))
        .expect("apply fragment");

    galley.restart().await.expect("restart");

    galley
        .wait_for_snapshot("foo", &[snapshot("a", 1)])
        .await
        .expect("staged config should be distributed by the new instance");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reset_discards_workspace_and_history() {
    let mut galley = launch(fast_config()).await;
    galley
        .apply_config_text(&resource("foo", "a", &json!(1)))
        .expect("apply fragment");
    let first_root = galley
        .workspace()
        .expect("workspace exists")
        .layout()
        .root()
        .to_owned();

    galley.reset().await.expect("first reset");
    galley.reset().await.expect("second reset");

    let workspace = galley.workspace().expect("workspace exists");
    assert!(!first_root.exists());
    assert_ne!(workspace.layout().root(), first_root.as_path());
    assert!(workspace.config_entries().expect("list config").is_empty());
    assert_eq!(workspace.mesh_config().expect("read mesh config"), "");
    galley
        .wait_for_snapshot("foo", &[])
        .await
        .expect("fresh instance has no foo snapshots");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn close_is_repeatable_and_restart_recovers() {
    let mut galley = launch(fast_config()).await;
    galley
        .apply_config_text(&resource("foo", "a", &json!(1)))
        .expect("apply fragment");

    galley.close().await.expect("first close");
    galley.close().await.expect("second close");

    assert_eq!(galley.state(), LifecycleState::Stopped);
    assert!(matches!(galley.address(), Err(HarnessError::NotRunning)));
    assert!(matches!(
        galley.wait_for_snapshot("foo", &[]).await,
        Err(HarnessError::NotRunning)
    ));

    galley.restart().await.expect("restart after close");
    galley
        .wait_for_snapshot("foo", &[snapshot("a", 1)])
        .await
        .expect("staged config should be distributed");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dropping_harness_removes_workspace() {
    let galley = launch(fast_config()).await;
    let root = galley
        .workspace()
        .expect("workspace exists")
        .layout()
        .root()
        .to_owned();

    drop(galley);

    assert!(!root.exists());
}
