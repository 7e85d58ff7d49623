//! Staging configuration into the workspace of a running harness.

use super::helpers::{fast_config, launch, resource, snapshot};
use camino::Utf8Path;
use galley_harness::harness::domain::SnapshotContent;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn applied_text_lands_in_config_dir() {
    let galley = launch(fast_config()).await;

    let path = galley
        .apply_config_text(&resource("foo", "a", &json!(1)))
        .expect("apply fragment");

    let workspace = galley.workspace().expect("workspace exists");
    assert_eq!(path.parent(), Some(workspace.layout().config_dir()));
    assert!(
        path.file_name()
            .is_some_and(|name| name.starts_with("cfg-") && name.ends_with(".yaml"))
    );
    assert_eq!(
        workspace.config_entries().expect("list config"),
        vec![path.file_name().expect("file name").to_owned()]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn mirrored_directory_is_distributed() {
    let galley = launch(fast_config()).await;
    let source = tempfile::tempdir().expect("source dir");
    let networking = source.path().join("networking/v1alpha3");
    std::fs::create_dir_all(&networking).expect("nested dir");
    std::fs::write(
        networking.join("gateway.yaml"),
        resource("gateways", "ingress", &json!({"port": 80})),
    )
    .expect("gateway fragment");
    std::fs::write(
        source.path().join("services.yaml"),
        resource("services", "reviews", &json!({"hosts": ["reviews"]})),
    )
    .expect("service fragment");
    let source_path = Utf8Path::from_path(source.path()).expect("utf-8 temp path");

    galley
        .apply_config_dir(source_path)
        .expect("mirror directory");

    let config_dir = galley
        .workspace()
        .expect("workspace exists")
        .layout()
        .config_dir()
        .to_owned();
    assert!(config_dir.join("networking/v1alpha3/gateway.yaml").is_file());
    galley
        .wait_for_snapshot("gateways", &[snapshot("ingress", json!({"port": 80}))])
        .await
        .expect("gateway snapshot should arrive");
    galley
        .wait_for_snapshot(
            "services",
            &[snapshot("reviews", json!({"hosts": ["reviews"]}))],
        )
        .await
        .expect("service snapshot should arrive");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn clearing_config_distributes_empty_snapshot() {
    let galley = launch(fast_config()).await;
    galley
        .apply_config_text(&resource("foo", "a", &json!(1)))
        .expect("apply fragment");
    galley
        .wait_for_snapshot("foo", &[snapshot("a", 1)])
        .await
        .expect("snapshot should arrive");

    galley.clear_config().expect("clear config");

    assert!(
        galley
            .workspace()
            .expect("workspace exists")
            .config_entries()
            .expect("list config")
            .is_empty()
    );
    galley
        .wait_for_snapshot("foo", &[snapshot("a", 1), SnapshotContent::new()])
        .await
        .expect("empty snapshot should follow");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn clearing_many_fragments_is_one_change() {
    let galley = launch(fast_config()).await;
    for name in ["a", "b", "c", "d"] {
        galley
            .apply_config_text(&resource("foo", name, &json!(name)))
            .expect("apply fragment");
    }
    let full = SnapshotContent::new()
        .with_entry("a", "a")
        .with_entry("b", "b")
        .with_entry("c", "c")
        .with_entry("d", "d");
    galley
        .wait_for_snapshot("foo", std::slice::from_ref(&full))
        .await
        .expect("all fragments should arrive together");

    galley.clear_config().expect("clear config");

    galley
        .wait_for_snapshot("foo", &[full, SnapshotContent::new()])
        .await
        .expect("clear should be distributed as a single empty snapshot");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_source_directory_is_reported() {
    let galley = launch(fast_config()).await;

    let result = galley.apply_config_dir("/nonexistent/galley/source");

    assert!(result.is_err());
    assert!(
        galley
            .workspace()
            .expect("workspace exists")
            .config_entries()
            .expect("list config")
            .is_empty()
    );
}
