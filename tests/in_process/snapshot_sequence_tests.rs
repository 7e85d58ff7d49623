//! Exact snapshot sequence matching against a live server.

use super::helpers::{fast_config, launch, resource, short_wait_config, snapshot};
use galley_harness::harness::services::HarnessError;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sequence_must_match_exactly() {
    let galley = launch(short_wait_config()).await;

    galley
        .apply_config_text(&resource("foo", "a", &json!(1)))
        .expect("apply first fragment");
    galley
        .wait_for_snapshot("foo", &[snapshot("a", 1)])
        .await
        .expect("first snapshot should arrive");
    galley
        .apply_config_text(&resource("foo", "a", &json!(2)))
        .expect("apply second fragment");
    galley
        .wait_for_snapshot("foo", &[snapshot("a", 1), snapshot("a", 2)])
        .await
        .expect("full sequence should arrive");

    let prefix = galley.wait_for_snapshot("foo", &[snapshot("a", 1)]).await;
    match prefix {
        Err(HarnessError::SnapshotTimeout { last_observed, .. }) => {
            assert_eq!(last_observed, Some(vec![snapshot("a", 1), snapshot("a", 2)]));
        }
        other => panic!("prefix should not match, got {other:?}"),
    }

    let reversed = galley
        .wait_for_snapshot("foo", &[snapshot("a", 2), snapshot("a", 1)])
        .await;
    assert!(matches!(reversed, Err(HarnessError::SnapshotTimeout { .. })));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_expectation_matches_only_untouched_collections() {
    let galley = launch(short_wait_config()).await;

    galley
        .wait_for_snapshot("bar", &[])
        .await
        .expect("untouched collection has no snapshots");

    galley
        .apply_config_text(&resource("bar", "b", &json!({"enabled": true})))
        .expect("apply fragment");
    galley
        .wait_for_snapshot("bar", &[snapshot("b", json!({"enabled": true}))])
        .await
        .expect("snapshot should arrive");

    let result = galley.wait_for_snapshot("bar", &[]).await;
    assert!(matches!(result, Err(HarnessError::SnapshotTimeout { .. })));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_waits_observe_their_own_collections() {
    let galley = launch(fast_config()).await;
    galley
        .apply_config_text(&resource("foo", "a", &json!(1)))
        .expect("apply foo");
    galley
        .apply_config_text(&resource("bar", "b", &json!("x")))
        .expect("apply bar");

    let foo_expected = [snapshot("a", 1)];
    let bar_expected = [snapshot("b", "x")];
    let (foo, bar) = tokio::join!(
        galley.wait_for_snapshot("foo", &foo_expected),
        galley.wait_for_snapshot("bar", &bar_expected),
    );

    foo.expect("foo snapshot should arrive");
    bar.expect("bar snapshot should arrive");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn blank_collection_name_is_rejected() {
    let galley = launch(fast_config()).await;

    let result = galley.wait_for_snapshot(" ", &[]).await;

    assert!(matches!(result, Err(HarnessError::Domain(_))));
}
