// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::setup::configure;
use super::setup::example_config;
use super::setup::test_setup;
use dropshot::test_util::read_json;
use gema_types::config::ConfigureResponse;
use gema_types::config::StoredConfig;
use http::Method;
use http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn configure_and_list() {
    let testctx = test_setup("configure_and_list").await;
    let client = &testctx.client;

    let mut response = client
        .make_request(
            Method::PUT,
            "/simulation/1/configure",
            Some(&example_config()),
            StatusCode::OK,
        )
        .await
        .unwrap();
    let ack: ConfigureResponse = read_json(&mut response).await;
    assert_eq!(ack.config_id, 1);
    assert!(!ack.replaced);

    configure(client, 2, &example_config()).await;

    let mut response = client
        .make_request(
            Method::GET,
            "/config/saved",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    let saved: Vec<StoredConfig> = read_json(&mut response).await;
    assert_eq!(saved.iter().map(|c| c.config_id).collect::<Vec<_>>(), [1, 2]);
    assert_eq!(saved[0].config.board.kind.as_deref(), Some("SimpleBoard"));
    assert_eq!(saved[0].config.cache.l2_size, Some(256));
    testctx.teardown().await;
}

#[tokio::test]
async fn regenerate_with_empty_body() {
    let testctx = test_setup("regenerate_with_empty_body").await;
    let client = &testctx.client;
    configure(client, 4, &example_config()).await;

    let mut response = client
        .make_request(
            Method::PUT,
            "/simulation/4/configure",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    let ack: ConfigureResponse = read_json(&mut response).await;
    assert!(ack.replaced);

    let mut response = client
        .make_request(
            Method::GET,
            "/config/saved",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    let saved: Vec<StoredConfig> = read_json(&mut response).await;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].config.memory.size, Some(2048));

    // Regenerating something that was never configured is an error.
    let error = client
        .make_request(
            Method::PUT,
            "/simulation/5/configure",
            None as Option<()>,
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("InvalidInput"));
    testctx.teardown().await;
}

#[tokio::test]
async fn regenerate_with_null_body() {
    let testctx = test_setup("regenerate_with_null_body").await;
    let client = &testctx.client;
    configure(client, 6, &example_config()).await;

    let mut response = client
        .make_request(
            Method::PUT,
            "/simulation/6/configure",
            Some(&serde_json::Value::Null),
            StatusCode::OK,
        )
        .await
        .unwrap();
    let ack: ConfigureResponse = read_json(&mut response).await;
    assert!(ack.replaced);
    assert!(ack.message.starts_with("Regenerated configuration 6"));

    let mut response = client
        .make_request(
            Method::GET,
            "/config/saved",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    let saved: Vec<StoredConfig> = read_json(&mut response).await;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].config.board.kind.as_deref(), Some("SimpleBoard"));

    // With nothing stored, `null` is as invalid as an empty body.
    let error = client
        .make_request(
            Method::PUT,
            "/simulation/7/configure",
            Some(&serde_json::Value::Null),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("InvalidInput"));
    testctx.teardown().await;
}

#[tokio::test]
async fn rejected_configurations() {
    let testctx = test_setup("rejected_configurations").await;
    let client = &testctx.client;
    configure(client, 1, &example_config()).await;

    let mut bad_cache = example_config();
    bad_cache["cache"]["type"] = json!("MESITwoLevelCacheHierarchy");
    let error = client
        .make_request(
            Method::PUT,
            "/simulation/1/configure",
            Some(&bad_cache),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("UnsupportedOption"));

    let mut incomplete = example_config();
    incomplete["cache"].as_object_mut().unwrap().remove("l2_size");
    let error = client
        .make_request(
            Method::PUT,
            "/simulation/1/configure",
            Some(&incomplete),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("IncompleteConfiguration"));
    assert!(error.message.contains("cache.l2_size"), "{}", error.message);

    let mut bad_resource = example_config();
    bad_resource["resource"] = json!(["remote", "x86-hello64-static"]);
    let error = client
        .make_request(
            Method::PUT,
            "/simulation/1/configure",
            Some(&bad_resource),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("InvalidResourceKind"));

    let mut negative_clock = example_config();
    negative_clock["board"]["clk"] = json!(-3.0);
    negative_clock["memory"]["size"] = json!(0);
    let error = client
        .make_request(
            Method::PUT,
            "/simulation/1/configure",
            Some(&negative_clock),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("UnsupportedOption"));

    let error = client
        .make_request(
            Method::PUT,
            "/simulation/1/configure",
            Some("not a configuration"),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("InvalidInput"));

    // None of that disturbed the good configuration.
    let mut response = client
        .make_request(
            Method::GET,
            "/config/saved",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    let saved: Vec<StoredConfig> = read_json(&mut response).await;
    assert_eq!(saved.len(), 1);
    assert_eq!(
        saved[0].config.cache.kind.as_deref(),
        Some("PrivateL1PrivateL2CacheHierarchy")
    );
    testctx.teardown().await;
}
