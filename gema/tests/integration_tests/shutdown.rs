// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::setup::load_test_config;
use super::setup::test_setup;
use super::setup::test_setup_with_config;
use super::setup::GemaTestContext;
use http::Method;
use http::StatusCode;
use std::time::Duration;

#[tokio::test]
async fn shutdown_stops_serving() {
    let GemaTestContext { client, server, logctx, output_dir: _output_dir } =
        test_setup("shutdown_stops_serving").await;
    let addr = server.local_addr();
    let finished = tokio::spawn(server.wait_for_finish());

    client
        .make_request(
            Method::PUT,
            "/shutdown",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(10), finished)
        .await
        .expect("server stopped")
        .unwrap()
        .unwrap();
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    logctx.cleanup_successful();
}

#[tokio::test]
async fn shutdown_requires_token() {
    let mut config = load_test_config();
    config.control.shutdown_token = Some("hunter2".to_string());
    let testctx =
        test_setup_with_config("shutdown_requires_token", config).await;

    let error = testctx
        .client
        .make_request(
            Method::PUT,
            "/shutdown",
            None as Option<()>,
            StatusCode::FORBIDDEN,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("Forbidden"));

    // Still serving.
    testctx
        .client
        .make_request(Method::GET, "/help", None as Option<()>, StatusCode::OK)
        .await
        .unwrap();

    let apictx = testctx.server.apictx();
    assert!(apictx.shutdown_permitted(Some("hunter2")));
    assert!(!apictx.shutdown_permitted(Some("hunter3")));
    testctx.teardown().await;
}
