// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::setup::configure;
use super::setup::example_config;
use super::setup::load_test_config;
use super::setup::test_setup;
use super::setup::test_setup_with_config;
use super::setup::wait_for_simulation;
use dropshot::test_util::read_json;
use gema_types::simulation::LaunchResponse;
use gema_types::simulation::SimulationRecord;
use gema_types::simulation::SimulationState;
use http::Method;
use http::StatusCode;

#[tokio::test]
async fn configure_run_complete() {
    let testctx = test_setup("configure_run_complete").await;
    let client = &testctx.client;
    configure(client, 1, &example_config()).await;

    let mut response = client
        .make_request(
            Method::PUT,
            "/simulation/1/run",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    let ack: LaunchResponse = read_json(&mut response).await;
    assert_eq!(ack.config_id, 1);
    assert_eq!(ack.sim_id, 1);
    assert!(ack.message.starts_with("Starting simulation 1"));
    assert!(ack.simulation.pid.is_some());
    assert_eq!(
        ack.simulation.log_path,
        testctx.output_path().join("config_1_sim_1").as_str()
    );

    let record = wait_for_simulation(client, 1, 1).await;
    assert_eq!(record.status, SimulationState::Completed);
    let exit = record.exit.expect("exit recorded");
    assert_eq!(exit.exit_code, Some(0));
    assert_eq!(exit.tick, Some(5000));

    let log = std::fs::read_to_string(&record.log_path).unwrap();
    assert!(log.contains("config_1_sim_1.board.json"), "{log}");
    let board: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(
            testctx.output_path().join("config_1_sim_1.board.json"),
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(board["memory"]["size"], "2048MB");
    assert_eq!(board["cache_hierarchy"]["params"]["l1d_size"], "64KiB");
    assert_eq!(board["workload"]["resource"], "x86-hello64-static");
    testctx.teardown().await;
}

#[tokio::test]
async fn run_unknown_configuration() {
    let testctx = test_setup("run_unknown_configuration").await;
    let client = &testctx.client;

    let error = client
        .make_request(
            Method::PUT,
            "/simulation/42/run",
            None as Option<()>,
            StatusCode::NOT_FOUND,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("NotFound"));

    client
        .make_request(
            Method::GET,
            "/simulation/42/sims",
            None as Option<()>,
            StatusCode::NOT_FOUND,
        )
        .await
        .expect_err("expected error");
    client
        .make_request(
            Method::GET,
            "/simulation/42/sims/1",
            None as Option<()>,
            StatusCode::NOT_FOUND,
        )
        .await
        .expect_err("expected error");
    assert_eq!(std::fs::read_dir(testctx.output_path()).unwrap().count(), 0);
    testctx.teardown().await;
}

#[tokio::test]
async fn concurrent_runs_get_contiguous_ids() {
    let testctx = test_setup("concurrent_runs_get_contiguous_ids").await;
    let client = &testctx.client;
    configure(client, 3, &example_config()).await;

    let launches = (0..8).map(move |_| async move {
        let mut response = client
            .make_request(
                Method::PUT,
                "/simulation/3/run",
                None as Option<()>,
                StatusCode::OK,
            )
            .await
            .unwrap();
        read_json::<LaunchResponse>(&mut response).await.sim_id
    });
    let mut ids = futures::future::join_all(launches).await;
    ids.sort();
    assert_eq!(ids, (1..=8).collect::<Vec<_>>());

    for sim_id in 1..=8 {
        let record = wait_for_simulation(client, 3, sim_id).await;
        assert_eq!(record.status, SimulationState::Completed);
    }

    let mut response = client
        .make_request(
            Method::GET,
            "/simulation/3/sims",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    let records: Vec<SimulationRecord> = read_json(&mut response).await;
    assert_eq!(
        records.iter().map(|r| r.sim_id).collect::<Vec<_>>(),
        (1..=8).collect::<Vec<_>>()
    );
    testctx.teardown().await;
}

#[tokio::test]
async fn rerun_simulation() {
    let mut config = load_test_config();
    config.engine.args = vec![
        "-c".to_string(),
        "echo \"pid $$\"; sleep 0.3; echo 'Exiting @ tick 77 because m5_exit instruction encountered.'"
            .to_string(),
        "gema-engine".to_string(),
    ];
    let testctx = test_setup_with_config("rerun_simulation", config).await;
    let client = &testctx.client;
    configure(client, 1, &example_config()).await;

    let mut response = client
        .make_request(
            Method::PUT,
            "/simulation/1/run",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    let first: LaunchResponse = read_json(&mut response).await;

    let error = client
        .make_request(
            Method::PUT,
            "/simulation/1/sims/1/run",
            None as Option<()>,
            StatusCode::CONFLICT,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("SimulationBusy"));

    client
        .make_request(
            Method::PUT,
            "/simulation/1/sims/2/run",
            None as Option<()>,
            StatusCode::NOT_FOUND,
        )
        .await
        .expect_err("expected error");

    let done = wait_for_simulation(client, 1, 1).await;
    assert_eq!(
        done.exit.unwrap().cause.as_deref(),
        Some("m5_exit instruction encountered")
    );

    let mut response = client
        .make_request(
            Method::PUT,
            "/simulation/1/sims/1/run",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    let second: LaunchResponse = read_json(&mut response).await;
    assert_eq!(second.sim_id, 1);
    assert_ne!(second.simulation.pid, first.simulation.pid);
    assert!(second.simulation.generated_on >= first.simulation.generated_on);

    let done = wait_for_simulation(client, 1, 1).await;
    assert_eq!(done.status, SimulationState::Completed);
    assert_eq!(done.exit.unwrap().tick, Some(77));

    // The log was replaced, not appended to.
    let log = std::fs::read_to_string(&done.log_path).unwrap();
    assert_eq!(log.matches("Exiting @ tick").count(), 1, "{log}");
    testctx.teardown().await;
}

#[tokio::test]
async fn failing_engine() {
    let mut config = load_test_config();
    config.engine.args = vec![
        "-c".to_string(),
        "echo 'fatal: could not obtain resource' >&2; exit 1".to_string(),
        "gema-engine".to_string(),
    ];
    let testctx = test_setup_with_config("failing_engine", config).await;
    let client = &testctx.client;
    configure(client, 1, &example_config()).await;

    client
        .make_request(
            Method::PUT,
            "/simulation/1/run",
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    let record = wait_for_simulation(client, 1, 1).await;
    assert_eq!(record.status, SimulationState::Failed);
    assert_eq!(record.exit.unwrap().exit_code, Some(1));
    testctx.teardown().await;
}

#[tokio::test]
async fn missing_engine() {
    let mut config = load_test_config();
    config.engine.program = "/nonexistent/gem5.opt".into();
    config.engine.args = Vec::new();
    let testctx = test_setup_with_config("missing_engine", config).await;
    let client = &testctx.client;
    configure(client, 1, &example_config()).await;

    let error = client
        .make_request(
            Method::PUT,
            "/simulation/1/run",
            None as Option<()>,
            StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await
        .expect_err("expected error");
    assert_eq!(error.error_code.as_deref(), Some("OrchestratorError"));

    let record = super::setup::get_simulation(client, 1, 1).await;
    assert_eq!(record.status, SimulationState::Failed);
    assert!(record.failure.unwrap().contains("/nonexistent/gem5.opt"));
    testctx.teardown().await;
}
