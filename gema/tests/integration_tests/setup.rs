// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared integration testing facilities

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use dropshot::test_util::read_json;
use dropshot::test_util::ClientTestContext;
use dropshot::test_util::LogContext;
use gema::Config;
use gema::Server;
use gema_types::simulation::SimulationRecord;
use http::Method;
use http::StatusCode;
use serde_json::json;
use slog::o;
use std::time::Duration;

pub struct GemaTestContext {
    pub client: ClientTestContext,
    pub server: Server,
    pub logctx: LogContext,
    pub output_dir: Utf8TempDir,
}

impl GemaTestContext {
    pub fn output_path(&self) -> &Utf8Path {
        self.output_dir.path()
    }

    pub async fn teardown(self) {
        self.server.close().await.unwrap();
        self.logctx.cleanup_successful();
    }
}

/// Loads the test suite configuration.
///
/// The test configuration requires the bind port to be 0 and the log path to
/// be the sentinel "UNUSED". Tests may adjust the rest before starting.
pub fn load_test_config() -> Config {
    Config::from_file("configs/config.test.toml")
        .expect("failed to load configs/config.test.toml")
}

pub async fn test_setup(test_name: &str) -> GemaTestContext {
    test_setup_with_config(test_name, load_test_config()).await
}

pub async fn test_setup_with_config(
    test_name: &str,
    mut config: Config,
) -> GemaTestContext {
    let output_dir = Utf8TempDir::new().unwrap();
    config.output_dir = output_dir.path().to_owned();

    let logctx = LogContext::new(test_name, &config.log);
    let server = Server::start(&config, &logctx.log).await.unwrap();
    let client = ClientTestContext::new(
        server.local_addr(),
        logctx.log.new(o!("component" => "client test context")),
    );
    GemaTestContext { client, server, logctx, output_dir }
}

/// A configuration the builtin catalog accepts.
pub fn example_config() -> serde_json::Value {
    json!({
        "board": {"type": "SimpleBoard", "clk": 3.0},
        "processor": {
            "isa": "x86",
            "type": "SimpleProcessor",
            "cpu": "timing",
            "ncores": 1
        },
        "memory": {"type": "SingleChannelDDR3_1600", "size": 2048},
        "cache": {
            "type": "PrivateL1PrivateL2CacheHierarchy",
            "l1d_size": 64,
            "l1i_size": 64,
            "l2_size": 256
        },
        "resource": ["default", "x86-hello64-static"]
    })
}

pub async fn configure(
    client: &ClientTestContext,
    config_id: u32,
    body: &serde_json::Value,
) {
    client
        .make_request(
            Method::PUT,
            &format!("/simulation/{config_id}/configure"),
            Some(body),
            StatusCode::OK,
        )
        .await
        .unwrap();
}

pub async fn get_simulation(
    client: &ClientTestContext,
    config_id: u32,
    sim_id: u32,
) -> SimulationRecord {
    let mut response = client
        .make_request(
            Method::GET,
            &format!("/simulation/{config_id}/sims/{sim_id}"),
            None as Option<()>,
            StatusCode::OK,
        )
        .await
        .unwrap();
    read_json(&mut response).await
}

/// Polls a simulation until its engine has exited.
pub async fn wait_for_simulation(
    client: &ClientTestContext,
    config_id: u32,
    sim_id: u32,
) -> SimulationRecord {
    for _ in 0..500 {
        let record = get_simulation(client, config_id, sim_id).await;
        if !record.status.is_active() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("simulation {config_id}/{sim_id} did not finish");
}
