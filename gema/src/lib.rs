// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote control plane for the gem5 simulation engine.
//!
//! Clients register declarative machine configurations, launch simulations of
//! them as separate engine processes and poll the resulting records.

mod catalog;
mod config;
mod context;
mod engine;
mod error;
mod materialize;
mod orchestrator;
mod store;

pub mod http_entrypoints;

pub use config::CatalogSource;
pub use config::Config;
pub use config::ControlConfig;
pub use config::EngineConfig;
pub use config::LoadError;
pub use context::ServerContext;
pub use error::CatalogError;
pub use error::ConfigureError;
pub use error::MaterializeError;
pub use error::OrchestratorError;
pub use error::StoreError;
pub use orchestrator::lowest_free_id;

use slog::info;
use slog::o;
use slog::Logger;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// Run the OpenAPI generator for the API; which emits the OpenAPI spec
/// to stdout.
pub fn run_openapi() -> Result<(), String> {
    http_entrypoints::api()
        .openapi("gEMA Simulation Control API", "0.1.0")
        .description("API for configuring and running gem5 simulations")
        .write(&mut std::io::stdout())
        .map_err(|e| e.to_string())
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("initializing http server: {0}")]
    Http(String),
}

type HttpServer = dropshot::HttpServer<Arc<ServerContext>>;

pub struct Server {
    /// shared state used by API request handlers
    apictx: Arc<ServerContext>,
    http_server: HttpServer,
    /// observes `true` once a client has asked the server to shut down
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Start a gEMA server.
    pub async fn start(
        config: &Config,
        log: &Logger,
    ) -> Result<Server, StartError> {
        info!(log, "setting up gema server";
            "engine" => %config.engine.program,
            "output_dir" => %config.output_dir,
        );

        let (apictx, shutdown_rx) = ServerContext::new(config, log);

        let http_server = dropshot::HttpServerStarter::new(
            &config.dropshot,
            http_entrypoints::api(),
            Arc::clone(&apictx),
            &log.new(o!("component" => "dropshot")),
        )
        .map_err(|error| StartError::Http(error.to_string()))?
        .start();

        info!(log, "gema server listening";
            "address" => %http_server.local_addr(),
        );
        Ok(Server { apictx, http_server, shutdown_rx })
    }

    pub fn apictx(&self) -> &Arc<ServerContext> {
        &self.apictx
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.http_server.local_addr()
    }

    /// Wait until a client asks the server to shut down, then stop serving.
    ///
    /// Simulations already launched are not stopped.
    pub async fn wait_for_finish(mut self) -> Result<(), String> {
        // The sender lives in `apictx`, which we hold, so this only returns
        // once shutdown has been requested.
        let _ = self.shutdown_rx.wait_for(|requested| *requested).await;
        info!(self.apictx.log, "stopping http server");
        self.http_server.close().await
    }

    /// Stop serving immediately.
    pub async fn close(self) -> Result<(), String> {
        self.http_server.close().await
    }
}

/// Run an instance of the [Server].
pub async fn run_server(config: Config) -> Result<(), String> {
    let log = config
        .log
        .to_logger("gema")
        .map_err(|message| format!("initializing logger: {}", message))?;
    let server =
        Server::start(&config, &log).await.map_err(|e| e.to_string())?;
    server.wait_for_finish().await
}
