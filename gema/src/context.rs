// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::catalog::OptionCatalog;
use crate::config::Config;
use crate::error::CatalogError;
use crate::error::ConfigureError;
use crate::error::OrchestratorError;
use crate::materialize::materialize;
use crate::orchestrator::Orchestrator;
use crate::store::ConfigStore;
use gema_types::catalog::CatalogSnapshot;
use gema_types::config::ConfigId;
use gema_types::config::ConfigureResponse;
use gema_types::config::SimulationConfig;
use gema_types::config::StoredConfig;
use gema_types::simulation::LaunchResponse;
use gema_types::simulation::SimId;
use gema_types::simulation::SimulationRecord;
use slog::info;
use slog::warn;
use slog::Logger;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared state used by API request handlers
pub struct ServerContext {
    store: ConfigStore,
    catalog: OptionCatalog,
    orchestrator: Orchestrator,
    shutdown_token: Option<String>,
    shutdown_tx: watch::Sender<bool>,
    pub log: Logger,
}

impl ServerContext {
    /// Returns the context along with a receiver that observes `true` once a
    /// client asks the server to shut down.
    pub fn new(
        config: &Config,
        log: &Logger,
    ) -> (Arc<Self>, watch::Receiver<bool>) {
        let log = log.new(slog::o!("component" => "ServerContext"));
        if config.control.shutdown_token.is_none() {
            warn!(
                log,
                "no shutdown token configured; any client may stop the server"
            );
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let apictx = Arc::new(ServerContext {
            store: ConfigStore::new(&log),
            catalog: OptionCatalog::new(config.catalog.clone(), &log),
            orchestrator: Orchestrator::new(
                config.engine.clone(),
                config.output_dir.clone(),
                &log,
            ),
            shutdown_token: config.control.shutdown_token.clone(),
            shutdown_tx,
            log,
        });
        (apictx, shutdown_rx)
    }

    pub async fn options(&self) -> Result<CatalogSnapshot, CatalogError> {
        self.catalog.snapshot().await
    }

    pub async fn saved(&self) -> Vec<StoredConfig> {
        self.store.list().await
    }

    /// Creates or replaces configuration `config_id` from a raw request body.
    ///
    /// An empty body or a JSON `null` regenerates the existing configuration.
    /// The payload must materialize against the current catalog before it is
    /// stored.
    pub async fn configure(
        &self,
        config_id: ConfigId,
        body: &[u8],
    ) -> Result<ConfigureResponse, ConfigureError> {
        let payload = if body.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            let value: serde_json::Value = serde_json::from_slice(body)
                .map_err(ConfigureError::Malformed)?;
            if value.is_null() {
                None
            } else {
                let config: SimulationConfig = serde_json::from_value(value)
                    .map_err(ConfigureError::Malformed)?;
                Some(config)
            }
        };
        let catalog = self.catalog.snapshot().await?;
        let saved = self
            .store
            .save_checked(config_id, payload, |config| {
                materialize(config, &catalog)?;
                Ok::<(), ConfigureError>(())
            })
            .await?;

        let message = if saved.replaced {
            format!("Regenerated configuration {config_id}. Ready to simulate.")
        } else {
            format!("Saved configuration {config_id}. Ready to simulate.")
        };
        Ok(ConfigureResponse {
            config_id,
            replaced: saved.replaced,
            message,
        })
    }

    async fn stored(
        &self,
        config_id: ConfigId,
    ) -> Result<StoredConfig, OrchestratorError> {
        self.store
            .get(config_id)
            .await
            .map_err(|_| OrchestratorError::ConfigNotFound { config_id })
    }

    /// Launches a new simulation of `config_id`.
    pub async fn run(
        &self,
        config_id: ConfigId,
    ) -> Result<LaunchResponse, OrchestratorError> {
        let stored = self.stored(config_id).await?;
        let catalog = self.catalog.snapshot().await?;
        let simulation = self.orchestrator.start(&stored, &catalog).await?;
        Ok(LaunchResponse {
            config_id,
            sim_id: simulation.sim_id,
            message: format!(
                "Starting simulation {} of configuration {config_id}",
                simulation.sim_id
            ),
            simulation,
        })
    }

    /// Launches simulation `sim_id` of `config_id` again.
    pub async fn rerun(
        &self,
        config_id: ConfigId,
        sim_id: SimId,
    ) -> Result<LaunchResponse, OrchestratorError> {
        let stored = self.stored(config_id).await?;
        let catalog = self.catalog.snapshot().await?;
        let simulation =
            self.orchestrator.rerun(&stored, sim_id, &catalog).await?;
        Ok(LaunchResponse {
            config_id,
            sim_id,
            message: format!(
                "Restarting simulation {sim_id} of configuration {config_id}"
            ),
            simulation,
        })
    }

    pub async fn simulations(
        &self,
        config_id: ConfigId,
    ) -> Result<Vec<SimulationRecord>, OrchestratorError> {
        self.stored(config_id).await?;
        Ok(self.orchestrator.list(config_id).await)
    }

    pub async fn simulation(
        &self,
        config_id: ConfigId,
        sim_id: SimId,
    ) -> Result<SimulationRecord, OrchestratorError> {
        self.orchestrator.get(config_id, sim_id).await
    }

    /// Whether `token` may shut the server down.
    pub fn shutdown_permitted(&self, token: Option<&str>) -> bool {
        match &self.shutdown_token {
            None => true,
            Some(expected) => token == Some(expected.as_str()),
        }
    }

    pub fn request_shutdown(&self) {
        info!(self.log, "shutdown requested");
        self.shutdown_tx.send_replace(true);
    }
}
