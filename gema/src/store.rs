// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory store of simulation configurations.

use crate::error::StoreError;
use chrono::Utc;
use gema_types::config::ConfigId;
use gema_types::config::SimulationConfig;
use gema_types::config::StoredConfig;
use slog::info;
use slog::Logger;
use tokio::sync::Mutex;

/// Result of a successful save.
#[derive(Clone, Debug)]
pub struct Saved {
    pub config: StoredConfig,
    /// Whether a previous record with the same id was replaced.
    pub replaced: bool,
}

pub struct ConfigStore {
    log: Logger,
    // Kept in insertion order; a replaced record is re-inserted at the end.
    configs: Mutex<Vec<StoredConfig>>,
}

impl ConfigStore {
    pub fn new(log: &Logger) -> Self {
        ConfigStore {
            log: log.new(slog::o!("component" => "ConfigStore")),
            configs: Mutex::new(Vec::new()),
        }
    }

    /// Creates or replaces configuration `config_id`.
    ///
    /// With no payload, an existing record is regenerated from its previous
    /// payload and only its timestamp changes.
    pub async fn save(
        &self,
        config_id: ConfigId,
        payload: Option<SimulationConfig>,
    ) -> Result<Saved, StoreError> {
        self.save_checked(config_id, payload, |_| Ok(())).await
    }

    /// Like [`ConfigStore::save`], but `check` must accept the payload that
    /// is about to be stored. A rejected payload leaves any existing record
    /// untouched.
    pub async fn save_checked<F, E>(
        &self,
        config_id: ConfigId,
        payload: Option<SimulationConfig>,
        check: F,
    ) -> Result<Saved, E>
    where
        F: FnOnce(&SimulationConfig) -> Result<(), E>,
        E: From<StoreError>,
    {
        let mut configs = self.configs.lock().await;
        let existing = configs.iter().position(|c| c.config_id == config_id);

        let config = match (payload, existing) {
            (Some(payload), _) => payload,
            (None, Some(i)) => configs[i].config.clone(),
            (None, None) => {
                return Err(StoreError::InvalidInput { config_id }.into())
            }
        };
        check(&config)?;

        let replaced = match existing {
            Some(i) => {
                configs.remove(i);
                true
            }
            None => false,
        };
        let stored =
            StoredConfig { config_id, generated_on: Utc::now(), config };
        configs.push(stored.clone());

        info!(
            self.log, "saved configuration";
            "config_id" => config_id,
            "replaced" => replaced,
        );
        Ok(Saved { config: stored, replaced })
    }

    pub async fn get(
        &self,
        config_id: ConfigId,
    ) -> Result<StoredConfig, StoreError> {
        self.configs
            .lock()
            .await
            .iter()
            .find(|c| c.config_id == config_id)
            .cloned()
            .ok_or(StoreError::NotFound { config_id })
    }

    pub async fn list(&self) -> Vec<StoredConfig> {
        self.configs.lock().await.clone()
    }
}
