// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::ConfigId;
use chrono::DateTime;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Identifier of a simulation, unique within its configuration.
pub type SimId = u32;

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum SimulationState {
    /// The run has been recorded but its worker is not started yet.
    Pending,
    /// The worker process is running.
    Running,
    /// The worker exited successfully.
    Completed,
    /// The worker could not be started or exited unsuccessfully.
    Failed,
}

impl SimulationState {
    /// Returns true if a worker for this simulation may still be alive.
    pub fn is_active(&self) -> bool {
        matches!(self, SimulationState::Pending | SimulationState::Running)
    }
}

/// How a worker process ended.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct SimulationExit {
    /// Process exit code; absent if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Final tick reported by the engine.
    pub tick: Option<u64>,
    /// Exit cause reported by the engine.
    pub cause: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct SimulationRecord {
    pub sim_id: SimId,
    pub config_id: ConfigId,
    /// When this run was (last) requested.
    pub generated_on: DateTime<Utc>,
    /// Where the engine's output for this run is written.
    pub log_path: String,
    pub pid: Option<u32>,
    pub status: SimulationState,
    pub exit: Option<SimulationExit>,
    /// Why the worker could not be started, if it could not.
    pub failure: Option<String>,
}

/// Acknowledgement for a launch request. The run proceeds in the background.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct LaunchResponse {
    pub config_id: ConfigId,
    pub sim_id: SimId,
    pub message: String,
    pub simulation: SimulationRecord,
}
