// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declarative simulation configurations as submitted by clients.
//!
//! Every field is optional at this layer. Which fields are actually required
//! depends on the board and cache hierarchy variant chosen, and that is only
//! known when the configuration is materialized against the option catalog.
//! Sizes are plain magnitudes; unit suffixes are never stored.

use chrono::DateTime;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Caller-supplied identifier of a configuration.
pub type ConfigId = u32;

#[derive(
    Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema,
)]
pub struct BoardSpec {
    /// Board family, e.g. `SimpleBoard`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Clock frequency in GHz.
    pub clk: Option<f64>,
}

#[derive(
    Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema,
)]
pub struct ProcessorSpec {
    /// Instruction set, e.g. `x86`.
    pub isa: Option<String>,
    /// Processor class, e.g. `SimpleProcessor`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// CPU model, e.g. `timing`.
    pub cpu: Option<String>,
    pub ncores: Option<u32>,
}

#[derive(
    Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema,
)]
pub struct MemorySpec {
    /// Memory system, e.g. `SingleChannelDDR3_1600`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Size in MB.
    pub size: Option<u64>,
}

#[derive(
    Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema,
)]
pub struct CacheSpec {
    /// Cache hierarchy variant, e.g. `PrivateL1PrivateL2CacheHierarchy`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// L1 data cache size in KiB.
    pub l1d_size: Option<u64>,
    /// L1 instruction cache size in KiB.
    pub l1i_size: Option<u64>,
    /// L2 cache size in KiB.
    pub l2_size: Option<u64>,
    pub l1d_assoc: Option<u32>,
    pub l1i_assoc: Option<u32>,
    pub l2_assoc: Option<u32>,
}

/// The workload attached to a board before it runs.
///
/// Clients send this as a `[kind, reference]` pair. The object forms are
/// accepted as well; `{"name": ...}` names a resource the engine knows how to
/// obtain.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum ResourceSpec {
    Pair(String, String),
    Tagged { kind: String, reference: String },
    Named { name: String },
}

impl ResourceSpec {
    pub const DEFAULT_KIND: &'static str = "default";
    pub const CUSTOM_KIND: &'static str = "custom";

    pub fn kind(&self) -> &str {
        match self {
            ResourceSpec::Pair(kind, _) => kind,
            ResourceSpec::Tagged { kind, .. } => kind,
            ResourceSpec::Named { .. } => Self::DEFAULT_KIND,
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            ResourceSpec::Pair(_, reference) => reference,
            ResourceSpec::Tagged { reference, .. } => reference,
            ResourceSpec::Named { name } => name,
        }
    }
}

/// Body of `PUT /simulation/{config_id}/configure`.
#[derive(
    Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema,
)]
pub struct SimulationConfig {
    #[serde(default)]
    pub board: BoardSpec,
    #[serde(default)]
    pub processor: ProcessorSpec,
    #[serde(default)]
    pub memory: MemorySpec,
    #[serde(default)]
    pub cache: CacheSpec,
    #[serde(default)]
    pub resource: Option<ResourceSpec>,
}

/// A configuration as held by the server.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct StoredConfig {
    pub config_id: ConfigId,
    /// When this configuration was last (re)generated.
    pub generated_on: DateTime<Utc>,
    pub config: SimulationConfig,
}

/// Response to a successful configure request.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ConfigureResponse {
    pub config_id: ConfigId,
    /// Whether an existing configuration was replaced.
    pub replaced: bool,
    pub message: String,
}
