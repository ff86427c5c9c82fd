// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;

/// Options the engine offers for one board family.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema,
)]
pub struct BoardOptions {
    /// Constructor parameters of the board itself.
    pub board: Vec<String>,
    pub processor: ProcessorOptions,
    /// Memory system names, single- and multi-channel.
    pub memory: Vec<String>,
    /// Cache hierarchy variants and their constructor parameters.
    pub cache_hierarchy: BTreeMap<String, Vec<String>>,
}

#[derive(
    Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema,
)]
pub struct ProcessorOptions {
    /// Processor classes and their constructor parameters.
    pub types: BTreeMap<String, Vec<String>>,
    pub isa: Vec<String>,
    pub cpu: Vec<String>,
}

/// Everything a client may put in a configuration, keyed by board family.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema,
)]
pub struct CatalogSnapshot {
    pub boards: BTreeMap<String, BoardOptions>,
}

impl CatalogSnapshot {
    pub fn board(&self, name: &str) -> Option<&BoardOptions> {
        self.boards.get(name)
    }
}
