// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery of the configuration options the engine supports.
//!
//! The catalog is built from an engine descriptor: the class names the engine
//! offers and the constructor parameters of each. The descriptor is either
//! compiled in or read from a JSON file the engine emits, e.g.:
//!
//! ```json
//! {
//!     "boards": { "SimpleBoard": ["clk_freq", "processor", "memory", "cache_hierarchy"] },
//!     "processors": { "SimpleProcessor": ["cpu_type", "num_cores", "isa"] },
//!     "isas": ["x86", "riscv"],
//!     "cpu_types": ["atomic", "timing", "o3"],
//!     "memory": {
//!         "single_channel": ["SingleChannelDDR3_1600"],
//!         "multi_channel": ["DualChannelDDR4_2400"]
//!     },
//!     "cache_hierarchies": { "NoCache": [] }
//! }
//! ```
//!
//! Entries this server cannot drive are skipped with a warning rather than
//! failing the whole request.

use crate::config::CatalogSource;
use crate::engine::BoardKind;
use crate::engine::CacheKind;
use crate::engine::CpuType;
use crate::engine::Isa;
use crate::error::CatalogError;
use gema_types::catalog::BoardOptions;
use gema_types::catalog::CatalogSnapshot;
use gema_types::catalog::ProcessorOptions;
use serde_json::Value;
use slog::warn;
use slog::Logger;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::IntoEnumIterator;

const BOARD_PARAMS: &[&str] =
    &["clk_freq", "processor", "memory", "cache_hierarchy"];

const SINGLE_CHANNEL_MEMORY: &[&str] = &[
    "SingleChannelDDR3_1600",
    "SingleChannelDDR3_2133",
    "SingleChannelDDR4_2400",
    "SingleChannelHBM",
    "SingleChannelLPDDR3_1600",
];

const MULTI_CHANNEL_MEMORY: &[&str] = &[
    "DualChannelDDR3_1600",
    "DualChannelDDR3_2133",
    "DualChannelDDR4_2400",
    "DualChannelLPDDR3_1600",
    "HBM2Stack",
];

/// Class names and constructor parameters, as the engine reports them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct EngineDescriptor {
    boards: BTreeMap<BoardKind, Vec<String>>,
    processors: BTreeMap<String, Vec<String>>,
    isas: Vec<Isa>,
    cpu_types: Vec<CpuType>,
    memory: Vec<String>,
    cache_hierarchies: BTreeMap<CacheKind, Vec<String>>,
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl EngineDescriptor {
    /// The registry compiled into this server, mirroring the constructor
    /// signatures of the gem5 standard library components.
    fn builtin() -> Self {
        let boards = BoardKind::iter()
            .map(|kind| {
                let mut params = strings(BOARD_PARAMS);
                if kind == BoardKind::ArmBoard {
                    params.extend(strings(&["platform", "release"]));
                }
                (kind, params)
            })
            .collect();

        let processors = BTreeMap::from([(
            "SimpleProcessor".to_string(),
            strings(&["cpu_type", "num_cores", "isa"]),
        )]);

        let cache_hierarchies = CacheKind::iter()
            .map(|kind| {
                let params: &[&str] = match kind {
                    CacheKind::NoCache => &[],
                    CacheKind::PrivateL1CacheHierarchy => {
                        &["l1d_size", "l1i_size", "membus"]
                    }
                    CacheKind::PrivateL1PrivateL2CacheHierarchy => {
                        &["l1d_size", "l1i_size", "l2_size", "membus"]
                    }
                    CacheKind::PrivateL1SharedL2CacheHierarchy => &[
                        "l1d_size",
                        "l1i_size",
                        "l2_size",
                        "l1d_assoc",
                        "l1i_assoc",
                        "l2_assoc",
                    ],
                };
                (kind, strings(params))
            })
            .collect();

        let mut memory = strings(SINGLE_CHANNEL_MEMORY);
        memory.extend(strings(MULTI_CHANNEL_MEMORY));

        EngineDescriptor {
            boards,
            processors,
            isas: Isa::iter().collect(),
            cpu_types: CpuType::iter().collect(),
            memory,
            cache_hierarchies,
        }
    }

    /// Interprets a descriptor emitted by the engine, dropping any entry that
    /// is malformed or names something this server does not support.
    fn from_json(value: &Value, log: &Logger) -> Self {
        let mut descriptor = EngineDescriptor::default();

        for (name, params) in object_entries(value, "boards", log) {
            let Ok(kind) = BoardKind::from_str(name) else {
                warn!(log, "skipping unsupported board"; "board" => name);
                continue;
            };
            if let Some(params) = param_list(params, "board", name, log) {
                descriptor.boards.insert(kind, params);
            }
        }

        for (name, params) in object_entries(value, "processors", log) {
            if let Some(params) = param_list(params, "processor", name, log) {
                descriptor.processors.insert(name.clone(), params);
            }
        }

        descriptor.isas = enum_list(value, "isas", log);
        descriptor.cpu_types = enum_list(value, "cpu_types", log);

        for channels in ["single_channel", "multi_channel"] {
            match value.get("memory").and_then(|m| m.get(channels)) {
                Some(list) => match string_list(list) {
                    Some(names) => descriptor.memory.extend(names),
                    None => warn!(
                        log,
                        "skipping malformed memory list";
                        "list" => channels,
                    ),
                },
                None => {
                    warn!(log, "descriptor has no memory list"; "list" => channels)
                }
            }
        }

        for (name, params) in object_entries(value, "cache_hierarchies", log) {
            let Ok(kind) = CacheKind::from_str(name) else {
                warn!(
                    log,
                    "skipping unsupported cache hierarchy";
                    "cache_hierarchy" => name,
                );
                continue;
            };
            if let Some(params) =
                param_list(params, "cache hierarchy", name, log)
            {
                descriptor.cache_hierarchies.insert(kind, params);
            }
        }

        descriptor
    }

    fn snapshot(&self) -> CatalogSnapshot {
        let cpu: Vec<String> =
            self.cpu_types.iter().map(|c| c.to_string()).collect();
        let cache_hierarchy: BTreeMap<String, Vec<String>> = self
            .cache_hierarchies
            .iter()
            .map(|(kind, params)| (kind.to_string(), params.clone()))
            .collect();

        let boards = self
            .boards
            .iter()
            .map(|(kind, params)| {
                // A board hardwired to one ISA only offers that one.
                let isa = self
                    .isas
                    .iter()
                    .filter(|isa| {
                        kind.required_isa().map_or(true, |req| req == **isa)
                    })
                    .map(|isa| isa.to_string())
                    .collect();
                let options = BoardOptions {
                    board: params.clone(),
                    processor: ProcessorOptions {
                        types: self.processors.clone(),
                        isa,
                        cpu: cpu.clone(),
                    },
                    memory: self.memory.clone(),
                    cache_hierarchy: cache_hierarchy.clone(),
                };
                (kind.to_string(), options)
            })
            .collect();

        CatalogSnapshot { boards }
    }
}

fn object_entries<'a>(
    value: &'a Value,
    section: &'static str,
    log: &Logger,
) -> Vec<(&'a String, &'a Value)> {
    match value.get(section) {
        Some(Value::Object(map)) => map.iter().collect(),
        Some(_) => {
            warn!(log, "skipping malformed descriptor section"; "section" => section);
            Vec::new()
        }
        None => {
            warn!(log, "descriptor section missing"; "section" => section);
            Vec::new()
        }
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn param_list(
    value: &Value,
    what: &'static str,
    name: &str,
    log: &Logger,
) -> Option<Vec<String>> {
    let params = string_list(value);
    if params.is_none() {
        warn!(
            log,
            "skipping entry with malformed parameter list";
            "kind" => what,
            "name" => name,
        );
    }
    params
}

fn enum_list<T: FromStr + Ord>(
    value: &Value,
    section: &'static str,
    log: &Logger,
) -> Vec<T> {
    let Some(names) = value.get(section).and_then(string_list) else {
        warn!(log, "skipping missing or malformed list"; "section" => section);
        return Vec::new();
    };
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        match T::from_str(&name) {
            Ok(v) => out.push(v),
            Err(_) => warn!(
                log,
                "skipping unsupported entry";
                "section" => section,
                "name" => name,
            ),
        }
    }
    out.sort();
    out.dedup();
    out
}

/// The options offered by the registry compiled into this server.
pub fn builtin_snapshot() -> CatalogSnapshot {
    EngineDescriptor::builtin().snapshot()
}

/// Read-only view of the options the engine offers.
pub struct OptionCatalog {
    source: CatalogSource,
    log: Logger,
}

impl OptionCatalog {
    pub fn new(source: CatalogSource, log: &Logger) -> Self {
        OptionCatalog {
            source,
            log: log.new(slog::o!("component" => "OptionCatalog")),
        }
    }

    /// Builds a fresh snapshot. A file source is re-read every time.
    pub async fn snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        let descriptor = match &self.source {
            CatalogSource::Builtin => return Ok(builtin_snapshot()),
            CatalogSource::File { path } => {
                let contents =
                    tokio::fs::read_to_string(path).await.map_err(|err| {
                        CatalogError::Unreadable { path: path.clone(), err }
                    })?;
                let value: Value =
                    serde_json::from_str(&contents).map_err(|err| {
                        CatalogError::Parse { path: path.clone(), err }
                    })?;
                EngineDescriptor::from_json(
                    &value,
                    &self.log.new(slog::o!("descriptor" => path.to_string())),
                )
            }
        };
        Ok(descriptor.snapshot())
    }
}
