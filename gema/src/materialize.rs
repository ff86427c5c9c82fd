// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resolution of a stored configuration into an engine board description.
//!
//! Symbolic names from the client are matched against the enumerations in
//! [`crate::engine`] and against the option catalog; nothing the client sends
//! is ever interpreted beyond that.

use crate::engine::BoardKind;
use crate::engine::CacheKind;
use crate::engine::CpuType;
use crate::engine::EngineBoard;
use crate::engine::EngineCacheHierarchy;
use crate::engine::EngineMemory;
use crate::engine::EngineProcessor;
use crate::engine::Isa;
use crate::engine::Workload;
use crate::error::MaterializeError;
use gema_types::catalog::CatalogSnapshot;
use gema_types::config::CacheSpec;
use gema_types::config::ResourceSpec;
use gema_types::config::SimulationConfig;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

fn required<T: Clone>(
    value: &Option<T>,
    field: &'static str,
) -> Result<T, MaterializeError> {
    value
        .clone()
        .ok_or(MaterializeError::IncompleteConfiguration { field })
}

/// Like [`required`], but a zero magnitude is rejected as well.
fn required_nonzero<T: Copy + Default + PartialEq + ToString>(
    value: &Option<T>,
    field: &'static str,
) -> Result<T, MaterializeError> {
    let value = required(value, field)?;
    if value == T::default() {
        return Err(unsupported(field, &value.to_string()));
    }
    Ok(value)
}

fn unsupported(option: &'static str, value: &str) -> MaterializeError {
    MaterializeError::UnsupportedOption { option, value: value.to_string() }
}

fn parse_enum<T: FromStr>(
    option: &'static str,
    value: &str,
) -> Result<T, MaterializeError> {
    T::from_str(value).map_err(|_| unsupported(option, value))
}

/// Builds the board the engine will run for `config`.
pub fn materialize(
    config: &SimulationConfig,
    catalog: &CatalogSnapshot,
) -> Result<EngineBoard, MaterializeError> {
    let board_name = required(&config.board.kind, "board.type")?;
    let board: BoardKind = parse_enum("board", &board_name)?;
    let options = catalog
        .board(&board_name)
        .ok_or_else(|| unsupported("board", &board_name))?;
    let clk = required(&config.board.clk, "board.clk")?;
    if !(clk.is_finite() && clk > 0.0) {
        return Err(unsupported("board.clk", &clk.to_string()));
    }

    let processor = {
        let spec = &config.processor;
        let kind = required(&spec.kind, "processor.type")?;
        if !options.processor.types.contains_key(&kind) {
            return Err(unsupported("processor", &kind));
        }
        let cpu_name = required(&spec.cpu, "processor.cpu")?;
        let cpu_type: CpuType = parse_enum("cpu", &cpu_name)?;
        if !options.processor.cpu.iter().any(|c| *c == cpu_type.to_string()) {
            return Err(unsupported("cpu", &cpu_name));
        }
        let isa_name = required(&spec.isa, "processor.isa")?;
        let isa: Isa = parse_enum("isa", &isa_name)?;
        if !options.processor.isa.iter().any(|i| *i == isa.to_string()) {
            return Err(unsupported("isa", &isa_name));
        }
        if board.required_isa().is_some_and(|req| req != isa) {
            return Err(unsupported("isa", &isa_name));
        }
        let num_cores = required_nonzero(&spec.ncores, "processor.ncores")?;
        EngineProcessor { kind, cpu_type, isa, num_cores }
    };

    let memory = {
        let kind = required(&config.memory.kind, "memory.type")?;
        if !options.memory.contains(&kind) {
            return Err(unsupported("memory", &kind));
        }
        let size = required_nonzero(&config.memory.size, "memory.size")?;
        EngineMemory { kind, size: format!("{size}MB") }
    };

    let cache_hierarchy = {
        let name = required(&config.cache.kind, "cache.type")?;
        let kind: CacheKind = parse_enum("cache hierarchy", &name)?;
        let params = options
            .cache_hierarchy
            .get(&name)
            .ok_or_else(|| unsupported("cache hierarchy", &name))?;
        EngineCacheHierarchy {
            kind,
            params: cache_params(&config.cache, params)?,
        }
    };

    let workload = {
        let resource = config.resource.as_ref().ok_or(
            MaterializeError::IncompleteConfiguration { field: "resource" },
        )?;
        let reference = resource.reference().to_string();
        match resource.kind() {
            ResourceSpec::DEFAULT_KIND => Workload::Obtain { resource: reference },
            ResourceSpec::CUSTOM_KIND => Workload::Binary { path: reference },
            other => {
                return Err(MaterializeError::InvalidResourceKind(
                    other.to_string(),
                ))
            }
        }
    };

    Ok(EngineBoard {
        board,
        clk_freq: format!("{clk:?}GHz"),
        processor,
        memory,
        cache_hierarchy,
        workload,
    })
}

/// Picks out exactly the parameters the cache hierarchy declares.
///
/// Declared parameters with no counterpart in the record (such as `membus`)
/// are left for the engine to default.
fn cache_params(
    spec: &CacheSpec,
    declared: &[String],
) -> Result<BTreeMap<String, Value>, MaterializeError> {
    let mut params = BTreeMap::new();
    for name in declared {
        let value = match name.as_str() {
            "l1d_size" => {
                kib(required_nonzero(&spec.l1d_size, "cache.l1d_size")?)
            }
            "l1i_size" => {
                kib(required_nonzero(&spec.l1i_size, "cache.l1i_size")?)
            }
            "l2_size" => kib(required_nonzero(&spec.l2_size, "cache.l2_size")?),
            "l1d_assoc" => Value::from(required_nonzero(
                &spec.l1d_assoc,
                "cache.l1d_assoc",
            )?),
            "l1i_assoc" => Value::from(required_nonzero(
                &spec.l1i_assoc,
                "cache.l1i_assoc",
            )?),
            "l2_assoc" => {
                Value::from(required_nonzero(&spec.l2_assoc, "cache.l2_assoc")?)
            }
            _ => continue,
        };
        params.insert(name.clone(), value);
    }
    Ok(params)
}

fn kib(size: u64) -> Value {
    Value::String(format!("{size}KiB"))
}

/// A configuration every builtin catalog accepts.
#[cfg(test)]
pub(crate) fn example_config() -> SimulationConfig {
    use gema_types::config::BoardSpec;
    use gema_types::config::MemorySpec;
    use gema_types::config::ProcessorSpec;

    SimulationConfig {
        board: BoardSpec { kind: Some("SimpleBoard".to_string()), clk: Some(3.0) },
        processor: ProcessorSpec {
            isa: Some("x86".to_string()),
            kind: Some("SimpleProcessor".to_string()),
            cpu: Some("timing".to_string()),
            ncores: Some(1),
        },
        memory: MemorySpec {
            kind: Some("SingleChannelDDR3_1600".to_string()),
            size: Some(2048),
        },
        cache: CacheSpec {
            kind: Some("PrivateL1PrivateL2CacheHierarchy".to_string()),
            l1d_size: Some(64),
            l1i_size: Some(64),
            l2_size: Some(256),
            ..Default::default()
        },
        resource: Some(ResourceSpec::Pair(
            "default".to_string(),
            "x86-hello64-static".to_string(),
        )),
    }
}
