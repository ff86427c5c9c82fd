// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces for parsing configuration files and working with a gEMA server
//! configuration

use camino::Utf8Path;
use camino::Utf8PathBuf;
use dropshot::ConfigDropshot;
use dropshot::ConfigLogging;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Configuration for a gEMA server
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Dropshot configuration for the API server.
    pub dropshot: ConfigDropshot,
    /// Server-wide logging configuration.
    pub log: ConfigLogging,
    /// How to start the simulation engine for a run.
    pub engine: EngineConfig,
    /// Directory that receives per-simulation logs and board descriptions.
    pub output_dir: Utf8PathBuf,
    /// Where the option catalog comes from.
    #[serde(default)]
    pub catalog: CatalogSource,
    #[serde(default)]
    pub control: ControlConfig,
}

impl Config {
    /// Load a `Config` from the given TOML file
    ///
    /// This config object can then be used to create a new gEMA server.
    pub fn from_file<P: AsRef<Utf8Path>>(path: P) -> Result<Config, LoadError> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|err| LoadError::Io { path: path.into(), err })?;
        let config_parsed: Config = toml::from_str(&file_contents)
            .map_err(|err| LoadError::Parse { path: path.into(), err })?;
        Ok(config_parsed)
    }
}

/// The engine command line for a run.
///
/// The path of the materialized board description is appended as the final
/// argument. The engine's stdout and stderr become the run's log.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EngineConfig {
    pub program: Utf8PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CatalogSource {
    /// Use the registry compiled into this server.
    #[default]
    Builtin,
    /// Read the engine's descriptor from a JSON file on every request.
    File { path: Utf8PathBuf },
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ControlConfig {
    /// If set, `PUT /shutdown` must carry this value in the
    /// `x-gema-shutdown-token` header.
    pub shutdown_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("error reading \"{path}\": {err}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("error parsing \"{path}\": {err}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
}
