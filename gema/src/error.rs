// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error handling facilities for the gEMA server.

use camino::Utf8PathBuf;
use dropshot::HttpError;
use gema_types::config::ConfigId;
use gema_types::simulation::SimId;
use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration {config_id} does not exist and no payload was given")]
    InvalidInput { config_id: ConfigId },
    #[error("configuration {config_id} not found")]
    NotFound { config_id: ConfigId },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("unsupported {option}: {value:?}")]
    UnsupportedOption { option: &'static str, value: String },
    #[error("incomplete configuration: missing {field}")]
    IncompleteConfiguration { field: &'static str },
    #[error("invalid resource kind {0:?} (expected \"default\" or \"custom\")")]
    InvalidResourceKind(String),
}

impl MaterializeError {
    /// Name of the variant, used as the HTTP error code.
    pub fn code(&self) -> &'static str {
        match self {
            MaterializeError::UnsupportedOption { .. } => "UnsupportedOption",
            MaterializeError::IncompleteConfiguration { .. } => {
                "IncompleteConfiguration"
            }
            MaterializeError::InvalidResourceKind(_) => "InvalidResourceKind",
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("engine descriptor \"{path}\" is unreadable: {err}")]
    Unreadable {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("engine descriptor \"{path}\" is not valid JSON: {err}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("configuration {config_id} not found")]
    ConfigNotFound { config_id: ConfigId },
    #[error("simulation {sim_id} of configuration {config_id} not found")]
    SimulationNotFound { config_id: ConfigId, sim_id: SimId },
    #[error(
        "simulation {sim_id} of configuration {config_id} is still running"
    )]
    SimulationBusy { config_id: ConfigId, sim_id: SimId },
    #[error("materializing configuration {config_id}: {err}")]
    Materialize {
        config_id: ConfigId,
        #[source]
        err: MaterializeError,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("failed to start \"{program}\": {err}")]
    Spawn {
        program: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("writing \"{path}\": {err}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
}

/// Why a configure request was rejected. Every case is a server error.
#[derive(Debug, Error)]
pub enum ConfigureError {
    #[error("malformed configuration body: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// A 500 that, unlike `HttpError::for_internal_error`, shows the client why.
fn server_error(error_code: &str, message: String) -> HttpError {
    HttpError {
        status_code: StatusCode::INTERNAL_SERVER_ERROR,
        error_code: Some(error_code.to_string()),
        external_message: message.clone(),
        internal_message: message,
    }
}

impl From<StoreError> for HttpError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => HttpError::for_not_found(
                Some("NotFound".to_string()),
                err.to_string(),
            ),
            StoreError::InvalidInput { .. } => {
                server_error("InvalidInput", err.to_string())
            }
        }
    }
}

impl From<MaterializeError> for HttpError {
    fn from(err: MaterializeError) -> Self {
        server_error(err.code(), err.to_string())
    }
}

impl From<CatalogError> for HttpError {
    fn from(err: CatalogError) -> Self {
        server_error("CatalogUnavailable", err.to_string())
    }
}

impl From<ConfigureError> for HttpError {
    fn from(err: ConfigureError) -> Self {
        match err {
            ConfigureError::Malformed(_) => {
                server_error("InvalidInput", err.to_string())
            }
            ConfigureError::Store(err) => err.into(),
            ConfigureError::Materialize(err) => err.into(),
            ConfigureError::Catalog(err) => err.into(),
        }
    }
}

impl From<OrchestratorError> for HttpError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::ConfigNotFound { .. }
            | OrchestratorError::SimulationNotFound { .. } => {
                HttpError::for_not_found(
                    Some("NotFound".to_string()),
                    err.to_string(),
                )
            }
            OrchestratorError::SimulationBusy { .. } => {
                HttpError::for_client_error(
                    Some("SimulationBusy".to_string()),
                    StatusCode::CONFLICT,
                    err.to_string(),
                )
            }
            OrchestratorError::Materialize { err: ref inner, .. } => {
                server_error(inner.code(), err.to_string())
            }
            OrchestratorError::Catalog(err) => err.into(),
            OrchestratorError::Spawn { .. } | OrchestratorError::Io { .. } => {
                server_error("OrchestratorError", err.to_string())
            }
        }
    }
}
