// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP entrypoint functions for the gEMA server

use crate::ServerContext;
use dropshot::endpoint;
use dropshot::ApiDescription;
use dropshot::ApiDescriptionRegisterError;
use dropshot::HttpError;
use dropshot::HttpResponseOk;
use dropshot::Path;
use dropshot::RequestContext;
use dropshot::UntypedBody;
use gema_types::catalog::CatalogSnapshot;
use gema_types::config::ConfigId;
use gema_types::config::ConfigureResponse;
use gema_types::config::StoredConfig;
use gema_types::simulation::LaunchResponse;
use gema_types::simulation::SimId;
use gema_types::simulation::SimulationRecord;
use http::StatusCode;
use schemars::JsonSchema;
use serde::Deserialize;
use slog::info;
use slog::warn;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Header carrying the shutdown token, when one is configured.
pub const SHUTDOWN_TOKEN_HEADER: &str = "x-gema-shutdown-token";

type GemaApiDescription = ApiDescription<Arc<ServerContext>>;

/// Returns a description of the gEMA API
pub fn api() -> GemaApiDescription {
    fn register_endpoints(
        api: &mut GemaApiDescription,
    ) -> Result<(), ApiDescriptionRegisterError> {
        api.register(help)?;
        api.register(config_options)?;
        api.register(config_saved)?;
        api.register(simulation_configure)?;
        api.register(simulation_run)?;
        api.register(simulation_list)?;
        api.register(simulation_get)?;
        api.register(simulation_rerun)?;
        api.register(shutdown)?;
        Ok(())
    }

    let mut api = GemaApiDescription::new();
    if let Err(err) = register_endpoints(&mut api) {
        panic!("failed to register entrypoints: {}", err);
    }
    api
}

const ENDPOINTS: &[(&str, &str)] = &[
    (
        "GET /help",
        "Displays available endpoints (another method on a listed path \
         answers 405)",
    ),
    ("GET /config/options", "Get configuration options"),
    ("GET /config/saved", "Get saved configurations"),
    (
        "PUT /simulation/{config_id}/configure",
        "Submit a simulation configuration (an empty body regenerates it)",
    ),
    ("PUT /simulation/{config_id}/run", "Run a simulation of a configuration"),
    (
        "GET /simulation/{config_id}/sims",
        "List the simulations of a configuration",
    ),
    ("GET /simulation/{config_id}/sims/{sim_id}", "Get one simulation"),
    (
        "PUT /simulation/{config_id}/sims/{sim_id}/run",
        "Run a finished simulation again",
    ),
    ("PUT /shutdown", "Shutdown the server"),
];

#[derive(Deserialize, JsonSchema)]
struct PathConfig {
    config_id: ConfigId,
}

#[derive(Deserialize, JsonSchema)]
struct PathSimulation {
    config_id: ConfigId,
    sim_id: SimId,
}

/// List the available endpoints.
#[endpoint {
    method = GET,
    path = "/help",
}]
async fn help(
    _rqctx: RequestContext<Arc<ServerContext>>,
) -> Result<HttpResponseOk<BTreeMap<String, String>>, HttpError> {
    Ok(HttpResponseOk(
        ENDPOINTS
            .iter()
            .map(|(endpoint, description)| {
                (endpoint.to_string(), description.to_string())
            })
            .collect(),
    ))
}

/// Get the configuration options the engine supports, per board.
#[endpoint {
    method = GET,
    path = "/config/options",
}]
async fn config_options(
    rqctx: RequestContext<Arc<ServerContext>>,
) -> Result<HttpResponseOk<CatalogSnapshot>, HttpError> {
    let apictx = rqctx.context();
    let snapshot = apictx.options().await.map_err(|err| {
        warn!(rqctx.log, "option catalog unavailable"; "error" => %err);
        HttpError::from(err)
    })?;
    Ok(HttpResponseOk(snapshot))
}

/// Get all saved configurations.
#[endpoint {
    method = GET,
    path = "/config/saved",
}]
async fn config_saved(
    rqctx: RequestContext<Arc<ServerContext>>,
) -> Result<HttpResponseOk<Vec<StoredConfig>>, HttpError> {
    Ok(HttpResponseOk(rqctx.context().saved().await))
}

/// Create or replace a configuration.
///
/// The body is a `SimulationConfig`. An empty body regenerates an existing
/// configuration from its previous payload.
#[endpoint {
    method = PUT,
    path = "/simulation/{config_id}/configure",
}]
async fn simulation_configure(
    rqctx: RequestContext<Arc<ServerContext>>,
    path: Path<PathConfig>,
    body: UntypedBody,
) -> Result<HttpResponseOk<ConfigureResponse>, HttpError> {
    let config_id = path.into_inner().config_id;
    let response = rqctx
        .context()
        .configure(config_id, body.as_bytes())
        .await
        .map_err(|err| {
            warn!(
                rqctx.log, "configuration rejected";
                "config_id" => config_id,
                "error" => %err,
            );
            HttpError::from(err)
        })?;
    Ok(HttpResponseOk(response))
}

/// Start a new simulation of a configuration.
///
/// Returns as soon as the engine has been started; poll the simulation for
/// its outcome.
#[endpoint {
    method = PUT,
    path = "/simulation/{config_id}/run",
}]
async fn simulation_run(
    rqctx: RequestContext<Arc<ServerContext>>,
    path: Path<PathConfig>,
) -> Result<HttpResponseOk<LaunchResponse>, HttpError> {
    let config_id = path.into_inner().config_id;
    let response = rqctx.context().run(config_id).await?;
    Ok(HttpResponseOk(response))
}

/// List the simulations of a configuration.
#[endpoint {
    method = GET,
    path = "/simulation/{config_id}/sims",
}]
async fn simulation_list(
    rqctx: RequestContext<Arc<ServerContext>>,
    path: Path<PathConfig>,
) -> Result<HttpResponseOk<Vec<SimulationRecord>>, HttpError> {
    let config_id = path.into_inner().config_id;
    Ok(HttpResponseOk(rqctx.context().simulations(config_id).await?))
}

/// Get one simulation.
#[endpoint {
    method = GET,
    path = "/simulation/{config_id}/sims/{sim_id}",
}]
async fn simulation_get(
    rqctx: RequestContext<Arc<ServerContext>>,
    path: Path<PathSimulation>,
) -> Result<HttpResponseOk<SimulationRecord>, HttpError> {
    let PathSimulation { config_id, sim_id } = path.into_inner();
    Ok(HttpResponseOk(rqctx.context().simulation(config_id, sim_id).await?))
}

/// Run a finished simulation again.
///
/// The simulation keeps its id; its log is replaced.
#[endpoint {
    method = PUT,
    path = "/simulation/{config_id}/sims/{sim_id}/run",
}]
async fn simulation_rerun(
    rqctx: RequestContext<Arc<ServerContext>>,
    path: Path<PathSimulation>,
) -> Result<HttpResponseOk<LaunchResponse>, HttpError> {
    let PathSimulation { config_id, sim_id } = path.into_inner();
    let response = rqctx.context().rerun(config_id, sim_id).await?;
    Ok(HttpResponseOk(response))
}

/// Shut the server down.
///
/// Simulations already running are left to finish on their own.
#[endpoint {
    method = PUT,
    path = "/shutdown",
}]
async fn shutdown(
    rqctx: RequestContext<Arc<ServerContext>>,
) -> Result<HttpResponseOk<String>, HttpError> {
    let apictx = rqctx.context();
    let token = rqctx
        .request
        .headers()
        .get(SHUTDOWN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if !apictx.shutdown_permitted(token) {
        warn!(rqctx.log, "refusing shutdown request with bad token");
        return Err(HttpError::for_client_error(
            Some("Forbidden".to_string()),
            StatusCode::FORBIDDEN,
            "missing or incorrect shutdown token".to_string(),
        ));
    }
    info!(rqctx.log, "shutting down at client request");
    apictx.request_shutdown();
    Ok(HttpResponseOk("Shutting down server".to_string()))
}
