// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Launching and tracking simulation runs.
//!
//! Every run is a separate engine process. The orchestrator records the pid
//! as soon as the process exists, hands the child to a background task and
//! returns; that task folds the exit status back into the run's record once
//! the engine is done.

use crate::config::EngineConfig;
use crate::engine::EngineBoard;
use crate::engine::ExitReport;
use crate::error::OrchestratorError;
use crate::materialize::materialize;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use chrono::Utc;
use gema_types::catalog::CatalogSnapshot;
use gema_types::config::ConfigId;
use gema_types::config::StoredConfig;
use gema_types::simulation::SimId;
use gema_types::simulation::SimulationExit;
use gema_types::simulation::SimulationRecord;
use gema_types::simulation::SimulationState;
use slog::error;
use slog::info;
use slog::o;
use slog::warn;
use slog::Logger;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io::SeekFrom;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncSeekExt;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::Mutex;

/// Returns the smallest positive id not in `used`.
pub fn lowest_free_id(used: impl IntoIterator<Item = SimId>) -> SimId {
    let used: BTreeSet<SimId> = used.into_iter().collect();
    let mut id = 1;
    while used.contains(&id) {
        id += 1;
    }
    id
}

struct SimEntry {
    record: SimulationRecord,
    // Identifies the most recent launch of this simulation, so that a
    // superseded worker cannot overwrite its successor's outcome.
    generation: u64,
}

#[derive(Default)]
struct SimTable {
    runs: BTreeMap<(ConfigId, SimId), SimEntry>,
    next_generation: u64,
}

impl SimTable {
    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// The id the next run of `config_id` receives.
    fn allocate_id(&self, config_id: ConfigId) -> SimId {
        lowest_free_id(
            self.runs
                .range((config_id, SimId::MIN)..=(config_id, SimId::MAX))
                .map(|((_, sim_id), _)| *sim_id),
        )
    }

    /// Applies `f` to the record if it still belongs to launch `generation`.
    fn update<F>(
        &mut self,
        key: (ConfigId, SimId),
        generation: u64,
        f: F,
    ) -> Option<SimulationRecord>
    where
        F: FnOnce(&mut SimulationRecord),
    {
        let entry = self.runs.get_mut(&key)?;
        if entry.generation != generation {
            return None;
        }
        f(&mut entry.record);
        Some(entry.record.clone())
    }
}

pub struct Orchestrator {
    log: Logger,
    engine: EngineConfig,
    output_dir: Utf8PathBuf,
    sims: Arc<Mutex<SimTable>>,
}

impl Orchestrator {
    pub fn new(
        engine: EngineConfig,
        output_dir: Utf8PathBuf,
        log: &Logger,
    ) -> Self {
        Orchestrator {
            log: log.new(o!("component" => "Orchestrator")),
            engine,
            output_dir,
            sims: Arc::new(Mutex::new(SimTable::default())),
        }
    }

    /// Allocates an id and records a pending run under it, atomically.
    async fn reserve(&self, config_id: ConfigId) -> (SimulationRecord, u64) {
        let mut sims = self.sims.lock().await;
        let sim_id = sims.allocate_id(config_id);
        let generation = sims.bump_generation();
        let record = SimulationRecord {
            sim_id,
            config_id,
            generated_on: Utc::now(),
            log_path: self.log_path(config_id, sim_id).to_string(),
            pid: None,
            status: SimulationState::Pending,
            exit: None,
            failure: None,
        };
        sims.runs.insert(
            (config_id, sim_id),
            SimEntry { record: record.clone(), generation },
        );
        (record, generation)
    }

    /// Starts a new run of `stored`.
    pub async fn start(
        &self,
        stored: &StoredConfig,
        catalog: &CatalogSnapshot,
    ) -> Result<SimulationRecord, OrchestratorError> {
        let config_id = stored.config_id;
        let board = materialize(&stored.config, catalog)
            .map_err(|err| OrchestratorError::Materialize { config_id, err })?;
        let (record, generation) = self.reserve(config_id).await;
        self.launch(&board, record, generation).await
    }

    /// Runs an existing simulation again, replacing its log.
    pub async fn rerun(
        &self,
        stored: &StoredConfig,
        sim_id: SimId,
        catalog: &CatalogSnapshot,
    ) -> Result<SimulationRecord, OrchestratorError> {
        let config_id = stored.config_id;
        let (board, record, generation) = {
            let mut sims = self.sims.lock().await;
            let generation = sims.bump_generation();
            let entry = sims.runs.get_mut(&(config_id, sim_id)).ok_or(
                OrchestratorError::SimulationNotFound { config_id, sim_id },
            )?;
            if entry.record.status.is_active() {
                return Err(OrchestratorError::SimulationBusy {
                    config_id,
                    sim_id,
                });
            }
            let board = materialize(&stored.config, catalog).map_err(
                |err| OrchestratorError::Materialize { config_id, err },
            )?;
            let record = &mut entry.record;
            record.generated_on = Utc::now();
            record.pid = None;
            record.status = SimulationState::Pending;
            record.exit = None;
            record.failure = None;
            entry.generation = generation;
            (board, entry.record.clone(), generation)
        };
        self.launch(&board, record, generation).await
    }

    fn log_path(&self, config_id: ConfigId, sim_id: SimId) -> Utf8PathBuf {
        self.output_dir.join(format!("config_{config_id}_sim_{sim_id}"))
    }

    async fn launch(
        &self,
        board: &EngineBoard,
        record: SimulationRecord,
        generation: u64,
    ) -> Result<SimulationRecord, OrchestratorError> {
        let key = (record.config_id, record.sim_id);
        let log = self.log.new(o!(
            "config_id" => record.config_id,
            "sim_id" => record.sim_id,
        ));

        let child = match self.spawn_engine(board, &record).await {
            Ok(child) => child,
            Err(err) => {
                error!(log, "failed to launch simulation"; "error" => %err);
                let message = err.to_string();
                self.sims.lock().await.update(key, generation, |r| {
                    r.status = SimulationState::Failed;
                    r.failure = Some(message);
                });
                return Err(err);
            }
        };

        let pid = child.id();
        let record = self
            .sims
            .lock()
            .await
            .update(key, generation, |r| {
                r.pid = pid;
                r.status = SimulationState::Running;
            })
            .unwrap_or(record);
        info!(log, "simulation started"; "pid" => ?pid);

        tokio::spawn(monitor(
            Arc::clone(&self.sims),
            log,
            child,
            key,
            generation,
            Utf8PathBuf::from(&record.log_path),
        ));
        Ok(record)
    }

    async fn spawn_engine(
        &self,
        board: &EngineBoard,
        record: &SimulationRecord,
    ) -> Result<Child, OrchestratorError> {
        let io_err = |path: &Utf8Path| {
            let path = path.to_owned();
            move |err: std::io::Error| OrchestratorError::Io { path, err }
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(io_err(&self.output_dir))?;

        let log_path = Utf8PathBuf::from(&record.log_path);
        let board_path = Utf8PathBuf::from(format!("{log_path}.board.json"));
        let contents = serde_json::to_vec_pretty(board)
            .map_err(|err| io_err(&board_path)(err.into()))?;
        tokio::fs::write(&board_path, contents)
            .await
            .map_err(io_err(&board_path))?;

        let stdout = tokio::fs::File::create(&log_path)
            .await
            .map_err(io_err(&log_path))?
            .into_std()
            .await;
        let stderr = stdout.try_clone().map_err(io_err(&log_path))?;

        Command::new(&self.engine.program)
            .args(&self.engine.args)
            .arg(&board_path)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|err| OrchestratorError::Spawn {
                program: self.engine.program.clone(),
                err,
            })
    }

    /// Runs of `config_id`, ordered by id.
    pub async fn list(&self, config_id: ConfigId) -> Vec<SimulationRecord> {
        let sims = self.sims.lock().await;
        sims.runs
            .range((config_id, SimId::MIN)..=(config_id, SimId::MAX))
            .map(|(_, entry)| entry.record.clone())
            .collect()
    }

    pub async fn get(
        &self,
        config_id: ConfigId,
        sim_id: SimId,
    ) -> Result<SimulationRecord, OrchestratorError> {
        self.sims
            .lock()
            .await
            .runs
            .get(&(config_id, sim_id))
            .map(|entry| entry.record.clone())
            .ok_or(OrchestratorError::SimulationNotFound { config_id, sim_id })
    }
}

/// How much of the end of a run's log is searched for the engine's exit line.
const LOG_TAIL_BYTES: u64 = 64 * 1024;

/// Reads at most the last `limit` bytes of `path`, dropping the leading
/// partial line when the file is longer than that.
async fn read_log_tail(
    path: &Utf8Path,
    limit: u64,
) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let start = len.saturating_sub(limit);
    // Start one byte early so a window that begins on a line boundary keeps
    // its first line.
    let from = start.saturating_sub(1);
    file.seek(SeekFrom::Start(from)).await?;
    let mut contents = Vec::new();
    file.take(len - from).read_to_end(&mut contents).await?;

    let mut tail = String::from_utf8_lossy(&contents).into_owned();
    if from < start {
        match tail.find('\n') {
            Some(newline) => {
                tail.drain(..=newline);
            }
            None => tail.clear(),
        }
    }
    Ok(tail)
}

/// Waits for the engine to exit and records how it went.
async fn monitor(
    sims: Arc<Mutex<SimTable>>,
    log: Logger,
    mut child: Child,
    key: (ConfigId, SimId),
    generation: u64,
    log_path: Utf8PathBuf,
) {
    let status = child.wait().await;
    let report = match read_log_tail(&log_path, LOG_TAIL_BYTES).await {
        Ok(tail) => ExitReport::parse_log(&tail),
        Err(err) => {
            warn!(log, "could not read simulation log"; "error" => %err);
            None
        }
    };

    let mut sims = sims.lock().await;
    let updated = sims.update(key, generation, |record| match status {
        Ok(status) => {
            record.status = if status.success() {
                SimulationState::Completed
            } else {
                SimulationState::Failed
            };
            record.exit = Some(SimulationExit {
                exit_code: status.code(),
                tick: report.as_ref().map(|r| r.tick),
                cause: report.map(|r| r.cause),
            });
        }
        Err(err) => {
            record.status = SimulationState::Failed;
            record.failure = Some(format!("waiting for engine: {err}"));
        }
    });

    match updated {
        Some(record) => info!(
            log, "simulation finished";
            "status" => ?record.status,
            "exit" => ?record.exit,
        ),
        None => info!(log, "superseded simulation finished"),
    }
}
