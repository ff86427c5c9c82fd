// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vocabulary shared with the simulation engine.
//!
//! The enumerations here are the only board, processor and cache hierarchy
//! kinds this server will ever hand to the engine. Client-supplied names are
//! parsed into them (never evaluated), and the option catalog narrows them
//! further to whatever the installed engine reports.

use serde::Serialize;
use std::collections::BTreeMap;
use strum::Display;
use strum::EnumIter;
use strum::EnumString;
use strum::IntoStaticStr;

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
)]
pub enum BoardKind {
    SimpleBoard,
    X86Board,
    ArmBoard,
}

impl BoardKind {
    /// The ISA this board is hardwired to, if any.
    pub fn required_isa(&self) -> Option<Isa> {
        match self {
            BoardKind::SimpleBoard => None,
            BoardKind::X86Board => Some(Isa::X86),
            BoardKind::ArmBoard => Some(Isa::Arm),
        }
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
)]
pub enum CacheKind {
    NoCache,
    PrivateL1CacheHierarchy,
    PrivateL1PrivateL2CacheHierarchy,
    PrivateL1SharedL2CacheHierarchy,
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CpuType {
    Atomic,
    Kvm,
    Minor,
    O3,
    Timing,
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
    Serialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Isa {
    Arm,
    Mips,
    Null,
    Power,
    Riscv,
    Sparc,
    X86,
}

/// A fully resolved board, ready to be handed to the engine.
///
/// This is opaque to everything but the engine: the orchestrator writes it
/// out as JSON and passes the path along without looking inside.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineBoard {
    pub board: BoardKind,
    pub clk_freq: String,
    pub processor: EngineProcessor,
    pub memory: EngineMemory,
    pub cache_hierarchy: EngineCacheHierarchy,
    pub workload: Workload,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineProcessor {
    pub kind: String,
    pub cpu_type: CpuType,
    pub isa: Isa,
    pub num_cores: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineMemory {
    pub kind: String,
    pub size: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineCacheHierarchy {
    pub kind: CacheKind,
    /// Constructor arguments, exactly the subset the variant declares.
    pub params: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Workload {
    /// A resource the engine obtains by name from its resource index.
    Obtain { resource: String },
    /// A binary already present on this host.
    Binary { path: String },
}

/// Final tick and exit cause, as printed by the engine when a run ends:
///
/// ```text
/// Exiting @ tick 5000 because exiting with last active thread context.
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitReport {
    pub tick: u64,
    pub cause: String,
}

const EXIT_LINE_PREFIX: &str = "Exiting @ tick ";
const EXIT_LINE_CAUSE: &str = " because ";

impl ExitReport {
    /// Finds the last exit line in an engine log.
    pub fn parse_log(log: &str) -> Option<ExitReport> {
        log.lines().rev().find_map(Self::parse_line)
    }

    fn parse_line(line: &str) -> Option<ExitReport> {
        let rest = line.trim().strip_prefix(EXIT_LINE_PREFIX)?;
        let (tick, cause) = rest.split_once(EXIT_LINE_CAUSE)?;
        let tick = tick.trim().parse().ok()?;
        let cause = cause.trim().trim_end_matches('.').to_string();
        Some(ExitReport { tick, cause })
    }
}
