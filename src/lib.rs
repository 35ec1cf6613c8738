//! The Aladdin datapath engine: parses a dynamic instruction trace into a
//! program graph, runs the fixed optimization pipeline over it, binds its
//! memory operations, and schedules it against a resource-constrained
//! core. See `aladdin-ir`, `aladdin-trace`, `aladdin-passes`, and
//! `aladdin-sched` for the pieces this crate ties together.

use aladdin_ir::binding::MemoryBindingTable;
use aladdin_ir::{ProgramGraph, SourceTable};
use aladdin_passes::PassError;
use aladdin_sched::{AggregateStats, CycleActivity, MemorySubsystem, SchedError, Scheduler, DEFAULT_DEADLOCK_THRESHOLD};
use aladdin_trace::{Config, ConfigError, DddgBuilder, TraceError};
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatapathError {
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pass(#[from] PassError),
    #[error(transparent)]
    Sched(#[from] SchedError),
}

/// Persistent state for one simulation run, reused across benchmarks the
/// way `cranelift_codegen::Context` is reused across function compilations:
/// allocate once, `clear()` between runs instead of rebuilding from
/// scratch.
pub struct Datapath {
    pub table: SourceTable,
    pub graph: ProgramGraph,
    pub bindings: MemoryBindingTable,
    pub config: Config,
    pub activity: Vec<CycleActivity>,
    pub stats: AggregateStats,
}

impl Datapath {
    pub fn new() -> Self {
        Self {
            table: SourceTable::new(),
            graph: ProgramGraph::new(),
            bindings: MemoryBindingTable::new(),
            config: Config::default(),
            activity: Vec::new(),
            stats: AggregateStats::default(),
        }
    }

    pub fn clear(&mut self) {
        self.table = SourceTable::new();
        self.graph.clear();
        self.bindings.clear();
        self.config = Config::default();
        self.activity.clear();
        self.stats = AggregateStats::default();
    }

    /// Parse a trace into `self.graph`, replacing whatever was there.
    pub fn load_trace<R: BufRead>(&mut self, reader: R) -> Result<(), DatapathError> {
        let built = DddgBuilder::new().build_from_reader(reader)?;
        self.table = built.table;
        self.graph = built.graph;
        Ok(())
    }

    pub fn load_config<R: BufRead>(&mut self, reader: R) -> Result<(), DatapathError> {
        self.config = Config::parse(reader)?;
        Ok(())
    }

    /// Run the fixed-order optimization pipeline (§4.4) over `self.graph`,
    /// populating `self.bindings` with the array bindings the memory passes
    /// derive.
    pub fn optimize(&mut self) -> Result<(), DatapathError> {
        aladdin_passes::run_pipeline(&mut self.graph, &self.table, &mut self.bindings, &self.config)?;
        Ok(())
    }

    /// Run the scheduler to completion against `mem`, recording per-cycle
    /// activity and aggregate stats for the reporter.
    pub fn schedule<M: MemorySubsystem>(&mut self, mem: M) -> Result<(), DatapathError> {
        let mut scheduler = Scheduler::new(&mut self.graph, mem, DEFAULT_DEADLOCK_THRESHOLD);
        scheduler.run_to_completion(&mut self.graph, &self.bindings)?;
        self.activity = scheduler.activity;
        self.stats = scheduler.stats;
        Ok(())
    }

    pub fn write_reports(&self, dir: &Path, bench: &str) -> std::io::Result<()> {
        aladdin_sched::Reporter::new(bench).write_all(
            dir,
            &self.activity,
            &self.stats,
            &aladdin_sched::DefaultPowerModel,
        )
    }
}

impl Default for Datapath {
    fn default() -> Self {
        Self::new()
    }
}
