//! Data model for the Aladdin datapath engine: the source-entity table, the
//! execution node, the program graph, and memory bindings (spec.md §3).
//!
//! This crate has no I/O of its own; `aladdin-trace` builds a
//! [`graph::ProgramGraph`] from a trace, `aladdin-passes` rewrites it in
//! place, and `aladdin-sched` schedules it.

pub mod binding;
pub mod entities;
pub mod entity;
pub mod error;
pub mod graph;
pub mod microop;
pub mod node;
pub mod source_table;

pub use binding::{ArrayBinding, MemoryBindingTable, MemoryKind, PartitionType};
pub use entities::{ArrayId, BlockId, DynamicFunction, DynamicVariable, EdgeKind, FuncId, LabelId, NodeId, VarId};
pub use error::GraphError;
pub use graph::{LoopBound, ProgramGraph};
pub use microop::{MemIntrinsic, Microop, SpecialMath};
pub use node::{ExecutionNode, MemAccess, SchedState};
pub use source_table::SourceTable;
