//! The execution node: one record per dynamic instruction (§3 "Execution
//! Node").

use crate::entities::{ArrayId, DynamicFunction, LabelId, VarId};
use crate::microop::Microop;

/// A memory access attached to a node whose microop is `Load`, `Store`,
/// `DMALoad`, or `DMAStore`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MemAccess {
    pub vaddr: u64,
    pub size_bits: u32,
    pub value: u64,
    pub is_float: bool,
}

/// Per-node scheduling state (§5 "Scheduler"). Reset to its initial form
/// only by `Datapath::clear`; passes must not mutate it — only the
/// scheduler does, and only after the pipeline has finished rewriting the
/// graph.
#[derive(Clone, Debug, Default)]
pub struct SchedState {
    /// Count of in-edges whose source has not yet completed.
    pub num_parents: u32,
    /// Earliest cycle this node is allowed to start, given its parents.
    pub time_before_execution: u64,
    /// Cycle in which execution started (first cycle occupied).
    pub execution_cycle: Option<u64>,
    /// Cycle in which execution finished (node retires at the end of this
    /// cycle; consumers may start at `complete_execution_cycle + 1`, or at
    /// `complete_execution_cycle` across a `REGISTER_EDGE`).
    pub complete_execution_cycle: Option<u64>,
    /// Remaining latency for a multicycle functional unit, set on first
    /// encounter in the executing queue.
    pub remaining_latency: u32,
}

/// One record per dynamic instruction (§3).
#[derive(Clone, Debug)]
pub struct ExecutionNode {
    pub microop: Microop,
    /// Uniquely identifies the static source location across all dynamic
    /// invocations: `(DynamicFunction, instruction-label)`.
    pub dynamic_function: DynamicFunction,
    pub instruction_label: LabelId,
    /// The "source variable" this node's result (if any) is assigned to.
    pub source_var: Option<VarId>,
    pub mem_access: Option<MemAccess>,
    pub array_label: Option<ArrayId>,
    pub partition_index: Option<u32>,
    pub loop_depth: u32,
    /// Set by the builder for an `IAdd` whose result register also feeds
    /// itself as an operand (the `i = i + step` accumulation shape).
    /// `removeInductionDependence` rewrites these to `IndexAdd`.
    pub is_induction: bool,
    /// Set by `ProgramGraph::isolate_node`. A removed node keeps its arena
    /// slot (existing `NodeId`s stay valid) but is logically deleted: the
    /// scheduler must not enumerate, execute, or count it.
    pub removed: bool,
    pub sched: SchedState,
}

impl ExecutionNode {
    pub fn new(
        microop: Microop,
        dynamic_function: DynamicFunction,
        instruction_label: LabelId,
    ) -> Self {
        Self {
            microop,
            dynamic_function,
            instruction_label,
            source_var: None,
            mem_access: None,
            array_label: None,
            partition_index: None,
            loop_depth: 0,
            is_induction: false,
            removed: false,
            sched: SchedState::default(),
        }
    }

    /// The `dynamic_instruction` string documented by §8's AES scenario,
    /// e.g. `aes256_encrypt_ecb-0-call`: `<function>-<invocation>-<label>`.
    pub fn dynamic_instruction_string(&self, table: &crate::source_table::SourceTable) -> String {
        format!(
            "{}-{}-{}",
            table.func_name(self.dynamic_function.func),
            self.dynamic_function.invocation,
            table.label_name(self.instruction_label),
        )
    }
}
