//! The event-driven, resource-constrained scheduler (§4.5).
//!
//! Mirrors the entity-graph style the rest of the workspace uses: state
//! lives in plain structs the caller owns, and `step` is a pure function of
//! that state plus the graph and bindings passed in, not a method on a
//! long-lived borrow of either.

use crate::error::SchedError;
use crate::latency::multicycle_latency;
use crate::memory_interface::MemorySubsystem;
use aladdin_ir::binding::{MemoryBindingTable, MemoryKind};
use aladdin_ir::entities::ArrayId;
use aladdin_ir::{Microop, NodeId, ProgramGraph};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Functional-unit activity observed in one cycle, the input to the
/// reporter's per-cycle CSV (§4.6).
#[derive(Clone, Copy, Debug, Default)]
pub struct CycleActivity {
    pub cycle: u64,
    pub loads: u32,
    pub stores: u32,
    pub dma: u32,
    pub multicycle: u32,
    pub other: u32,
}

/// Run totals the reporter folds into an energy estimate (§4.6).
#[derive(Clone, Copy, Debug, Default)]
pub struct AggregateStats {
    pub total_loads: u64,
    pub total_stores: u64,
    pub total_dma_bytes: u64,
    pub total_multicycle_ops: u64,
}

/// Default cycles of no progress before the scheduler gives up and reports
/// a deadlock (§7).
pub const DEFAULT_DEADLOCK_THRESHOLD: u64 = 10_000;

pub struct Scheduler<M: MemorySubsystem> {
    mem: M,
    executing_queue: VecDeque<NodeId>,
    ready_to_execute_queue: Vec<NodeId>,
    /// Nodes already handed to the external memory interface, so a node
    /// waiting on a multi-cycle DMA/cache round trip is not re-issued every
    /// cycle it sits in the executing queue.
    issued: FxHashSet<NodeId>,
    /// Scratchpad ports consumed this cycle, keyed by (array, partition);
    /// reset at the top of every `step` (§4.5 step 1).
    ports_used: FxHashMap<(ArrayId, u32), u32>,
    current_cycle: u64,
    executed_count: usize,
    total_connected_count: usize,
    deadlock_threshold: u64,
    cycles_since_progress: u64,
    pub activity: Vec<CycleActivity>,
    pub stats: AggregateStats,
}

impl<M: MemorySubsystem> Scheduler<M> {
    /// Seeds the executing queue with every *live* node that has no
    /// unresolved parents (in-degree zero after the pipeline finished
    /// rewriting the graph), and stamps each node's initial `num_parents`.
    /// Nodes a pass isolated via `ProgramGraph::isolate_node` are skipped
    /// entirely rather than inferred from in-degree: isolation already
    /// drops a node's in-degree to zero, which would otherwise make it
    /// indistinguishable from a genuinely ready node.
    pub fn new(graph: &mut ProgramGraph, mem: M, deadlock_threshold: u64) -> Self {
        let mut executing_queue = VecDeque::new();
        let ids: Vec<NodeId> = graph.topological_iteration().collect();
        let mut total_connected_count = 0;
        for id in ids {
            if graph.node(id).removed {
                continue;
            }
            total_connected_count += 1;
            let in_degree = graph.in_degree(id) as u32;
            graph.node_mut(id).sched.num_parents = in_degree;
            if in_degree == 0 {
                executing_queue.push_back(id);
            }
        }
        Self {
            mem,
            executing_queue,
            ready_to_execute_queue: Vec::new(),
            issued: FxHashSet::default(),
            ports_used: FxHashMap::default(),
            current_cycle: 0,
            executed_count: 0,
            total_connected_count,
            deadlock_threshold,
            cycles_since_progress: 0,
            activity: Vec::new(),
            stats: AggregateStats::default(),
        }
    }

    pub fn current_cycle(&self) -> u64 {
        self.current_cycle
    }

    pub fn is_done(&self) -> bool {
        self.executed_count >= self.total_connected_count
    }

    pub fn run_to_completion(
        &mut self,
        graph: &mut ProgramGraph,
        bindings: &MemoryBindingTable,
    ) -> Result<(), SchedError> {
        while !self.is_done() {
            self.step(graph, bindings)?;
        }
        log::debug!(
            "scheduled {} node(s) in {} cycle(s)",
            self.executed_count,
            self.current_cycle
        );
        Ok(())
    }

    /// One scheduler cycle (§4.5 steps 1-5):
    /// 1. Reset per-cycle scratchpad port counters.
    /// 2. Walk the executing queue once, advancing memory ops against port
    ///    budgets and the external interface, and multicycle ops against
    ///    their remaining-latency counter.
    /// 3. Retire every node that finished this cycle, decrementing each
    ///    consumer's parent count and computing its earliest start cycle.
    /// 4. Drain the ready queue of anything now eligible to start.
    /// 5. Advance `current_cycle`.
    pub fn step(
        &mut self,
        graph: &mut ProgramGraph,
        bindings: &MemoryBindingTable,
    ) -> Result<(), SchedError> {
        self.ports_used.clear();

        let externally_done: FxHashSet<NodeId> = self.mem.poll_completed().into_iter().collect();
        if let Some((node, detail)) = self.mem.poll_failed().into_iter().next() {
            return Err(SchedError::ExternalMemoryFailure { node, detail });
        }

        let mut activity = CycleActivity { cycle: self.current_cycle, ..Default::default() };
        let mut completed_this_cycle = Vec::new();
        let mut still_executing = VecDeque::new();

        for node_id in std::mem::take(&mut self.executing_queue) {
            graph.node_mut(node_id).sched.execution_cycle.get_or_insert(self.current_cycle);

            let op = graph.node(node_id).microop;
            let complete = if op.is_memory_op() {
                self.step_memory_op(graph, bindings, node_id, &externally_done)
            } else if op.is_multicycle() {
                step_multicycle_op(graph, node_id, self.current_cycle)
            } else {
                true
            };

            if complete {
                record_activity(&mut activity, &mut self.stats, op);
                completed_this_cycle.push(node_id);
            } else {
                still_executing.push_back(node_id);
            }
        }
        self.executing_queue = still_executing;
        self.activity.push(activity);

        for node_id in &completed_this_cycle {
            graph.node_mut(*node_id).sched.complete_execution_cycle = Some(self.current_cycle);
            self.executed_count += 1;

            let outs = graph.out_edges(*node_id).to_vec();
            for (consumer, kind) in outs {
                let next_time =
                    if kind.is_same_cycle() { self.current_cycle } else { self.current_cycle + 1 };
                let cnode = graph.node_mut(consumer);
                cnode.sched.num_parents = cnode.sched.num_parents.saturating_sub(1);
                cnode.sched.time_before_execution = cnode.sched.time_before_execution.max(next_time);
                if cnode.sched.num_parents == 0 {
                    if cnode.sched.time_before_execution <= self.current_cycle {
                        self.executing_queue.push_back(consumer);
                    } else {
                        self.ready_to_execute_queue.push(consumer);
                    }
                }
            }
        }

        if completed_this_cycle.is_empty() {
            self.cycles_since_progress += 1;
            if self.cycles_since_progress >= self.deadlock_threshold {
                let sample: Vec<(NodeId, Microop)> = self
                    .executing_queue
                    .iter()
                    .copied()
                    .take(8)
                    .map(|id| (id, graph.node(id).microop))
                    .collect();
                return Err(SchedError::Deadlock {
                    cycle: self.current_cycle,
                    idle_cycles: self.cycles_since_progress,
                    stuck: self.executing_queue.len(),
                    sample,
                });
            }
        } else {
            self.cycles_since_progress = 0;
        }

        let next_cycle = self.current_cycle + 1;
        let mut still_ready = Vec::new();
        for node in std::mem::take(&mut self.ready_to_execute_queue) {
            if graph.node(node).sched.time_before_execution <= next_cycle {
                self.executing_queue.push_back(node);
            } else {
                still_ready.push(node);
            }
        }
        self.ready_to_execute_queue = still_ready;

        self.current_cycle = next_cycle;
        Ok(())
    }

    /// Advances one memory-op node by one cycle. `Register`-bound (or
    /// unbound) accesses always retire immediately; `Scratchpad` accesses
    /// compete for the array's port budget; `Cache`/`Dma` accesses are
    /// handed to the external interface exactly once and then wait for
    /// `poll_completed` to report them done.
    fn step_memory_op(
        &mut self,
        graph: &ProgramGraph,
        bindings: &MemoryBindingTable,
        node_id: NodeId,
        externally_done: &FxHashSet<NodeId>,
    ) -> bool {
        let node = graph.node(node_id);
        let array = node.array_label;
        let partition = node.partition_index.unwrap_or(0);
        let mem_access = node.mem_access;
        let is_load = node.microop.is_load();
        let is_dma_op = node.microop.is_dma();

        let binding = array.and_then(|a| bindings.get(a));
        match binding.map(|b| b.kind) {
            None | Some(MemoryKind::Register) => true,
            Some(MemoryKind::Scratchpad) => {
                let ports = binding.map(|b| b.num_ports).unwrap_or(1).max(1);
                let key = (array.expect("scratchpad binding implies an array label"), partition);
                let used = self.ports_used.entry(key).or_insert(0);
                if *used < ports {
                    *used += 1;
                    true
                } else {
                    false
                }
            }
            Some(MemoryKind::Cache) | Some(MemoryKind::Dma) => {
                if externally_done.contains(&node_id) {
                    true
                } else if self.issued.insert(node_id) {
                    let (vaddr, size_bits, value) =
                        mem_access.map(|m| (m.vaddr, m.size_bits, m.value)).unwrap_or((0, 0, 0));
                    if is_dma_op {
                        self.mem.issue_dma(node_id, vaddr, size_bits, is_load);
                    } else {
                        let t = self.mem.translate(vaddr, size_bits, is_load);
                        self.mem.issue_cache(node_id, vaddr, t.paddr, size_bits, is_load, value);
                    }
                    false
                } else {
                    false
                }
            }
        }
    }
}

/// `execution_cycle` is stamped exactly once, by the caller, the cycle a
/// node first enters the executing queue; comparing it against the current
/// cycle is therefore a reliable "did we just start" check without needing
/// a separate sentinel field.
fn step_multicycle_op(graph: &mut ProgramGraph, node_id: NodeId, current_cycle: u64) -> bool {
    let op = graph.node(node_id).microop;
    let just_started = graph.node(node_id).sched.execution_cycle == Some(current_cycle);
    let sched = &mut graph.node_mut(node_id).sched;
    if just_started {
        sched.remaining_latency = multicycle_latency(op);
        sched.remaining_latency == 0
    } else {
        sched.remaining_latency = sched.remaining_latency.saturating_sub(1);
        sched.remaining_latency == 0
    }
}

fn record_activity(activity: &mut CycleActivity, stats: &mut AggregateStats, op: aladdin_ir::Microop) {
    if op.is_dma() {
        activity.dma += 1;
        stats.total_dma_bytes += 1;
    } else if op.is_load() {
        activity.loads += 1;
        stats.total_loads += 1;
    } else if op.is_store() {
        activity.stores += 1;
        stats.total_stores += 1;
    } else if op.is_multicycle() {
        activity.multicycle += 1;
        stats.total_multicycle_ops += 1;
    } else {
        activity.other += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_interface::mock::FixedLatencyMemory;
    use aladdin_ir::binding::{ArrayBinding, PartitionType};
    use aladdin_ir::entities::{DynamicFunction, EdgeKind, FuncId, LabelId};
    use aladdin_ir::entity::EntityRef;
    use aladdin_ir::{ExecutionNode, MemAccess, Microop};

    struct NoMemory;
    impl MemorySubsystem for NoMemory {
        fn issue_dma(&mut self, _: NodeId, _: u64, _: u32, _: bool) {}
        fn issue_cache(&mut self, _: NodeId, _: u64, _: u64, _: u32, _: bool, _: u64) {}
        fn translate(&mut self, vaddr: u64, _: u32, _: bool) -> crate::memory_interface::Translation {
            crate::memory_interface::Translation { paddr: vaddr, hit_latency: 1 }
        }
        fn poll_completed(&mut self) -> Vec<NodeId> {
            Vec::new()
        }
        fn poll_failed(&mut self) -> Vec<(NodeId, String)> {
            Vec::new()
        }
    }

    fn df() -> DynamicFunction {
        DynamicFunction { func: FuncId::new(0), invocation: 0 }
    }

    #[test]
    fn independent_chain_completes_and_respects_edge_ordering() {
        let mut g = ProgramGraph::new();
        let load_a = g.add_node(ExecutionNode::new(Microop::Load, df(), LabelId::new(0)));
        let load_b = g.add_node(ExecutionNode::new(Microop::Load, df(), LabelId::new(1)));
        let add = g.add_node(ExecutionNode::new(Microop::IAdd, df(), LabelId::new(2)));
        g.add_edge(load_a, add, EdgeKind::Operand(1));
        g.add_edge(load_b, add, EdgeKind::Operand(2));

        let bindings = MemoryBindingTable::new();
        let mut sched = Scheduler::new(&mut g, NoMemory, DEFAULT_DEADLOCK_THRESHOLD);
        sched.run_to_completion(&mut g, &bindings).unwrap();

        let add_complete = g.node(add).sched.complete_execution_cycle.unwrap();
        let load_complete = g.node(load_a).sched.complete_execution_cycle.unwrap();
        assert!(add_complete > load_complete);
    }

    #[test]
    fn scratchpad_port_budget_serializes_contending_accesses() {
        let mut g = ProgramGraph::new();
        let mut table = aladdin_ir::SourceTable::new();
        let arr = table.intern_array("a");

        let mut bindings = MemoryBindingTable::new();
        bindings
            .insert(ArrayBinding::new(arr, MemoryKind::Scratchpad, PartitionType::Cyclic, 1, 4, 64, 1, 0).unwrap());

        let mut n1 = ExecutionNode::new(Microop::Load, df(), LabelId::new(0));
        n1.array_label = Some(arr);
        n1.partition_index = Some(0);
        n1.mem_access = Some(MemAccess { vaddr: 0, size_bits: 32, value: 0, is_float: false });
        let n1 = g.add_node(n1);

        let mut n2 = ExecutionNode::new(Microop::Load, df(), LabelId::new(1));
        n2.array_label = Some(arr);
        n2.partition_index = Some(0);
        n2.mem_access = Some(MemAccess { vaddr: 4, size_bits: 32, value: 0, is_float: false });
        let n2 = g.add_node(n2);

        let mut sched = Scheduler::new(&mut g, NoMemory, DEFAULT_DEADLOCK_THRESHOLD);
        sched.run_to_completion(&mut g, &bindings).unwrap();

        let c1 = g.node(n1).sched.complete_execution_cycle.unwrap();
        let c2 = g.node(n2).sched.complete_execution_cycle.unwrap();
        assert_ne!(c1, c2, "single-port scratchpad must not retire both accesses the same cycle");
    }

    #[test]
    fn dma_node_waits_for_external_interface_before_retiring() {
        let mut g = ProgramGraph::new();
        let mut table = aladdin_ir::SourceTable::new();
        let arr = table.intern_array("buf");
        let mut bindings = MemoryBindingTable::new();
        bindings.insert(ArrayBinding::new(arr, MemoryKind::Dma, PartitionType::Block, 1, 4, 64, 1, 0).unwrap());

        let mut dma = ExecutionNode::new(Microop::DmaLoad, df(), LabelId::new(0));
        dma.array_label = Some(arr);
        dma.mem_access = Some(MemAccess { vaddr: 0, size_bits: 512, value: 0, is_float: false });
        let dma = g.add_node(dma);

        let mut sched = Scheduler::new(&mut g, FixedLatencyMemory::new(3), DEFAULT_DEADLOCK_THRESHOLD);
        sched.run_to_completion(&mut g, &bindings).unwrap();

        assert!(g.node(dma).sched.complete_execution_cycle.unwrap() >= 3);
    }

    #[test]
    fn multicycle_op_occupies_its_full_latency() {
        let mut g = ProgramGraph::new();
        let mul = g.add_node(ExecutionNode::new(Microop::IMul, df(), LabelId::new(0)));
        let bindings = MemoryBindingTable::new();
        let mut sched = Scheduler::new(&mut g, NoMemory, DEFAULT_DEADLOCK_THRESHOLD);
        sched.run_to_completion(&mut g, &bindings).unwrap();

        let started = g.node(mul).sched.execution_cycle.unwrap();
        let completed = g.node(mul).sched.complete_execution_cycle.unwrap();
        assert_eq!(completed - started, multicycle_latency(Microop::IMul) as u64);
    }

    #[test]
    fn unresolvable_dependency_reports_deadlock() {
        let mut g = ProgramGraph::new();
        let a = g.add_node(ExecutionNode::new(Microop::IAdd, df(), LabelId::new(0)));
        let b = g.add_node(ExecutionNode::new(Microop::IAdd, df(), LabelId::new(1)));
        g.add_edge(a, b, EdgeKind::Operand(1));

        let bindings = MemoryBindingTable::new();
        let mut sched = Scheduler::new(&mut g, NoMemory, 5);
        // Sever the edge after the scheduler has already recorded `b`'s
        // in-degree as 1; nothing will ever decrement it now.
        g.remove_edge(a, b);

        let err = sched.run_to_completion(&mut g, &bindings).unwrap_err();
        assert!(matches!(err, SchedError::Deadlock { .. }));
    }
}
