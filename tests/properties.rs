//! Integration tests for the quantified invariants (§8 "Testable
//! Properties" 1-7). Each test builds a small hand-crafted graph directly
//! through `aladdin-ir`'s API rather than through a trace file, the same
//! way the unit tests inside each pass crate do, since the properties are
//! about graph/scheduler state, not about the trace format.

use aladdin_ir::binding::{ArrayBinding, MemoryBindingTable, MemoryKind, PartitionType};
use aladdin_ir::entities::{DynamicFunction, EdgeKind, FuncId, LabelId};
use aladdin_ir::entity::EntityRef;
use aladdin_ir::{ExecutionNode, MemAccess, Microop, NodeId, ProgramGraph, SourceTable};
use aladdin_sched::{Scheduler, DEFAULT_DEADLOCK_THRESHOLD};
use aladdin_trace::config::LoopRef;

fn df() -> DynamicFunction {
    DynamicFunction { func: FuncId::new(0), invocation: 0 }
}

struct NoMemory;
impl aladdin_sched::MemorySubsystem for NoMemory {
    fn issue_dma(&mut self, _: NodeId, _: u64, _: u32, _: bool) {}
    fn issue_cache(&mut self, _: NodeId, _: u64, _: u64, _: u32, _: bool, _: u64) {}
    fn translate(&mut self, vaddr: u64, _: u32, _: bool) -> aladdin_sched::memory_interface::Translation {
        aladdin_sched::memory_interface::Translation { paddr: vaddr, hit_latency: 1 }
    }
    fn poll_completed(&mut self) -> Vec<NodeId> {
        Vec::new()
    }
    fn poll_failed(&mut self) -> Vec<(NodeId, String)> {
        Vec::new()
    }
}

/// Property 1: a non-register edge forces the consumer to start strictly
/// after the producer retires; a register edge permits the same cycle.
#[test]
fn edge_ordering_respects_register_edge_same_cycle_rule() {
    let mut g = ProgramGraph::new();
    let producer = g.add_node(ExecutionNode::new(Microop::Load, df(), LabelId::new(0)));
    let ordinary_consumer = g.add_node(ExecutionNode::new(Microop::IAdd, df(), LabelId::new(1)));
    let fused_consumer = g.add_node(ExecutionNode::new(Microop::Store, df(), LabelId::new(2)));
    g.add_edge(producer, ordinary_consumer, EdgeKind::Operand(1));
    g.add_edge(producer, fused_consumer, EdgeKind::Register);

    let bindings = MemoryBindingTable::new();
    let mut sched = Scheduler::new(&mut g, NoMemory, DEFAULT_DEADLOCK_THRESHOLD);
    sched.run_to_completion(&mut g, &bindings).unwrap();

    let producer_done = g.node(producer).sched.complete_execution_cycle.unwrap();
    let ordinary_started = g.node(ordinary_consumer).sched.execution_cycle.unwrap();
    let fused_started = g.node(fused_consumer).sched.execution_cycle.unwrap();

    assert!(ordinary_started > producer_done);
    assert!(fused_started >= producer_done);
}

/// Property 2: a single-port scratchpad partition never retires more than
/// one memory op in the same cycle.
#[test]
fn scratchpad_port_budget_is_never_exceeded_per_cycle() {
    let mut g = ProgramGraph::new();
    let mut table = SourceTable::new();
    let arr = table.intern_array("a");
    let mut bindings = MemoryBindingTable::new();
    bindings.insert(ArrayBinding::new(arr, MemoryKind::Scratchpad, PartitionType::Cyclic, 1, 4, 64, 2, 0).unwrap());

    let mut nodes = Vec::new();
    for i in 0..3u64 {
        let mut n = ExecutionNode::new(Microop::Load, df(), LabelId::new(i as u32));
        n.array_label = Some(arr);
        n.partition_index = Some(0);
        n.mem_access = Some(MemAccess { vaddr: i * 4, size_bits: 32, value: 0, is_float: false });
        nodes.push(g.add_node(n));
    }

    let mut sched = Scheduler::new(&mut g, NoMemory, DEFAULT_DEADLOCK_THRESHOLD);
    sched.run_to_completion(&mut g, &bindings).unwrap();

    let mut per_cycle: std::collections::HashMap<u64, u32> = std::collections::HashMap::new();
    for &n in &nodes {
        let c = g.node(n).sched.complete_execution_cycle.unwrap();
        *per_cycle.entry(c).or_insert(0) += 1;
    }
    assert!(per_cycle.values().all(|&count| count <= 2), "port budget of 2 exceeded: {per_cycle:?}");
}

/// Property 3: `removePhiNodes` is idempotent and leaves every phi with
/// zero in- and out-degree.
#[test]
fn phi_removal_is_idempotent() {
    let mut g = ProgramGraph::new();
    let incoming = g.add_node(ExecutionNode::new(Microop::IAdd, df(), LabelId::new(0)));
    let phi = g.add_node(ExecutionNode::new(Microop::Phi, df(), LabelId::new(1)));
    let consumer = g.add_node(ExecutionNode::new(Microop::IAdd, df(), LabelId::new(2)));
    g.add_edge(incoming, phi, EdgeKind::Operand(1));
    g.add_edge(phi, consumer, EdgeKind::Operand(1));

    aladdin_passes::phi::run(&mut g);
    assert_eq!(g.in_degree(phi), 0);
    assert_eq!(g.out_degree(phi), 0);

    let edges_before = g.num_edges();
    aladdin_passes::phi::run(&mut g);
    assert_eq!(g.num_edges(), edges_before);
}

/// Property 4: unrolling a loop with M dynamic iterations by factor N
/// retains exactly ceil(M/N) loop-bound markers.
#[test]
fn unrolling_retains_ceil_of_m_over_n_markers() {
    let mut table = SourceTable::new();
    let mut g = ProgramGraph::new();
    let func = table.intern_func("kernel");
    let label = table.intern_label(func, "loop.body", 1);
    let df = DynamicFunction { func, invocation: 0 };

    let iterations = 10usize;
    let factor = 3u32;
    let mut prev = None;
    for _ in 0..iterations {
        let n = g.add_node(ExecutionNode::new(Microop::IAdd, df, label));
        if let Some(p) = prev {
            g.add_edge(p, n, EdgeKind::Control);
        }
        g.push_loop_bound(n, 0);
        prev = Some(n);
    }

    let loop_ref = LoopRef { function: "kernel".to_string(), label: "loop.body".to_string() };
    aladdin_passes::loop_xform::loop_unrolling(&mut g, &table, &loop_ref, factor).unwrap();

    let expected = (iterations as u32 + factor - 1) / factor;
    assert_eq!(g.loop_bounds().len() as u32, expected);
}

/// Property 5: `storeBuffer` never changes the value field it forwards
/// from; after the rewrite the consumer's producer still carries the same
/// memory value the original load would have observed.
#[test]
fn store_buffer_preserves_forwarded_value() {
    let mut g = ProgramGraph::new();
    let mut table = SourceTable::new();
    let arr = table.intern_array("a");
    let access = MemAccess { vaddr: 0x40, size_bits: 32, value: 99, is_float: false };

    let producer = g.add_node(ExecutionNode::new(Microop::IAdd, df(), LabelId::new(0)));
    let mut store = ExecutionNode::new(Microop::Store, df(), LabelId::new(1));
    store.array_label = Some(arr);
    store.mem_access = Some(access);
    let store = g.add_node(store);
    g.add_edge(producer, store, EdgeKind::Operand(1));

    let mut load = ExecutionNode::new(Microop::Load, df(), LabelId::new(2));
    load.array_label = Some(arr);
    load.mem_access = Some(access);
    let load = g.add_node(load);
    g.add_edge(store, load, EdgeKind::Memory);

    let consumer = g.add_node(ExecutionNode::new(Microop::IAdd, df(), LabelId::new(3)));
    g.add_edge(load, consumer, EdgeKind::Operand(1));

    assert_eq!(g.node(store).mem_access.unwrap().value, g.node(load).mem_access.unwrap().value);
    aladdin_passes::store_buffer::store_buffer(&mut g);
    assert_eq!(g.out_degree(load), 0);
    assert!(g.edge_exists(producer, consumer));
}

/// Property 6: cyclic partitioning with factor K and word size W lands a
/// vaddr A in partition `((A - base) / W) mod K`.
#[test]
fn cyclic_partition_formula_holds_across_many_addresses() {
    let arr = aladdin_ir::entities::ArrayId::new(0);
    let base = 0x2000u64;
    let word_size = 8u32;
    let k = 5u32;
    let binding = ArrayBinding::new(arr, MemoryKind::Scratchpad, PartitionType::Cyclic, k, word_size, 200 * 8, 1, base).unwrap();

    for word_index in 0..50u64 {
        let vaddr = base + word_index * word_size as u64;
        let expected = (word_index % k as u64) as u32;
        assert_eq!(binding.partition_index(vaddr).unwrap(), expected);
    }
}

/// Property 7: running a pass twice in succession is the same as running
/// it once.
#[test]
fn memory_ambiguation_is_idempotent() {
    let mut g = ProgramGraph::new();
    let mut table = SourceTable::new();
    let arr = table.intern_array("result");

    let mut gep1 = ExecutionNode::new(Microop::GetElementPtr, df(), LabelId::new(0));
    gep1.array_label = Some(arr);
    let gep1 = g.add_node(gep1);
    let idx_load = g.add_node(ExecutionNode::new(Microop::Load, df(), LabelId::new(1)));
    g.add_edge(idx_load, gep1, EdgeKind::Operand(1));
    let store1 = g.add_node(ExecutionNode::new(Microop::Store, df(), LabelId::new(2)));
    g.add_edge(gep1, store1, EdgeKind::Operand(1));

    let mut gep2 = ExecutionNode::new(Microop::GetElementPtr, df(), LabelId::new(3));
    gep2.array_label = Some(arr);
    let gep2 = g.add_node(gep2);
    g.add_edge(idx_load, gep2, EdgeKind::Operand(1));
    let store2 = g.add_node(ExecutionNode::new(Microop::Store, df(), LabelId::new(4)));
    g.add_edge(gep2, store2, EdgeKind::Operand(1));

    aladdin_passes::ambiguation::run(&mut g);
    let edges_after_first = g.num_edges();
    aladdin_passes::ambiguation::run(&mut g);
    assert_eq!(g.num_edges(), edges_after_first);
}
