//! Pass 2: `memoryAmbiguation` (§4.4).
//!
//! The builder already serializes stores to a literal same runtime vaddr
//! (§4.1 step 4). What is left for this pass is the conservative case: a
//! store whose address is *computed* from a load (an indirect write, e.g.
//! `a[idx[i]] = ...`) cannot be proven to alias or not alias another such
//! store, so successive indirect stores targeting the same array are
//! serialized with a `MEMORY_EDGE` regardless of their concrete runtime
//! addresses.

use aladdin_ir::entities::{ArrayId, EdgeKind};
use aladdin_ir::{Microop, NodeId, ProgramGraph};
use rustc_hash::{FxHashMap, FxHashSet};

pub fn run(graph: &mut ProgramGraph) {
    let mut by_array: FxHashMap<ArrayId, Vec<NodeId>> = FxHashMap::default();

    for (id, node) in graph.nodes_iter() {
        if !node.microop.is_store() {
            continue;
        }
        if let Some(array) = nearest_gep_array(graph, id) {
            if gep_depends_on_load(graph, nearest_gep(graph, id).unwrap()) {
                by_array.entry(array).or_default().push(id);
            }
        }
    }

    for stores in by_array.values() {
        for pair in stores.windows(2) {
            graph.add_edge(pair[0], pair[1], EdgeKind::Memory);
        }
    }
}

fn nearest_gep(graph: &ProgramGraph, from: NodeId) -> Option<NodeId> {
    for &(src, kind) in graph.in_edges(from) {
        if matches!(kind, EdgeKind::Operand(_)) && graph.node(src).microop == Microop::GetElementPtr {
            return Some(src);
        }
    }
    None
}

fn nearest_gep_array(graph: &ProgramGraph, from: NodeId) -> Option<ArrayId> {
    nearest_gep(graph, from).and_then(|gep| graph.node(gep).array_label)
}

/// Bounded walk through address-computation ancestors (`GetElementPtr`,
/// `IAdd`/`IndexAdd` index arithmetic) looking for a `Load` feeding the
/// address: the signature of an indirect write.
fn gep_depends_on_load(graph: &ProgramGraph, gep: NodeId) -> bool {
    let mut stack = vec![gep];
    let mut seen = FxHashSet::default();
    while let Some(n) = stack.pop() {
        if !seen.insert(n) {
            continue;
        }
        for &(src, kind) in graph.in_edges(n) {
            if !matches!(kind, EdgeKind::Operand(_)) {
                continue;
            }
            let op = graph.node(src).microop;
            if op.is_load() {
                return true;
            }
            if matches!(op, Microop::GetElementPtr | Microop::IAdd | Microop::IndexAdd) {
                stack.push(src);
            }
        }
    }
    false
}
