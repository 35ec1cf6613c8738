//! Pass 4: `initBaseAddress` (§4.3).
//!
//! Every memory node inherits its array label from the nearest
//! `GetElementPtr` ancestor reachable through register edges only. The
//! builder already tags `GetElementPtr` nodes with the array named by their
//! own result register (see `aladdin_trace::builder`); this pass propagates
//! that label onto the `Load`/`Store` nodes that actually touch memory.

use aladdin_ir::entities::{ArrayId, EdgeKind};
use aladdin_ir::{NodeId, ProgramGraph};
use rustc_hash::FxHashSet;

pub fn run(graph: &mut ProgramGraph) {
    let mem_nodes: Vec<NodeId> = graph
        .nodes_iter()
        .filter(|(_, n)| n.microop.is_memory_op() && n.array_label.is_none())
        .map(|(id, _)| id)
        .collect();

    for id in mem_nodes {
        if let Some(array) = nearest_labeled_ancestor(graph, id) {
            graph.node_mut(id).array_label = Some(array);
        }
    }
}

fn nearest_labeled_ancestor(graph: &ProgramGraph, from: NodeId) -> Option<ArrayId> {
    let mut stack: Vec<NodeId> = graph
        .in_edges(from)
        .iter()
        .filter(|(_, kind)| matches!(kind, EdgeKind::Operand(_)))
        .map(|(src, _)| *src)
        .collect();
    let mut seen = FxHashSet::default();

    while let Some(n) = stack.pop() {
        if !seen.insert(n) {
            continue;
        }
        if let Some(array) = graph.node(n).array_label {
            return Some(array);
        }
        stack.extend(
            graph
                .in_edges(n)
                .iter()
                .filter(|(_, kind)| matches!(kind, EdgeKind::Operand(_)))
                .map(|(src, _)| *src),
        );
    }
    None
}
