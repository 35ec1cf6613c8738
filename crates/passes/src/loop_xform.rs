//! Passes 7, 8, and 14: `loopFlatten`, `loopUnrolling`, and
//! `loopPipelining`/`perLoopPipelining` (§4.4). All three resolve a config
//! `(function, label)` reference to the loop-bound markers the builder
//! pushed for it (§3 "Loop-bound marker sequence") and rewrite the
//! `CONTROL_EDGE`s around those markers.

use crate::error::PassError;
use aladdin_ir::entities::EdgeKind;
use aladdin_ir::{NodeId, ProgramGraph, SourceTable};
use aladdin_trace::config::LoopRef;
use rustc_hash::FxHashSet;

fn resolve(graph: &ProgramGraph, table: &SourceTable, loop_ref: &LoopRef, pass: &'static str) -> Result<Vec<NodeId>, PassError> {
    let func = table.lookup_func(&loop_ref.function).ok_or_else(|| PassError::UnknownLoopLabel {
        pass,
        function: loop_ref.function.clone(),
        label: loop_ref.label.clone(),
    })?;
    let markers: Vec<NodeId> = graph
        .loop_bounds()
        .iter()
        .filter(|lb| {
            let node = graph.node(lb.node);
            node.dynamic_function.func == func && table.label_name(node.instruction_label) == loop_ref.label
        })
        .map(|lb| lb.node)
        .collect();
    if markers.is_empty() {
        return Err(PassError::UnknownLoopLabel {
            pass,
            function: loop_ref.function.clone(),
            label: loop_ref.label.clone(),
        });
    }
    Ok(markers)
}

fn remove_control_parents(graph: &mut ProgramGraph, node: NodeId) {
    let parents: Vec<NodeId> = graph
        .in_edges(node)
        .iter()
        .filter(|(_, kind)| matches!(kind, EdgeKind::Control))
        .map(|(src, _)| *src)
        .collect();
    for p in parents {
        graph.remove_edge(p, node);
    }
}

/// Pass 7: drop the per-iteration back-edges and loop-bound markers for a
/// loop marked "flatten", letting the body's straight-line data edges carry
/// all remaining ordering.
pub fn loop_flatten(graph: &mut ProgramGraph, table: &SourceTable, loop_ref: &LoopRef) -> Result<(), PassError> {
    let markers = resolve(graph, table, loop_ref, "loopFlatten")?;
    for &m in &markers {
        remove_control_parents(graph, m);
    }
    let marker_set: FxHashSet<NodeId> = markers.into_iter().collect();
    graph.loop_bounds_mut().retain(|lb| !marker_set.contains(&lb.node));
    Ok(())
}

/// Pass 8: keep every `factor`-th loop-bound marker as an iteration
/// boundary; isolate the intermediate markers' control dependence so their
/// iterations can issue in parallel, then chain the retained boundaries in
/// order.
pub fn loop_unrolling(graph: &mut ProgramGraph, table: &SourceTable, loop_ref: &LoopRef, factor: u32) -> Result<(), PassError> {
    let markers = resolve(graph, table, loop_ref, "loopUnrolling")?;
    if factor <= 1 {
        return Ok(());
    }
    let mut retained = Vec::new();
    for chunk in markers.chunks(factor as usize) {
        for &m in &chunk[..chunk.len().saturating_sub(1)] {
            remove_control_parents(graph, m);
        }
        if let Some(&last) = chunk.last() {
            retained.push(last);
        }
    }
    for w in retained.windows(2) {
        graph.add_edge(w[0], w[1], EdgeKind::Control);
    }
    let retained_set: FxHashSet<NodeId> = retained.into_iter().collect();
    graph.loop_bounds_mut().retain(|lb| retained_set.contains(&lb.node));
    Ok(())
}

/// Pass 14: chain successive iteration boundaries with a single
/// `CONTROL_EDGE` rather than each iteration fully gating the next, letting
/// the scheduler overlap iterations as far as data dependences allow.
pub fn loop_pipelining(graph: &mut ProgramGraph, table: &SourceTable, loop_ref: &LoopRef) -> Result<(), PassError> {
    let markers = resolve(graph, table, loop_ref, "loopPipelining")?;
    for &m in &markers {
        remove_control_parents(graph, m);
    }
    for w in markers.windows(2) {
        graph.add_edge(w[0], w[1], EdgeKind::Control);
    }
    Ok(())
}
