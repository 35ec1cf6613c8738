//! Optional ALAP (as-late-as-possible) re-scheduling pass (§5 supplemented
//! feature): a second, reporting-only walk that computes how much slack
//! each node had relative to when it could have started without pushing
//! the schedule's overall completion cycle later. It never changes
//! `complete_execution_cycle`; it only annotates.

use aladdin_ir::{Microop, NodeId, ProgramGraph};
use rustc_hash::FxHashMap;

/// Slack per node: `alap_cycle - node.sched.complete_execution_cycle`. A
/// node with zero slack sits on the schedule's critical path.
pub fn compute_alap(graph: &ProgramGraph) -> FxHashMap<NodeId, i64> {
    let alap_cycle = compute_alap_cycles(graph);
    let mut slack = FxHashMap::default();
    for (id, node) in graph.nodes_iter() {
        let Some(actual) = node.sched.complete_execution_cycle else { continue };
        let Some(&bound) = alap_cycle.get(&id) else { continue };
        slack.insert(id, bound as i64 - actual as i64);
    }
    slack
}

/// Walks the graph in reverse topological order, assigning each node the
/// latest cycle it could complete by without delaying any consumer past
/// its own ALAP bound. Branches and memory ops are excluded: their
/// completion time is dictated by control flow and port/DMA contention,
/// not by slack against a consumer (§4.5, §5).
fn compute_alap_cycles(graph: &ProgramGraph) -> FxHashMap<NodeId, u64> {
    let max_cycle = graph
        .nodes_iter()
        .filter_map(|(_, n)| n.sched.complete_execution_cycle)
        .max()
        .unwrap_or(0);

    let mut bound: FxHashMap<NodeId, u64> = FxHashMap::default();
    let order: Vec<NodeId> = graph.topological_iteration().collect();
    for &id in order.iter().rev() {
        let node = graph.node(id);
        if node.microop.is_memory_op() || matches!(node.microop, Microop::Br) {
            continue;
        }
        let latency = crate::latency::multicycle_latency(node.microop).max(1) as u64;

        let earliest_consumer_bound = graph
            .out_edges(id)
            .iter()
            .filter_map(|(consumer, _)| {
                bound
                    .get(consumer)
                    .copied()
                    .or_else(|| graph.node(*consumer).sched.complete_execution_cycle)
            })
            .min();

        let b = match earliest_consumer_bound {
            Some(c) => c.saturating_sub(latency),
            None => max_cycle,
        };
        bound.insert(id, b);
    }
    bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use aladdin_ir::entities::{DynamicFunction, EdgeKind, FuncId, LabelId};
    use aladdin_ir::entity::EntityRef;
    use aladdin_ir::ExecutionNode;

    fn df() -> DynamicFunction {
        DynamicFunction { func: FuncId::new(0), invocation: 0 }
    }

    #[test]
    fn node_on_critical_path_has_zero_slack() {
        let mut g = ProgramGraph::new();
        let a = g.add_node(ExecutionNode::new(Microop::IAdd, df(), LabelId::new(0)));
        let b = g.add_node(ExecutionNode::new(Microop::IAdd, df(), LabelId::new(1)));
        g.add_edge(a, b, EdgeKind::Operand(1));
        g.node_mut(a).sched.complete_execution_cycle = Some(0);
        g.node_mut(b).sched.complete_execution_cycle = Some(1);

        let slack = compute_alap(&g);
        assert_eq!(slack[&b], 0);
        assert_eq!(slack[&a], 0);
    }
}
