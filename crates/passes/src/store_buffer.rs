//! Passes 10 and 11: `storeBuffer` and `removeRepeatedStores` (§4.4).
//!
//! Both model store-to-load forwarding and dead-store elimination within a
//! single pass of node-id order, using the `MEMORY_EDGE` the builder already
//! draws between a store and a same-address load that follows it. Both are
//! scoped to a single unrolled iteration (spec.md §4.4), since the
//! `MEMORY_EDGE` itself carries no iteration information.

use aladdin_ir::entities::{ArrayId, EdgeKind};
use aladdin_ir::{Microop, NodeId, ProgramGraph};
use rustc_hash::{FxHashMap, FxHashSet};

/// Number of loop-bound markers at or before `node` in node-id order. Two
/// nodes with the same bucket are in the same unrolled iteration; crossing
/// a marker bumps every later node's bucket, which is all the iteration
/// tracking these passes need.
fn iteration_bucket(boundaries: &[NodeId], node: NodeId) -> usize {
    boundaries.partition_point(|&b| b <= node)
}

/// Pass 10: a load immediately downstream of a same-address store in the
/// same iteration (via the `MEMORY_EDGE` the builder draws) is isolated;
/// its consumers are rewired to the store's *value* operand producer
/// instead of the load.
pub fn store_buffer(graph: &mut ProgramGraph) {
    let boundaries: Vec<NodeId> = graph.loop_bounds().iter().map(|lb| lb.node).collect();
    let loads: Vec<NodeId> = graph.nodes_iter().filter(|(_, n)| n.microop.is_load()).map(|(id, _)| id).collect();
    let mut rewrites: Vec<(NodeId, NodeId)> = Vec::new();

    for load in loads {
        let forwarding_store = graph.in_edges(load).iter().copied().find(|(src, kind)| {
            matches!(kind, EdgeKind::Memory)
                && graph.node(*src).microop.is_store()
                && iteration_bucket(&boundaries, *src) == iteration_bucket(&boundaries, load)
        });
        let Some((store, _)) = forwarding_store else { continue };

        let value_producer = graph
            .in_edges(store)
            .iter()
            .copied()
            .find(|(src, kind)| matches!(kind, EdgeKind::Operand(_)) && graph.node(*src).microop != Microop::GetElementPtr)
            .map(|(src, _)| src);

        if let Some(producer) = value_producer {
            rewrites.push((load, producer));
        }
    }

    for (load, producer) in rewrites {
        let consumers: Vec<_> = graph.out_edges(load).to_vec();
        graph.isolate_node(load);
        for (consumer, kind) in consumers {
            graph.add_edge(producer, consumer, kind);
        }
    }
}

/// Pass 11: an earlier store to an address that is overwritten by a later
/// store before any intervening load reads it, within the same iteration,
/// is dead; isolate it.
pub fn remove_repeated_stores(graph: &mut ProgramGraph) {
    let boundaries: FxHashSet<NodeId> = graph.loop_bounds().iter().map(|lb| lb.node).collect();
    let mut last_store: FxHashMap<(ArrayId, u64), NodeId> = FxHashMap::default();
    let mut dead: Vec<NodeId> = Vec::new();

    let ids: Vec<NodeId> = graph.nodes_iter().map(|(id, _)| id).collect();
    for id in ids {
        if boundaries.contains(&id) {
            last_store.clear();
        }
        let node = graph.node(id);
        let (array, vaddr) = match (node.array_label, node.mem_access) {
            (Some(a), Some(m)) => (a, m.vaddr),
            _ => continue,
        };
        if node.microop.is_load() {
            last_store.remove(&(array, vaddr));
        } else if node.microop.is_store() {
            if let Some(prev) = last_store.insert((array, vaddr), id) {
                dead.push(prev);
            }
        }
    }

    for d in dead {
        graph.isolate_node(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aladdin_ir::entities::{DynamicFunction, FuncId, LabelId};
    use aladdin_ir::entity::EntityRef;
    use aladdin_ir::{ExecutionNode, MemAccess, SourceTable};

    #[test]
    fn load_after_store_forwards_from_stored_value() {
        let mut g = ProgramGraph::new();
        let mut table = SourceTable::new();
        let df = DynamicFunction { func: FuncId::new(0), invocation: 0 };
        let arr = table.intern_array("a");
        let access = MemAccess { vaddr: 0x200, size_bits: 32, value: 0, is_float: false };

        let value = g.add_node(ExecutionNode::new(Microop::IAdd, df, LabelId::new(0)));
        let mut store = ExecutionNode::new(Microop::Store, df, LabelId::new(1));
        store.array_label = Some(arr);
        store.mem_access = Some(access);
        let store = g.add_node(store);
        g.add_edge(value, store, EdgeKind::Operand(1));

        let mut load = ExecutionNode::new(Microop::Load, df, LabelId::new(2));
        load.array_label = Some(arr);
        load.mem_access = Some(access);
        let load = g.add_node(load);
        g.add_edge(store, load, EdgeKind::Memory);

        let consumer = g.add_node(ExecutionNode::new(Microop::IAdd, df, LabelId::new(3)));
        g.add_edge(load, consumer, EdgeKind::Operand(1));

        store_buffer(&mut g);

        assert_eq!(g.out_degree(load), 0);
        assert!(g.edge_exists(value, consumer));
    }

    #[test]
    fn earlier_unread_store_is_removed() {
        let mut g = ProgramGraph::new();
        let mut table = SourceTable::new();
        let df = DynamicFunction { func: FuncId::new(0), invocation: 0 };
        let arr = table.intern_array("a");
        let access = MemAccess { vaddr: 0x300, size_bits: 32, value: 0, is_float: false };

        let mut s1 = ExecutionNode::new(Microop::Store, df, LabelId::new(0));
        s1.array_label = Some(arr);
        s1.mem_access = Some(access);
        let s1 = g.add_node(s1);

        let mut s2 = ExecutionNode::new(Microop::Store, df, LabelId::new(1));
        s2.array_label = Some(arr);
        s2.mem_access = Some(access);
        let s2 = g.add_node(s2);

        remove_repeated_stores(&mut g);

        assert_eq!(g.out_degree(s1), 0);
        assert_eq!(g.in_degree(s1), 0);
        let _ = s2;
    }

    #[test]
    fn store_in_a_later_iteration_does_not_kill_the_earlier_one() {
        let mut g = ProgramGraph::new();
        let mut table = SourceTable::new();
        let df = DynamicFunction { func: FuncId::new(0), invocation: 0 };
        let arr = table.intern_array("a");
        let access = MemAccess { vaddr: 0x300, size_bits: 32, value: 0, is_float: false };

        let mut s1 = ExecutionNode::new(Microop::Store, df, LabelId::new(0));
        s1.array_label = Some(arr);
        s1.mem_access = Some(access);
        let s1 = g.add_node(s1);

        let marker = g.add_node(ExecutionNode::new(Microop::IAdd, df, LabelId::new(1)));
        g.push_loop_bound(marker, 1);

        let mut s2 = ExecutionNode::new(Microop::Store, df, LabelId::new(2));
        s2.array_label = Some(arr);
        s2.mem_access = Some(access);
        let s2 = g.add_node(s2);

        remove_repeated_stores(&mut g);

        assert!(!g.node(s1).removed);
        assert!(!g.node(s2).removed);
    }
}
