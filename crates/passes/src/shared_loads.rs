//! Pass 9: `removeSharedLoads` (§4.4).
//!
//! Within node-id (execution) order, if a second `Load` reads an address
//! already read by an earlier one with no intervening store, it is
//! isolated and its consumers redirected to the first load. Scoped to a
//! single unrolled iteration (spec.md §4.4): the address map resets at
//! every loop-bound marker, so a later iteration re-reading the same
//! address starts fresh instead of forwarding from a previous iteration.

use aladdin_ir::entities::ArrayId;
use aladdin_ir::{NodeId, ProgramGraph};
use rustc_hash::{FxHashMap, FxHashSet};

pub fn run(graph: &mut ProgramGraph) {
    let boundaries: FxHashSet<NodeId> = graph.loop_bounds().iter().map(|lb| lb.node).collect();
    let mut first_load: FxHashMap<(ArrayId, u64), NodeId> = FxHashMap::default();
    let mut redirects: Vec<(NodeId, NodeId)> = Vec::new();

    let ids: Vec<NodeId> = graph.nodes_iter().map(|(id, _)| id).collect();
    for id in ids {
        if boundaries.contains(&id) {
            first_load.clear();
        }
        let node = graph.node(id);
        let (array, vaddr) = match (node.array_label, node.mem_access) {
            (Some(a), Some(m)) => (a, m.vaddr),
            _ => continue,
        };
        if node.microop.is_store() {
            first_load.remove(&(array, vaddr));
        } else if node.microop.is_load() {
            match first_load.get(&(array, vaddr)) {
                Some(&first) => redirects.push((id, first)),
                None => {
                    first_load.insert((array, vaddr), id);
                }
            }
        }
    }

    for (dead, keep) in redirects {
        let consumers: Vec<_> = graph.out_edges(dead).to_vec();
        graph.isolate_node(dead);
        for (consumer, kind) in consumers {
            graph.add_edge(keep, consumer, kind);
        }
    }
}
