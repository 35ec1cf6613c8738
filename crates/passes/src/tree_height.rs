//! Pass 12: `treeHeightReduction` (§4.4).
//!
//! Finds maximal chains of the same associative-commutative microop where
//! each link's only consumer is the next link, then rebalances the chain
//! into a minimum-depth tree by repairing in-edges only — the chain's own
//! node ids are reused as the tree's internal nodes, and the final node's
//! out-edges (its external consumers) are left untouched.

use aladdin_ir::entities::EdgeKind;
use aladdin_ir::{NodeId, ProgramGraph};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

pub fn run(graph: &mut ProgramGraph) {
    for chain in find_chains(graph) {
        rebalance(graph, &chain);
    }
}

fn find_chains(graph: &ProgramGraph) -> Vec<Vec<NodeId>> {
    let mut consumed_as_link: FxHashSet<NodeId> = FxHashSet::default();
    let mut chains = Vec::new();

    for (head, head_node) in graph.nodes_iter() {
        if !head_node.microop.is_associative_commutative() || consumed_as_link.contains(&head) {
            continue;
        }
        let op = head_node.microop;
        let mut chain = vec![head];
        let mut cur = head;
        loop {
            let outs = graph.out_edges(cur);
            if outs.len() != 1 {
                break;
            }
            let (next, kind) = outs[0];
            if !matches!(kind, EdgeKind::Operand(_)) || graph.node(next).microop != op {
                break;
            }
            chain.push(next);
            consumed_as_link.insert(next);
            cur = next;
        }
        if chain.len() >= 2 {
            chains.push(chain);
        }
    }
    chains
}

fn rebalance(graph: &mut ProgramGraph, chain: &[NodeId]) {
    let mut leaves: Vec<NodeId> = graph
        .in_edges(chain[0])
        .iter()
        .filter(|(_, kind)| matches!(kind, EdgeKind::Operand(_)))
        .map(|(src, _)| *src)
        .collect();
    for i in 1..chain.len() {
        for &(src, kind) in graph.in_edges(chain[i]) {
            if matches!(kind, EdgeKind::Operand(_)) && src != chain[i - 1] {
                leaves.push(src);
            }
        }
    }
    // A linear chain of k ops has exactly k + 1 leaves; nothing to balance
    // for a chain shorter than three terms.
    if leaves.len() < 3 {
        return;
    }

    for &c in chain {
        let parents: Vec<NodeId> = graph.in_edges(c).iter().map(|(src, _)| *src).collect();
        for p in parents {
            graph.remove_edge(p, c);
        }
    }

    let mut queue: VecDeque<NodeId> = leaves.into_iter().collect();
    let mut combiners = chain.iter();
    while queue.len() > 1 {
        let a = queue.pop_front().unwrap();
        let b = queue.pop_front().unwrap();
        let &combiner = combiners.next().expect("one combiner per pairwise reduction step");
        graph.add_edge(a, combiner, EdgeKind::Operand(1));
        graph.add_edge(b, combiner, EdgeKind::Operand(2));
        queue.push_back(combiner);
    }
}
