//! The program graph: a directed acyclic graph whose vertices are node ids
//! and whose edges carry an [`EdgeKind`] (§3 "Program Graph invariants").
//!
//! Nodes and edges are arena-indexed rather than pointer-linked (§9): each
//! node stores its own small out-edge and in-edge lists, which is the
//! "CSR-like adjacency" the design notes call for, minus the separate
//! offset array since per-node degree in a DDDG is small and bounded.

use crate::entities::{EdgeKind, NodeId};
use crate::node::ExecutionNode;
use crate::entity::PrimaryMap;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// An edge endpoint paired with its kind, as stored on the *other* node's
/// adjacency list (e.g. `out_edges[u]` holds `(v, kind)`, `in_edges[v]`
/// holds `(u, kind)`).
pub type AdjList = SmallVec<[(NodeId, EdgeKind); 4]>;

/// A loop-bound marker: `(node_id, depth)`, inserted at every observed
/// back-edge target and function-call boundary (§3 "Loop-bound sequence").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoopBound {
    pub node: NodeId,
    pub depth: u32,
}

#[derive(Default)]
pub struct ProgramGraph {
    nodes: PrimaryMap<NodeId, ExecutionNode>,
    out_edges: Vec<AdjList>,
    in_edges: Vec<AdjList>,
    /// Fast membership test for "does an edge u->v already exist", since
    /// edge insertion must be idempotent per (src, dst) (§3).
    edge_set: FxHashSet<(NodeId, NodeId)>,
    loop_bounds: Vec<LoopBound>,
}

impl ProgramGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: ExecutionNode) -> NodeId {
        let id = self.nodes.push(node);
        self.out_edges.push(AdjList::new());
        self.in_edges.push(AdjList::new());
        id
    }

    pub fn node(&self, id: NodeId) -> &ExecutionNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut ExecutionNode {
        &mut self.nodes[id]
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_set.len()
    }

    /// Insert an edge `src -> dst` tagged `kind`. Idempotent per `(src,
    /// dst)`: if an edge between the same pair already exists, this is a
    /// no-op (§3). Cycle creation is the caller's responsibility to avoid
    /// (§4.2): checked only in debug builds, since passes that call this on
    /// a hot path rely on it being cheap.
    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, kind: EdgeKind) {
        if self.edge_set.contains(&(src, dst)) {
            return;
        }
        self.edge_set.insert((src, dst));
        self.out_edges[src.index()].push((dst, kind));
        self.in_edges[dst.index()].push((src, kind));
    }

    pub fn edge_exists(&self, src: NodeId, dst: NodeId) -> bool {
        self.edge_set.contains(&(src, dst))
    }

    pub fn remove_edge(&mut self, src: NodeId, dst: NodeId) {
        if !self.edge_set.remove(&(src, dst)) {
            return;
        }
        self.out_edges[src.index()].retain(|(n, _)| *n != dst);
        self.in_edges[dst.index()].retain(|(n, _)| *n != src);
    }

    /// Remove every edge touching `node` and mark it `removed`, logically
    /// deleting it without removing its arena slot (§3 "Entity lifecycles").
    /// A removed node is excluded from scheduling by `removed`, not by
    /// in-degree: a zero in-degree can also mean "ready to run".
    pub fn isolate_node(&mut self, node: NodeId) {
        let outs: SmallVec<[NodeId; 4]> =
            self.out_edges[node.index()].iter().map(|(n, _)| *n).collect();
        for dst in outs {
            self.remove_edge(node, dst);
        }
        let ins: SmallVec<[NodeId; 4]> =
            self.in_edges[node.index()].iter().map(|(n, _)| *n).collect();
        for src in ins {
            self.remove_edge(src, node);
        }
        self.nodes[node].removed = true;
    }

    pub fn out_edges(&self, node: NodeId) -> &[(NodeId, EdgeKind)] {
        &self.out_edges[node.index()]
    }

    pub fn in_edges(&self, node: NodeId) -> &[(NodeId, EdgeKind)] {
        &self.in_edges[node.index()]
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        self.in_edges[node.index()].len()
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        self.out_edges[node.index()].len()
    }

    /// Iterate node ids in topological order. The scheduler relies on this
    /// being node-id order, which holds as long as no pass has rewired
    /// edges against insertion order (§4.2 "Guarantees").
    pub fn topological_iteration(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys()
    }

    pub fn nodes_iter(&self) -> impl Iterator<Item = (NodeId, &ExecutionNode)> {
        self.nodes.iter()
    }

    pub fn push_loop_bound(&mut self, node: NodeId, depth: u32) {
        self.loop_bounds.push(LoopBound { node, depth });
    }

    pub fn loop_bounds(&self) -> &[LoopBound] {
        &self.loop_bounds
    }

    pub fn loop_bounds_mut(&mut self) -> &mut Vec<LoopBound> {
        &mut self.loop_bounds
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.out_edges.clear();
        self.in_edges.clear();
        self.edge_set.clear();
        self.loop_bounds.clear();
    }

    /// Asserts acyclicity via a DFS coloring walk; used by tests and by the
    /// debug-build sanity check after each pass (§4.2, §7 "Graph integrity
    /// violation").
    #[cfg(any(test, debug_assertions))]
    pub fn assert_acyclic(&self) {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut color = vec![Color::White; self.nodes.len()];
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        for start in self.nodes.keys() {
            if color[start.index()] != Color::White {
                continue;
            }
            stack.push((start, 0));
            color[start.index()] = Color::Gray;
            while let Some((node, i)) = stack.pop() {
                let outs = &self.out_edges[node.index()];
                if i < outs.len() {
                    let (next, _) = outs[i];
                    stack.push((node, i + 1));
                    match color[next.index()] {
                        Color::White => {
                            color[next.index()] = Color::Gray;
                            stack.push((next, 0));
                        }
                        Color::Gray => panic!("cycle detected through node {next:?}"),
                        Color::Black => {}
                    }
                } else {
                    color[node.index()] = Color::Black;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DynamicFunction, FuncId, LabelId};
    use crate::entity::EntityRef;
    use crate::microop::Microop;

    fn dummy_node() -> ExecutionNode {
        ExecutionNode::new(
            Microop::IAdd,
            DynamicFunction { func: FuncId::new(0), invocation: 0 },
            LabelId::new(0),
        )
    }

    #[test]
    fn edge_insertion_is_idempotent() {
        let mut g = ProgramGraph::new();
        let a = g.add_node(dummy_node());
        let b = g.add_node(dummy_node());
        g.add_edge(a, b, EdgeKind::Operand(1));
        g.add_edge(a, b, EdgeKind::Operand(1));
        assert_eq!(g.out_edges(a).len(), 1);
        assert_eq!(g.num_edges(), 1);
    }

    #[test]
    fn isolate_node_removes_all_edges() {
        let mut g = ProgramGraph::new();
        let a = g.add_node(dummy_node());
        let b = g.add_node(dummy_node());
        let c = g.add_node(dummy_node());
        g.add_edge(a, b, EdgeKind::Operand(1));
        g.add_edge(b, c, EdgeKind::Operand(1));
        g.isolate_node(b);
        assert_eq!(g.out_edges(a).len(), 0);
        assert_eq!(g.in_edges(c).len(), 0);
    }

    #[test]
    fn acyclic_graph_passes_assertion() {
        let mut g = ProgramGraph::new();
        let a = g.add_node(dummy_node());
        let b = g.add_node(dummy_node());
        g.add_edge(a, b, EdgeKind::Operand(1));
        g.assert_acyclic();
    }
}
