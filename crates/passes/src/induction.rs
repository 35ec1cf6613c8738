//! Pass 1: `removeInductionDependence` (§4.4).
//!
//! Rewrites every `IAdd` the builder flagged `is_induction` to the
//! zero-latency `IndexAdd` microop. All edges are left untouched; only the
//! node's own opcode changes.

use aladdin_ir::{Microop, ProgramGraph};

pub fn run(graph: &mut ProgramGraph) {
    let targets: Vec<_> = graph
        .nodes_iter()
        .filter(|(_, n)| n.microop == Microop::IAdd && n.is_induction)
        .map(|(id, _)| id)
        .collect();
    for id in targets {
        graph.node_mut(id).microop = Microop::IndexAdd;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aladdin_ir::entities::{DynamicFunction, FuncId, LabelId};
    use aladdin_ir::entity::EntityRef;
    use aladdin_ir::ExecutionNode;

    #[test]
    fn induction_marked_adds_become_index_add() {
        let mut g = ProgramGraph::new();
        let df = DynamicFunction { func: FuncId::new(0), invocation: 0 };
        let mut n = ExecutionNode::new(Microop::IAdd, df, LabelId::new(0));
        n.is_induction = true;
        let plain = ExecutionNode::new(Microop::IAdd, df, LabelId::new(1));
        let a = g.add_node(n);
        let b = g.add_node(plain);
        run(&mut g);
        assert_eq!(g.node(a).microop, Microop::IndexAdd);
        assert_eq!(g.node(b).microop, Microop::IAdd);
    }
}
