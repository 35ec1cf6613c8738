//! Pass 13 (optional, config-gated): `fuseRegLoadStores` (§4.4).
//!
//! A `Load` feeding exactly one arithmetic op which feeds exactly one
//! `Store` to a register-kind array retires in a single cycle: tag the
//! edges along that triplet `REGISTER_EDGE` so the scheduler treats them as
//! same-cycle (§4.5 step 3).

use aladdin_ir::binding::{MemoryBindingTable, MemoryKind};
use aladdin_ir::entities::EdgeKind;
use aladdin_ir::{Microop, NodeId, ProgramGraph};

pub fn run(graph: &mut ProgramGraph, bindings: &MemoryBindingTable) {
    let loads: Vec<NodeId> = graph.nodes_iter().filter(|(_, n)| n.microop.is_load()).map(|(id, _)| id).collect();
    let mut fusions: Vec<(NodeId, NodeId, NodeId)> = Vec::new();

    for load in loads {
        if graph.out_degree(load) != 1 {
            continue;
        }
        let (arith, k1) = graph.out_edges(load)[0];
        if !matches!(k1, EdgeKind::Operand(_)) || is_memory_or_control(graph.node(arith).microop) {
            continue;
        }
        if graph.out_degree(arith) != 1 {
            continue;
        }
        let (store, k2) = graph.out_edges(arith)[0];
        if !matches!(k2, EdgeKind::Operand(_)) || !graph.node(store).microop.is_store() {
            continue;
        }
        let is_register_array = graph
            .node(store)
            .array_label
            .and_then(|arr| bindings.get(arr))
            .map(|b| b.kind == MemoryKind::Register)
            .unwrap_or(false);
        if is_register_array {
            fusions.push((load, arith, store));
        }
    }

    for (load, arith, store) in fusions {
        graph.remove_edge(load, arith);
        graph.add_edge(load, arith, EdgeKind::Register);
        graph.remove_edge(arith, store);
        graph.add_edge(arith, store, EdgeKind::Register);
    }
}

fn is_memory_or_control(op: Microop) -> bool {
    matches!(op, Microop::Load | Microop::Store | Microop::DmaLoad | Microop::DmaStore | Microop::Phi | Microop::Br | Microop::Call | Microop::Ret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aladdin_ir::binding::{ArrayBinding, PartitionType};
    use aladdin_ir::entities::{DynamicFunction, FuncId, LabelId};
    use aladdin_ir::entity::EntityRef;
    use aladdin_ir::{ExecutionNode, SourceTable};

    #[test]
    fn load_arith_store_triplet_to_register_array_is_fused() {
        let mut g = ProgramGraph::new();
        let mut table = SourceTable::new();
        let df = DynamicFunction { func: FuncId::new(0), invocation: 0 };
        let arr = table.intern_array("acc");

        let mut bindings = MemoryBindingTable::new();
        bindings.insert(ArrayBinding::new(arr, MemoryKind::Register, PartitionType::Block, 1, 4, 4, 1, 0).unwrap());

        let load = g.add_node(ExecutionNode::new(Microop::Load, df, LabelId::new(0)));
        let add = g.add_node(ExecutionNode::new(Microop::IAdd, df, LabelId::new(1)));
        let mut store = ExecutionNode::new(Microop::Store, df, LabelId::new(2));
        store.array_label = Some(arr);
        let store = g.add_node(store);
        g.add_edge(load, add, EdgeKind::Operand(1));
        g.add_edge(add, store, EdgeKind::Operand(1));

        run(&mut g, &bindings);

        let (_, k1) = g.out_edges(load)[0];
        let (_, k2) = g.out_edges(add)[0];
        assert!(matches!(k1, EdgeKind::Register));
        assert!(matches!(k2, EdgeKind::Register));
    }
}
