//! Pass 3: `removePhiNodes` (§4.4).
//!
//! A dynamic trace only ever records the incoming definition that was
//! actually taken, so every `Phi` node has at most one register-edge
//! parent by construction. This pass isolates the phi and rewires its
//! consumers to receive edges directly from that parent.

use aladdin_ir::entities::EdgeKind;
use aladdin_ir::{Microop, ProgramGraph};

pub fn run(graph: &mut ProgramGraph) {
    let phis: Vec<_> = graph
        .nodes_iter()
        .filter(|(_, n)| n.microop == Microop::Phi)
        .map(|(id, _)| id)
        .collect();

    for phi in phis {
        let incoming = graph
            .in_edges(phi)
            .iter()
            .find(|(_, kind)| matches!(kind, EdgeKind::Operand(_)))
            .map(|(src, _)| *src);
        let consumers: Vec<_> = graph.out_edges(phi).to_vec();

        graph.isolate_node(phi);

        if let Some(def) = incoming {
            for (consumer, kind) in consumers {
                graph.add_edge(def, consumer, kind);
            }
        }
    }
}
