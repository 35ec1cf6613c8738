//! Passes 5 and 6: `completePartition` and `scratchpadPartition` (§4.3).
//!
//! Both resolve a config [`PartitionSpec`] to an [`ArrayBinding`] and stamp
//! each memory node's `partition_index`. `completePartition` promotes an
//! array to `MemoryKind::Register` (one partition per element, zero
//! contention); `scratchpadPartition` builds the cyclic/block binding for
//! everything else.

use crate::error::PassError;
use aladdin_ir::binding::{ArrayBinding, MemoryBindingTable, MemoryKind};
use aladdin_ir::{NodeId, ProgramGraph, SourceTable};
use aladdin_trace::config::{Config, PartitionSpec};

pub fn complete_partition(
    graph: &mut ProgramGraph,
    table: &SourceTable,
    bindings: &mut MemoryBindingTable,
    config: &Config,
) -> Result<(), PassError> {
    for spec in config.partitions.iter().filter(|s| s.complete) {
        apply(graph, table, bindings, spec, MemoryKind::Register)?;
    }
    Ok(())
}

pub fn scratchpad_partition(
    graph: &mut ProgramGraph,
    table: &SourceTable,
    bindings: &mut MemoryBindingTable,
    config: &Config,
) -> Result<(), PassError> {
    for spec in config.partitions.iter().filter(|s| !s.complete) {
        apply(graph, table, bindings, spec, MemoryKind::Scratchpad)?;
    }
    Ok(())
}

fn apply(
    graph: &mut ProgramGraph,
    table: &SourceTable,
    bindings: &mut MemoryBindingTable,
    spec: &PartitionSpec,
    kind: MemoryKind,
) -> Result<(), PassError> {
    let array = table
        .lookup_array(&spec.array)
        .ok_or_else(|| PassError::UnknownArray { pass: "partition", array: spec.array.clone() })?;

    let vaddrs: Vec<u64> = graph
        .nodes_iter()
        .filter(|(_, n)| n.array_label == Some(array))
        .filter_map(|(_, n)| n.mem_access.map(|m| m.vaddr))
        .collect();

    let word_size = if spec.word_size > 0 { spec.word_size } else { 4 };
    let base = vaddrs.iter().copied().min().unwrap_or(0);
    let observed_span = vaddrs.iter().copied().max().map(|m| m - base + word_size as u64).unwrap_or(word_size as u64);
    let mut total_size = if spec.total_size > 0 { spec.total_size } else { observed_span as u32 };
    // Round up to a whole number of words; `ArrayBinding::new` requires it.
    total_size = ((total_size + word_size - 1) / word_size) * word_size;

    let num_partitions = match kind {
        MemoryKind::Register => (total_size / word_size).max(1),
        _ => spec.factor.max(1),
    };

    let binding = ArrayBinding::new(array, kind, spec.partition_type, num_partitions, word_size, total_size, 1, base)?;
    bindings.insert(binding);

    let ids: Vec<NodeId> =
        graph.nodes_iter().filter(|(_, n)| n.array_label == Some(array)).map(|(id, _)| id).collect();
    let binding = bindings.get(array).expect("just inserted");
    let indices: Vec<(NodeId, Option<u32>)> = ids
        .iter()
        .map(|&id| {
            let idx = graph.node(id).mem_access.map(|m| binding.partition_index(m.vaddr)).transpose();
            (id, idx)
        })
        .map(|(id, r)| (id, r.unwrap_or(None)))
        .collect();
    for (id, idx) in indices {
        if let Some(idx) = idx {
            graph.node_mut(id).partition_index = Some(idx);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aladdin_ir::entities::{DynamicFunction, EdgeKind, FuncId, LabelId};
    use aladdin_ir::entity::EntityRef;
    use aladdin_ir::binding::PartitionType;
    use aladdin_ir::{ExecutionNode, MemAccess, Microop};

    fn setup() -> (ProgramGraph, SourceTable, NodeId, NodeId) {
        let mut g = ProgramGraph::new();
        let mut table = SourceTable::new();
        let df = DynamicFunction { func: FuncId::new(0), invocation: 0 };
        let arr = table.intern_array("a");

        let mut gep = ExecutionNode::new(Microop::GetElementPtr, df, LabelId::new(0));
        gep.array_label = Some(arr);
        let gep = g.add_node(gep);

        let mut first = ExecutionNode::new(Microop::Load, df, LabelId::new(1));
        first.array_label = Some(arr);
        first.mem_access = Some(MemAccess { vaddr: 0x1000, size_bits: 32, value: 0, is_float: false });
        let first = g.add_node(first);
        g.add_edge(gep, first, EdgeKind::Operand(1));

        let mut load = ExecutionNode::new(Microop::Load, df, LabelId::new(2));
        load.array_label = Some(arr);
        load.mem_access = Some(MemAccess { vaddr: 0x1000 + 8 * 5, size_bits: 32, value: 0, is_float: false });
        let load = g.add_node(load);
        g.add_edge(gep, load, EdgeKind::Operand(1));
        (g, table, gep, load)
    }

    #[test]
    fn scratchpad_partition_stamps_cyclic_index() {
        let (mut g, table, _gep, load) = setup();
        let mut bindings = MemoryBindingTable::new();
        let spec = PartitionSpec {
            partition_type: PartitionType::Cyclic,
            complete: false,
            array: "a".to_string(),
            total_size: 128 * 8,
            word_size: 8,
            factor: 4,
        };
        let config = Config { partitions: vec![spec], ..Config::default() };
        scratchpad_partition(&mut g, &table, &mut bindings, &config).unwrap();
        assert_eq!(g.node(load).partition_index, Some(1));
    }
}
