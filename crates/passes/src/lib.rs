//! The fixed-order optimization pipeline (§4.4): each pass rewrites the
//! program graph produced by `aladdin_trace::DddgBuilder` in place.
//! Reordering these passes changes results; callers that want a subset
//! should call the individual pass functions directly rather than
//! reordering [`run_pipeline`].

pub mod ambiguation;
pub mod base_address;
pub mod error;
pub mod fuse;
pub mod induction;
pub mod loop_xform;
pub mod partition;
pub mod phi;
pub mod shared_loads;
pub mod store_buffer;
pub mod tree_height;

pub use error::PassError;

use aladdin_ir::binding::MemoryBindingTable;
use aladdin_ir::{ProgramGraph, SourceTable};
use aladdin_trace::config::Config;

/// Run every pass in the fixed order spec.md §4.4 requires, mutating
/// `graph` and populating `bindings` with the array bindings the memory
/// passes derive.
pub fn run_pipeline(
    graph: &mut ProgramGraph,
    table: &SourceTable,
    bindings: &mut MemoryBindingTable,
    config: &Config,
) -> Result<(), PassError> {
    log::debug!(
        "running optimization pipeline on {} node(s), {} edge(s)",
        graph.num_nodes(),
        graph.num_edges()
    );

    induction::run(graph);
    ambiguation::run(graph);
    phi::run(graph);
    base_address::run(graph);
    partition::complete_partition(graph, table, bindings, config)?;
    partition::scratchpad_partition(graph, table, bindings, config)?;

    for loop_ref in &config.flatten {
        loop_xform::loop_flatten(graph, table, loop_ref)?;
    }
    for (loop_ref, factor) in &config.unrolling {
        loop_xform::loop_unrolling(graph, table, loop_ref, *factor)?;
    }

    shared_loads::run(graph);
    store_buffer::store_buffer(graph);
    store_buffer::remove_repeated_stores(graph);
    tree_height::run(graph);

    if config.fuse_reg_load_stores {
        fuse::run(graph, bindings);
    }

    for (loop_ref, _ii) in &config.pipelining {
        loop_xform::loop_pipelining(graph, table, loop_ref)?;
    }

    #[cfg(debug_assertions)]
    graph.assert_acyclic();

    log::debug!("optimized graph has {} edge(s)", graph.num_edges());
    Ok(())
}
