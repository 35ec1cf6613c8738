//! Scheduler error type (§7 "Error Handling Design").

use aladdin_ir::{Microop, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedError {
    /// No node completed for `deadlock_threshold` consecutive cycles while
    /// the executing queue was non-empty: a stuck resource or a pass that
    /// left a dangling dependency (§7 "Scheduler deadlock").
    #[error(
        "scheduler made no progress for {idle_cycles} cycles at cycle {cycle}; \
         {stuck} node(s) still in the executing queue, e.g. {sample:?}"
    )]
    Deadlock {
        cycle: u64,
        idle_cycles: u64,
        stuck: usize,
        /// Node id and microop for up to 8 nodes still in the executing
        /// queue, so the caller can tell an unresolved DMA from a stuck
        /// scratchpad port at a glance.
        sample: Vec<(NodeId, Microop)>,
    },

    /// The external memory interface reported a failed request. The
    /// scheduler does not retry on the caller's behalf; a `MemorySubsystem`
    /// that wants retry-then-abort semantics implements that internally and
    /// only surfaces a failure once it has given up (§6 "Exit behavior").
    #[error("external memory interface failed node {node:?}: {detail}")]
    ExternalMemoryFailure { node: NodeId, detail: String },
}
