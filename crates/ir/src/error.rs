//! Graph-integrity and memory-binding errors (§7).

use crate::entities::{ArrayId, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cycle detected through node {0:?}")]
    CycleDetected(NodeId),

    #[error("duplicate edge {src:?} -> {dst:?} where forbidden")]
    DuplicateEdge { src: NodeId, dst: NodeId },

    #[error("attempted to schedule node {0:?} with unresolved parents")]
    UnresolvedParents(NodeId),

    #[error("address 0x{vaddr:x} is outside the range of array {array:?}")]
    AddressOutOfRange { array: ArrayId, vaddr: u64 },

    #[error("partition index computation for array {array:?} at 0x{vaddr:x} is out of bounds")]
    PartitionIndexOutOfBounds { array: ArrayId, vaddr: u64 },

    #[error("partition factor {factor} for array {array:?} is invalid")]
    InvalidPartitionFactor { array: ArrayId, factor: u32 },

    #[error(
        "partition factor {factor} x word size {word_size} exceeds total size {total_size} for array {array:?}"
    )]
    IncompatiblePartitionFactor { array: ArrayId, factor: u32, word_size: u32, total_size: u32 },
}
