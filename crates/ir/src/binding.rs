//! Memory binding: per-array kind, partitioning, and the derived
//! partition-index resolution described in §3 "Memory Binding" and §4.3.

use crate::entities::ArrayId;
use crate::error::GraphError;
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemoryKind {
    Register,
    Scratchpad,
    Cache,
    Dma,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PartitionType {
    Block,
    Cyclic,
}

/// One array's binding metadata (§3 "Memory Binding"). `num_partitions`
/// always equals the element count for `Register` arrays (complete
/// partitioning); `partition_type` is only meaningful for `Scratchpad`.
#[derive(Clone, Debug)]
pub struct ArrayBinding {
    pub array: ArrayId,
    pub kind: MemoryKind,
    pub partition_type: PartitionType,
    pub num_partitions: u32,
    pub word_size: u32,
    pub total_size: u32,
    pub num_ports: u32,
    pub base_trace_addr: u64,
    /// Per-partition byte size, for `Block` partitioning where sizes may
    /// differ by at most one word. Empty for `Cyclic`/`Register`, where the
    /// size is uniform (or not meaningful).
    block_sizes: Vec<u32>,
}

impl ArrayBinding {
    pub fn new(
        array: ArrayId,
        kind: MemoryKind,
        partition_type: PartitionType,
        num_partitions: u32,
        word_size: u32,
        total_size: u32,
        num_ports: u32,
        base_trace_addr: u64,
    ) -> Result<Self, GraphError> {
        if num_partitions == 0 {
            return Err(GraphError::InvalidPartitionFactor { array, factor: num_partitions });
        }
        if word_size == 0 || total_size % word_size != 0 {
            return Err(GraphError::IncompatiblePartitionFactor {
                array,
                factor: num_partitions,
                word_size,
                total_size,
            });
        }
        let num_words = total_size / word_size;
        if num_partitions > num_words.max(1) && kind != MemoryKind::Register {
            return Err(GraphError::IncompatiblePartitionFactor {
                array,
                factor: num_partitions,
                word_size,
                total_size,
            });
        }

        let block_sizes = if partition_type == PartitionType::Block {
            Self::compute_block_sizes(num_words, num_partitions)
        } else {
            Vec::new()
        };

        Ok(Self {
            array,
            kind,
            partition_type,
            num_partitions,
            word_size,
            total_size,
            num_ports,
            base_trace_addr,
            block_sizes,
        })
    }

    /// Sizes (in words) per partition may differ by at most one word
    /// (§3): the first `num_words % num_partitions` partitions get one
    /// extra word.
    fn compute_block_sizes(num_words: u32, num_partitions: u32) -> Vec<u32> {
        let base = num_words / num_partitions;
        let remainder = num_words % num_partitions;
        (0..num_partitions)
            .map(|i| if i < remainder { base + 1 } else { base })
            .collect()
    }

    /// Resolve the partition index for a trace virtual address, per §3's
    /// cyclic/block formulas.
    pub fn partition_index(&self, vaddr: u64) -> Result<u32, GraphError> {
        if vaddr < self.base_trace_addr {
            return Err(GraphError::AddressOutOfRange { array: self.array, vaddr });
        }
        let offset = vaddr - self.base_trace_addr;
        if offset >= self.total_size as u64 {
            return Err(GraphError::AddressOutOfRange { array: self.array, vaddr });
        }

        match self.kind {
            MemoryKind::Register => {
                let idx = offset / self.word_size as u64;
                Ok(idx as u32)
            }
            MemoryKind::Scratchpad => match self.partition_type {
                PartitionType::Cyclic => {
                    let word_index = offset / self.word_size as u64;
                    Ok((word_index % self.num_partitions as u64) as u32)
                }
                PartitionType::Block => {
                    let word_index = offset / self.word_size as u64;
                    let mut cumulative = 0u64;
                    for (i, sz) in self.block_sizes.iter().enumerate() {
                        cumulative += *sz as u64;
                        if word_index < cumulative {
                            return Ok(i as u32);
                        }
                    }
                    Err(GraphError::PartitionIndexOutOfBounds { array: self.array, vaddr })
                }
            },
            MemoryKind::Cache | MemoryKind::Dma => Ok(0),
        }
    }
}

/// The table of all known array bindings, keyed by [`ArrayId`] (§4.3).
#[derive(Default)]
pub struct MemoryBindingTable {
    bindings: FxHashMap<ArrayId, ArrayBinding>,
}

impl MemoryBindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, binding: ArrayBinding) {
        self.bindings.insert(binding.array, binding);
    }

    pub fn get(&self, array: ArrayId) -> Option<&ArrayBinding> {
        self.bindings.get(&array)
    }

    pub fn get_mut(&mut self, array: ArrayId) -> Option<&mut ArrayBinding> {
        self.bindings.get_mut(&array)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrayId, &ArrayBinding)> {
        self.bindings.iter()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}
