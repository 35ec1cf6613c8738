//! The external memory interface (§6): everything outside the datapath
//! proper — DMA engine, cache hierarchy, address translation. Production
//! use backs this with a co-simulator; tests use the in-process mock
//! below.

use aladdin_ir::NodeId;

#[derive(Copy, Clone, Debug)]
pub struct Translation {
    pub paddr: u64,
    pub hit_latency: u32,
}

/// The scheduler's view of the world outside the accelerator core. A node
/// whose array binds to `MemoryKind::Cache` or `MemoryKind::Dma` is issued
/// through here exactly once; its completion or failure is discovered on a
/// later call to `poll_completed`/`poll_failed`, not synchronously.
pub trait MemorySubsystem {
    fn issue_dma(&mut self, node: NodeId, vaddr: u64, size_bits: u32, is_load: bool);

    fn issue_cache(
        &mut self,
        node: NodeId,
        vaddr: u64,
        paddr: u64,
        size_bits: u32,
        is_load: bool,
        value: u64,
    );

    fn translate(&mut self, vaddr: u64, size_bits: u32, is_load: bool) -> Translation;

    /// Nodes whose outstanding request finished since the last poll. Called
    /// once per scheduler cycle, before any node in that cycle is retired.
    fn poll_completed(&mut self) -> Vec<NodeId>;

    /// Nodes whose outstanding request failed since the last poll, paired
    /// with a human-readable reason.
    fn poll_failed(&mut self) -> Vec<(NodeId, String)>;
}

/// An in-process implementation that completes every outstanding request
/// after a fixed latency. This is the built-in default when no external
/// co-simulator is wired up (§6): good enough for a standalone run or a
/// unit test, but not a substitute for a real DMA/cache timing model.
pub mod mock {
    use super::*;
    use rustc_hash::FxHashMap;

    pub struct FixedLatencyMemory {
        latency: u32,
        outstanding: FxHashMap<NodeId, u32>,
    }

    impl FixedLatencyMemory {
        pub fn new(latency: u32) -> Self {
            Self { latency, outstanding: FxHashMap::default() }
        }
    }

    impl MemorySubsystem for FixedLatencyMemory {
        fn issue_dma(&mut self, node: NodeId, _vaddr: u64, _size_bits: u32, _is_load: bool) {
            self.outstanding.insert(node, self.latency);
        }

        fn issue_cache(
            &mut self,
            node: NodeId,
            _vaddr: u64,
            _paddr: u64,
            _size_bits: u32,
            _is_load: bool,
            _value: u64,
        ) {
            self.outstanding.insert(node, self.latency);
        }

        fn translate(&mut self, vaddr: u64, _size_bits: u32, _is_load: bool) -> Translation {
            Translation { paddr: vaddr, hit_latency: 1 }
        }

        fn poll_completed(&mut self) -> Vec<NodeId> {
            let mut done = Vec::new();
            self.outstanding.retain(|&node, remaining| {
                if *remaining == 0 {
                    done.push(node);
                    false
                } else {
                    *remaining -= 1;
                    true
                }
            });
            done
        }

        fn poll_failed(&mut self) -> Vec<(NodeId, String)> {
            Vec::new()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use aladdin_ir::entity::EntityRef;

        #[test]
        fn request_completes_after_configured_latency() {
            let mut mem = FixedLatencyMemory::new(2);
            let node = NodeId::new(0);
            mem.issue_dma(node, 0x1000, 32, true);
            assert!(mem.poll_completed().is_empty());
            assert!(mem.poll_completed().is_empty());
            assert_eq!(mem.poll_completed(), vec![node]);
        }
    }
}
