//! The DDDG builder (§4.1): consumes a parsed trace and produces the
//! program graph, the source-entity table, and initial memory-binding
//! metadata.

use crate::error::TraceError;
use crate::opcode::opcode_to_microop;
use crate::record::{parse_line, InstructionHeader, MemoryLine, OperandLine, ResultLine, TraceLine};
use aladdin_ir::entities::{DynamicFunction, DynamicVariable, EdgeKind};
use aladdin_ir::{ExecutionNode, MemAccess, MemIntrinsic, Microop, NodeId, ProgramGraph, SourceTable, SpecialMath};
use rustc_hash::FxHashMap;
use std::io::BufRead;

/// Bookkeeping for one entry on the active-method call stack (§4.1 step 5).
struct CallFrame {
    dynamic_function: DynamicFunction,
    /// The caller's result variable this frame's return value propagates
    /// into, if the call that pushed this frame has a result.
    caller_result_var: Option<DynamicVariable>,
    /// First node in this block since entry/last control transfer, used to
    /// wire the "call is control-parent of callee's first orphan node"
    /// rule (§4.1 step 7).
    entry_branch_parent: Option<NodeId>,
    prev_block: Option<String>,
    /// Basic blocks already entered once in this invocation; a block that
    /// recurs is treated as a loop re-entry (§3 "Loop-bound marker
    /// sequence"). An approximation: our trace format carries no explicit
    /// branch target, so a revisited block is the closest observable proxy
    /// for a taken back-edge.
    seen_blocks: rustc_hash::FxHashSet<String>,
}

/// Everything gathered while parsing the current (still-open) instruction
/// record: header plus any operand/result/memory lines seen so far.
#[derive(Default)]
struct PendingInstruction {
    header: Option<InstructionHeader>,
    operands: Vec<OperandLine>,
    result: Option<ResultLine>,
    memories: Vec<MemoryLine>,
}

pub struct DddgBuilder {
    pub table: SourceTable,
    pub graph: ProgramGraph,

    register_last_written: FxHashMap<DynamicVariable, NodeId>,
    address_last_written: FxHashMap<u64, NodeId>,
    invocation_counts: FxHashMap<aladdin_ir::FuncId, u32>,
    active: Vec<CallFrame>,

    dma_since_fence: Vec<NodeId>,
    last_dma_fence: Option<NodeId>,

    pending: PendingInstruction,
    pending_call: Option<PendingCall>,
    line_no: u64,

    /// `(line, function, label)` side multimap used later to resolve
    /// config-file loop references (§4.1 step 9). Populated from the basic
    /// block name, since our trace format does not carry a separate
    /// labeled-statement record.
    pub labelmap: Vec<(u32, String, String)>,
}

impl DddgBuilder {
    pub fn new() -> Self {
        Self {
            table: SourceTable::new(),
            graph: ProgramGraph::new(),
            register_last_written: FxHashMap::default(),
            address_last_written: FxHashMap::default(),
            invocation_counts: FxHashMap::default(),
            active: Vec::new(),
            dma_since_fence: Vec::new(),
            last_dma_fence: None,
            pending: PendingInstruction::default(),
            pending_call: None,
            line_no: 0,
            labelmap: Vec::new(),
        }
    }

    pub fn build_from_reader<R: BufRead>(mut self, reader: R) -> Result<Self, TraceError> {
        for raw in reader.lines() {
            self.line_no += 1;
            let raw = raw?;
            if raw.trim().is_empty() {
                continue;
            }
            let parsed = parse_line(&raw, self.line_no)?;
            match parsed {
                TraceLine::Instruction(header) => self.close_pending(true)?.start(header),
                TraceLine::Operand(op) => self.pending.operands.push(op),
                TraceLine::Result(res) => self.pending.result = Some(res),
                TraceLine::Memory(mem) => self.pending.memories.push(mem),
            }
        }
        self.close_pending(false)?;
        Ok(self)
    }

    /// Close out whatever instruction record is currently pending (§4.1
    /// step 1, "close the previous node"), emitting its node and edges.
    /// `more_to_come` distinguishes the normal "next header seen" case from
    /// EOF, where there is nothing left to `.start()` afterwards.
    fn close_pending(&mut self, more_to_come: bool) -> Result<&mut Self, TraceError> {
        let _ = more_to_come;
        if let Some(header) = self.pending.header.take() {
            let operands = std::mem::take(&mut self.pending.operands);
            let result = self.pending.result.take();
            let memories = std::mem::take(&mut self.pending.memories);
            self.emit_node(header, operands, result, memories)?;
        }
        Ok(self)
    }

    fn start(&mut self, header: InstructionHeader) {
        self.pending = PendingInstruction { header: Some(header), ..PendingInstruction::default() };
    }

    fn enter_function(&mut self, func_name: &str, caller_result_var: Option<DynamicVariable>) -> DynamicFunction {
        let func = self.table.intern_func(func_name);
        let invocation = {
            let e = self.invocation_counts.entry(func).or_insert(0);
            let v = *e;
            *e += 1;
            v
        };
        let df = DynamicFunction { func, invocation };
        self.active.push(CallFrame {
            dynamic_function: df,
            caller_result_var,
            entry_branch_parent: None,
            prev_block: None,
            seen_blocks: rustc_hash::FxHashSet::default(),
        });
        df
    }

    /// Synthesize the variable a given positional call argument binds to in
    /// the callee, under the convention the trace uses for unnamed LLVM
    /// arguments (`arg0`, `arg1`, ...). See DESIGN.md for why this
    /// convention was chosen over parsing real LLVM argument names.
    fn arg_var_name(index: usize) -> String {
        format!("arg{index}")
    }

    fn emit_node(
        &mut self,
        header: InstructionHeader,
        operands: Vec<OperandLine>,
        result: Option<ResultLine>,
        memories: Vec<MemoryLine>,
    ) -> Result<(), TraceError> {
        // Determine whether this instruction opens a new callee frame, pops
        // back to a caller, or stays in the current frame (§4.1 step 5).
        // A pending call always wins: it means the previous instruction was
        // a traced `Call`, so this record opens that callee's frame even
        // when the callee recurses into the caller's own function, where
        // name matching alone cannot tell a fresh invocation from the still
        // -open caller. Name matching is only used to resolve a *return*,
        // once a `Ret` has already popped the callee off the active stack.
        if let Some(top) = self.active.last() {
            let top_name_matches = self.table.func_name(top.dynamic_function.func) == header.function;
            if self.pending_call.is_some() {
                let callee = self.enter_function(&header.function, None);
                self.seed_callee_args(callee);
            } else if !top_name_matches {
                if let Some(idx) = self.active.iter().position(|f| {
                    self.table.func_name(f.dynamic_function.func) == header.function
                }) {
                    while self.active.len() > idx + 1 {
                        self.pop_frame(None);
                    }
                }
            }
        } else {
            // Program entry, on the very first record.
            let callee = self.enter_function(&header.function, None);
            self.seed_callee_args(callee);
        }

        let func = self.active.last().unwrap().dynamic_function.func;
        let _block = self.table.intern_block(func, &header.basic_block);
        let label = self.table.intern_label(func, &header.instruction, header.line_num);
        self.labelmap.push((header.line_num, header.function.clone(), header.instruction.clone()));

        let dynamic_function = self.active.last().unwrap().dynamic_function;

        // Control-flow bookkeeping: has this instruction crossed into a new
        // basic block since the last one we emitted in this frame?
        let (crossed_block, loop_reentry) = {
            let frame = self.active.last_mut().unwrap();
            let crossed = frame.prev_block.as_deref() != Some(header.basic_block.as_str());
            let reentry = crossed && frame.seen_blocks.contains(&header.basic_block);
            frame.prev_block = Some(header.basic_block.clone());
            frame.seen_blocks.insert(header.basic_block.clone());
            (crossed, reentry)
        };

        let microop = self.classify(&header, &memories)?;

        // Intrinsic rewriting (§4.1 step 6) happens before the node exists,
        // since it may produce more than one node for a single call record.
        if microop == Microop::Call {
            if let Some(mem_kind) = MemIntrinsic::from_callee_name(&header.instruction) {
                return self.emit_dma_pair(dynamic_function, label, mem_kind, &memories);
            }
        }
        let microop = if microop == Microop::Call {
            match SpecialMath::from_callee_name(&header.instruction) {
                Some(m) => Microop::SpecialMathOp(m),
                None => Microop::Call,
            }
        } else {
            microop
        };

        let mut node = ExecutionNode::new(microop, dynamic_function, label);
        node.loop_depth = self.active.len().saturating_sub(1) as u32;

        if let Some(res) = &result {
            let var = self.table.intern_var(func, &res.register_name);
            node.source_var = Some(var);

            // An `i = i + step` accumulation: the result register also
            // appears as a register operand, i.e. the add consumes its own
            // previous value (§4.4 pass 1's `is_induction` marker).
            if microop == Microop::IAdd
                && operands.iter().any(|o| o.is_reg && o.register_name == res.register_name)
            {
                node.is_induction = true;
            }
        }

        // Base-address seeding (§4.3): a GetElementPtr's result register
        // names the array it addresses. `initBaseAddress` propagates this
        // label to the memory nodes reachable from it through register
        // edges.
        if microop == Microop::GetElementPtr {
            if let Some(res) = &result {
                node.array_label = Some(self.table.intern_array(&res.register_name));
            }
        }

        if let Some(m) = memories.first() {
            node.mem_access = Some(MemAccess {
                vaddr: m.address,
                size_bits: m.size_bits,
                value: 0,
                is_float: false,
            });
        }

        let node_id = self.graph.add_node(node);
        if loop_reentry {
            self.graph.push_loop_bound(node_id, self.active.len().saturating_sub(1) as u32);
        }

        // Parameter binding (§4.1 step 2): wire each register operand to
        // its defining node.
        let mut has_register_parent = false;
        for op in &operands {
            if op.is_reg {
                let var = self.table.intern_var(func, &op.register_name);
                let dvar = DynamicVariable { function: dynamic_function, var };
                if let Some(&def) = self.register_last_written.get(&dvar) {
                    self.graph.add_edge(def, node_id, EdgeKind::Operand(op.slot));
                    has_register_parent = true;
                } else {
                    log::trace!(
                        "line {}: operand {} of {} has no local definition (constant, argument, or literal)",
                        self.line_no, op.register_name, header.instruction
                    );
                }
            }
        }

        // Result binding (§4.1 step 3).
        if let Some(res) = &result {
            let var = self.table.intern_var(func, &res.register_name);
            let dvar = DynamicVariable { function: dynamic_function, var };
            self.register_last_written.insert(dvar, node_id);
        }

        // Memory-dependence tracking (§4.1 step 4).
        if self.graph.node(node_id).microop.is_store() {
            if let Some(m) = memories.first() {
                if let Some(&prev_store) = self.address_last_written.get(&m.address) {
                    self.graph.add_edge(prev_store, node_id, EdgeKind::Memory);
                }
                self.address_last_written.insert(m.address, node_id);
            }
        } else if self.graph.node(node_id).microop.is_load() {
            if let Some(m) = memories.first() {
                if let Some(&prev_store) = self.address_last_written.get(&m.address) {
                    self.graph.add_edge(prev_store, node_id, EdgeKind::Memory);
                    has_register_parent = true;
                }
            }
        }

        // Control dependences (§4.1 step 7): connect orphan nodes to the
        // nearest control-flow entry into this block (a branch, or the
        // call that opened this frame).
        if !has_register_parent {
            let parent = self.active.last().unwrap().entry_branch_parent;
            if let Some(parent) = parent {
                self.graph.add_edge(parent, node_id, EdgeKind::Control);
            }
        }

        if self.graph.node(node_id).microop == Microop::Br {
            self.active.last_mut().unwrap().entry_branch_parent = Some(node_id);
        }
        let _ = crossed_block;

        // DMA fence bookkeeping for directly-traced DMALoad/DMAStore
        // microops (the paired rewrite path has its own fencing, below).
        if self.graph.node(node_id).microop.is_dma() {
            if let Some(fence) = self.last_dma_fence {
                self.graph.add_edge(fence, node_id, EdgeKind::Memory);
            }
            self.dma_since_fence.push(node_id);
        }

        // Call/Ret bookkeeping (§4.1 step 5): record where a Ret's value
        // should propagate, and where a Call's return value attaches.
        if microop == Microop::Call {
            let result_var = result
                .as_ref()
                .map(|r| DynamicVariable { function: dynamic_function, var: self.table.intern_var(func, &r.register_name) });
            // Seed argument bindings for the callee that is about to be
            // opened on the *next* instruction record, if its function
            // differs from the current one — we cannot know that yet, so
            // stash the binding plan keyed by call node for `emit_node` to
            // consult when the callee's frame is pushed.
            self.pending_call = Some(PendingCall {
                caller_result_var: result_var,
                arg_producers: operands
                    .iter()
                    .filter(|o| o.is_reg)
                    .map(|o| {
                        let v = self.table.intern_var(func, &o.register_name);
                        self.register_last_written.get(&DynamicVariable { function: dynamic_function, var: v }).copied()
                    })
                    .collect(),
            });
        } else if microop == Microop::Ret {
            let value_producer = operands
                .iter()
                .find(|o| o.is_reg)
                .and_then(|o| {
                    let v = self.table.intern_var(func, &o.register_name);
                    self.register_last_written.get(&DynamicVariable { function: dynamic_function, var: v }).copied()
                });
            self.pop_frame(value_producer);
        }

        Ok(())
    }

    fn classify(&self, header: &InstructionHeader, _memories: &[MemoryLine]) -> Result<Microop, TraceError> {
        opcode_to_microop(&header.opcode).ok_or_else(|| TraceError::MalformedLine {
            line: self.line_no,
            detail: format!("unrecognized opcode {:?}", header.opcode),
        })
    }

    /// On first entry into a deeper frame, apply any pending call-argument
    /// seeding recorded by the call instruction that opened it (§4.1 step
    /// 5).
    fn seed_callee_args(&mut self, callee: DynamicFunction) {
        if let Some(call) = self.pending_call.take() {
            for (i, producer) in call.arg_producers.iter().enumerate() {
                if let Some(node) = producer {
                    let var = self.table.intern_var(callee.func, &Self::arg_var_name(i));
                    self.register_last_written.insert(DynamicVariable { function: callee, var }, *node);
                }
            }
            self.active.last_mut().unwrap().caller_result_var = call.caller_result_var;
        }
    }

    fn pop_frame(&mut self, return_value_producer: Option<NodeId>) {
        if let Some(frame) = self.active.pop() {
            if let (Some(caller_var), Some(producer)) = (frame.caller_result_var, return_value_producer) {
                self.register_last_written.insert(caller_var, producer);
            }
        }
    }

    fn emit_dma_pair(
        &mut self,
        dynamic_function: DynamicFunction,
        label: aladdin_ir::LabelId,
        _kind: MemIntrinsic,
        memories: &[MemoryLine],
    ) -> Result<(), TraceError> {
        let (dst, src) = match memories.len() {
            0 => (0, 0),
            1 => (memories[0].address, memories[0].address),
            _ => (memories[0].address, memories[1].address),
        };
        let size_bits = memories.first().map(|m| m.size_bits).unwrap_or(0);

        let mut load_node = ExecutionNode::new(Microop::DmaLoad, dynamic_function, label);
        load_node.mem_access = Some(MemAccess { vaddr: src, size_bits, value: 0, is_float: false });
        let load_id = self.graph.add_node(load_node);

        let mut store_node = ExecutionNode::new(Microop::DmaStore, dynamic_function, label);
        store_node.mem_access = Some(MemAccess { vaddr: dst, size_bits, value: 0, is_float: false });
        let store_id = self.graph.add_node(store_node);

        self.graph.add_edge(load_id, store_id, EdgeKind::Memory);

        if let Some(fence) = self.last_dma_fence {
            self.graph.add_edge(fence, load_id, EdgeKind::Memory);
        }

        let mut fence_node = ExecutionNode::new(Microop::DmaFence, dynamic_function, label);
        fence_node.loop_depth = self.active.len().saturating_sub(1) as u32;
        let fence_id = self.graph.add_node(fence_node);
        for prior in std::mem::take(&mut self.dma_since_fence) {
            self.graph.add_edge(prior, fence_id, EdgeKind::Memory);
        }
        self.graph.add_edge(load_id, fence_id, EdgeKind::Memory);
        self.graph.add_edge(store_id, fence_id, EdgeKind::Memory);
        self.last_dma_fence = Some(fence_id);
        self.dma_since_fence.push(fence_id);

        Ok(())
    }
}

struct PendingCall {
    caller_result_var: Option<DynamicVariable>,
    arg_producers: Vec<Option<NodeId>>,
}

impl Default for DddgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aladdin_ir::EdgeKind;

    #[test]
    fn register_dependence_links_producer_to_consumer() {
        let trace = "\
0,1,main,entry,%a,add
1,i32,32,0,5
2,i32,32,0,3
r,i32,32,1,%a
0,2,main,entry,%b,add
1,i32,32,1,%a
2,i32,32,0,1
r,i32,32,1,%b
";
        let b = DddgBuilder::new().build_from_reader(std::io::Cursor::new(trace.as_bytes())).unwrap();
        assert_eq!(b.graph.num_nodes(), 2);
        assert_eq!(b.graph.num_edges(), 1);
        use aladdin_ir::entity::EntityRef;
        let n0 = NodeId::new(0);
        let n1 = NodeId::new(1);
        assert!(b.graph.edge_exists(n0, n1));
    }

    #[test]
    fn store_then_load_same_address_creates_memory_edge() {
        let trace = "\
0,1,main,entry,%s,store
1,i32,32,0,7
m,0x100,32
0,2,main,entry,%l,load
1,i32,32,0,0
m,0x100,32
r,i32,32,1,%l
";
        let b = DddgBuilder::new().build_from_reader(std::io::Cursor::new(trace.as_bytes())).unwrap();
        assert_eq!(b.graph.num_nodes(), 2);
        use aladdin_ir::entity::EntityRef;
        let store = NodeId::new(0);
        let load = NodeId::new(1);
        assert!(b.graph.edge_exists(store, load));
        let (_, kind) = b.graph.out_edges(store)[0];
        assert!(matches!(kind, EdgeKind::Memory));
    }

    #[test]
    fn call_and_return_propagate_result_register() {
        let trace = "\
0,1,caller,entry,callee,call
1,i32,32,0,9
r,i32,32,1,%ret
0,2,callee,entry,%r,ret
1,i32,32,1,arg0
0,3,caller,entry,%use,add
1,i32,32,1,%ret
2,i32,32,0,1
r,i32,32,1,%use
";
        let b = DddgBuilder::new().build_from_reader(std::io::Cursor::new(trace.as_bytes())).unwrap();
        // call, ret, use add -> 3 nodes (callee's ret references arg0, which
        // has no local producer since it is a literal in this trace).
        assert_eq!(b.graph.num_nodes(), 3);
    }

    #[test]
    fn direct_recursion_opens_a_distinct_inner_invocation() {
        let trace = "\
0,1,fact,entry,fact,call
1,i32,32,0,5
r,i32,32,1,%inner
0,2,fact,entry,%r,ret
1,i32,32,1,arg0
0,3,fact,entry,%use,add
1,i32,32,1,%inner
2,i32,32,0,1
r,i32,32,1,%use
";
        let b = DddgBuilder::new().build_from_reader(std::io::Cursor::new(trace.as_bytes())).unwrap();
        use aladdin_ir::entity::EntityRef;
        assert_eq!(b.graph.num_nodes(), 3);
        let outer_call = b.graph.node(NodeId::new(0));
        let inner_ret = b.graph.node(NodeId::new(1));
        let outer_use = b.graph.node(NodeId::new(2));
        assert_eq!(outer_call.dynamic_function.invocation, 0);
        assert_eq!(inner_ret.dynamic_function.invocation, 1);
        assert_eq!(outer_use.dynamic_function.invocation, 0);
    }
}
