//! Entity references used throughout the datapath engine.
//!
//! Every node, every interned source entity, and every edge parameter is an
//! opaque `u32`-backed handle rather than a pointer, so that the program
//! graph and its scheduling state can live in plain arenas (§9 "Replacing
//! pointer-heavy node graphs").

use crate::entity::{entity_impl, EntityRef};
use std::fmt;

/// A node in the program graph (one dynamic instruction, or a synthetic node
/// such as a `DMAFence`). Assigned in builder insertion order; monotonically
/// increasing (§3, Execution Node invariants).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
entity_impl!(NodeId, "n");

/// An interned function name.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(u32);
entity_impl!(FuncId, "func");

/// An interned basic-block label, scoped to a function.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);
entity_impl!(BlockId, "bb");

/// An interned (function, variable/register name) pairing — what the spec
/// calls a `Variable`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);
entity_impl!(VarId, "var");

/// An interned (function, line, label) triple, used to resolve the config
/// file's `(function, label)` loop references to node ids.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelId(u32);
entity_impl!(LabelId, "label");

/// An interned array name, the key into the [`crate::binding::MemoryBinding`]
/// table.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayId(u32);
entity_impl!(ArrayId, "arr");

/// Edge-parameter ids are nonnegative for real operand edges (the operand
/// slot on the consumer instruction); the synthetic dependence kinds are
/// negative sentinels, matching §3's "Program Graph invariants".
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum EdgeKind {
    /// Ordinary data-dependence edge; the payload is the operand slot
    /// (1-based, matching the trace's parameter numbering) on the consumer.
    Operand(u32),
    Control,
    Register,
    Memory,
    FusedBranch,
}

impl EdgeKind {
    /// Same-cycle completion is permitted across a `REGISTER_EDGE`; every
    /// other edge kind forces the consumer to start no earlier than the
    /// producer's next cycle (§4.5 step 3, §5 ordering guarantees).
    pub fn is_same_cycle(&self) -> bool {
        matches!(self, EdgeKind::Register)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EdgeKind::Operand(slot) => write!(f, "operand{slot}"),
            EdgeKind::Control => write!(f, "CONTROL_EDGE"),
            EdgeKind::Register => write!(f, "REGISTER_EDGE"),
            EdgeKind::Memory => write!(f, "MEMORY_EDGE"),
            EdgeKind::FusedBranch => write!(f, "FUSED_BRANCH_EDGE"),
        }
    }
}

/// A function plus an invocation index: how many times that function has
/// been entered so far. This is the unit of call-site identity the builder
/// pushes onto its active-method stack.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct DynamicFunction {
    pub func: FuncId,
    pub invocation: u32,
}

/// `(DynamicFunction, Variable)` — the unit of SSA-like register identity
/// used to resolve RAW dependencies within one function invocation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct DynamicVariable {
    pub function: DynamicFunction,
    pub var: VarId,
}
