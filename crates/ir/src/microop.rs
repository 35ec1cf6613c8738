//! The microop enumeration: a closed set modeled on LLVM IR opcodes, plus the
//! synthetic opcodes the optimization pipeline introduces (§2 item 2).

use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Microop {
    IAdd,
    ISub,
    IMul,
    IDiv,
    FAdd,
    FSub,
    FMul,
    FDiv,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Icmp,
    Fcmp,
    Load,
    Store,
    Phi,
    Br,
    Call,
    Ret,
    GetElementPtr,
    /// Zero-latency induction-variable add; rewritten from `IAdd` by
    /// `removeInductionDependence`.
    IndexAdd,
    DmaLoad,
    DmaStore,
    /// Synthetic serialization point for DMA traffic (§4.1 step 8).
    DmaFence,
    /// A tagged math intrinsic call (sqrt, exp, log, ...).
    SpecialMathOp(SpecialMath),
    /// An opaque call whose callee is not in the intrinsic whitelist.
    OpaqueCall,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SpecialMath {
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
    Pow,
}

impl SpecialMath {
    /// The closed whitelist of math intrinsics the builder recognizes
    /// (§4.1 step 6, §9 "Intrinsic dispatch"). Returns `None` for anything
    /// not on the list, which the builder then leaves as an opaque call.
    pub fn from_callee_name(name: &str) -> Option<Self> {
        // Match the bare symbol and the common `llvm.<name>.fNN` spelling.
        let base = name.rsplit('.').nth(1).unwrap_or(name);
        let base = base.trim_start_matches("llvm.");
        match base {
            "sqrt" => Some(Self::Sqrt),
            "exp" => Some(Self::Exp),
            "log" => Some(Self::Log),
            "sin" => Some(Self::Sin),
            "cos" => Some(Self::Cos),
            "pow" => Some(Self::Pow),
            _ => match name {
                "sqrt" | "sqrtf" => Some(Self::Sqrt),
                "exp" | "expf" => Some(Self::Exp),
                "log" | "logf" => Some(Self::Log),
                "sin" | "sinf" => Some(Self::Sin),
                "cos" | "cosf" => Some(Self::Cos),
                "pow" | "powf" => Some(Self::Pow),
                _ => None,
            },
        }
    }
}

/// The memcpy/memmove/memset family, rewritten to paired DMA nodes rather
/// than a `SpecialMathOp` (§4.1 step 6).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MemIntrinsic {
    Memcpy,
    Memmove,
    Memset,
}

impl MemIntrinsic {
    pub fn from_callee_name(name: &str) -> Option<Self> {
        if name.contains("memcpy") {
            Some(Self::Memcpy)
        } else if name.contains("memmove") {
            Some(Self::Memmove)
        } else if name.contains("memset") {
            Some(Self::Memset)
        } else {
            None
        }
    }
}

impl Microop {
    pub fn is_memory_op(&self) -> bool {
        matches!(
            self,
            Microop::Load | Microop::Store | Microop::DmaLoad | Microop::DmaStore
        )
    }

    pub fn is_load(&self) -> bool {
        matches!(self, Microop::Load | Microop::DmaLoad)
    }

    pub fn is_store(&self) -> bool {
        matches!(self, Microop::Store | Microop::DmaStore)
    }

    pub fn is_dma(&self) -> bool {
        matches!(self, Microop::DmaLoad | Microop::DmaStore)
    }

    pub fn is_float(&self) -> bool {
        matches!(
            self,
            Microop::FAdd | Microop::FSub | Microop::FMul | Microop::FDiv | Microop::Fcmp
        )
    }

    /// Microops the `treeHeightReduction` pass is allowed to rebalance
    /// because they are associative and commutative (§4.4 pass 12).
    pub fn is_associative_commutative(&self) -> bool {
        matches!(self, Microop::IAdd | Microop::FAdd | Microop::And | Microop::Or | Microop::Xor)
    }

    pub fn is_multicycle(&self) -> bool {
        matches!(
            self,
            Microop::IMul
                | Microop::IDiv
                | Microop::FAdd
                | Microop::FSub
                | Microop::FMul
                | Microop::FDiv
                | Microop::SpecialMathOp(_)
        )
    }
}

impl fmt::Display for Microop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Microop::SpecialMathOp(m) => write!(f, "SpecialMathOp({m:?})"),
            other => write!(f, "{other:?}"),
        }
    }
}
