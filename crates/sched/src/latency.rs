//! Multicycle functional-unit latency table (§4.5, §5 "Concurrency &
//! Resource Model"). Cycle counts are the ones Aladdin's published
//! default hardware characterization uses; a target-specific model can
//! override this by carrying its own table alongside a `Config`.

use aladdin_ir::Microop;

/// Cycles a functional unit occupies after the cycle it starts in. Zero
/// means the op always retires in the same cycle it starts (§4.5 step 2);
/// callers should not call this for ops where `Microop::is_multicycle` is
/// false.
pub fn multicycle_latency(op: Microop) -> u32 {
    match op {
        Microop::IMul => 3,
        Microop::IDiv => 10,
        Microop::FAdd | Microop::FSub => 4,
        Microop::FMul => 4,
        Microop::FDiv => 12,
        Microop::SpecialMathOp(_) => 8,
        _ => 0,
    }
}
