//! Maps the trace's textual opcode field to a [`Microop`] (§4.1 step 1).
//! The mapping is a closed table, modeled on LLVM IR mnemonics (§2 item 2).

use aladdin_ir::Microop;

pub fn opcode_to_microop(opcode: &str) -> Option<Microop> {
    Some(match opcode {
        "add" => Microop::IAdd,
        "sub" => Microop::ISub,
        "mul" => Microop::IMul,
        "udiv" | "sdiv" => Microop::IDiv,
        "fadd" => Microop::FAdd,
        "fsub" => Microop::FSub,
        "fmul" => Microop::FMul,
        "fdiv" => Microop::FDiv,
        "and" => Microop::And,
        "or" => Microop::Or,
        "xor" => Microop::Xor,
        "shl" => Microop::Shl,
        "lshr" | "ashr" => Microop::Shr,
        "icmp" => Microop::Icmp,
        "fcmp" => Microop::Fcmp,
        "load" => Microop::Load,
        "store" => Microop::Store,
        "phi" => Microop::Phi,
        "br" => Microop::Br,
        "call" => Microop::Call,
        "ret" => Microop::Ret,
        "getelementptr" => Microop::GetElementPtr,
        "dmaload" => Microop::DmaLoad,
        "dmastore" => Microop::DmaStore,
        _ => return None,
    })
}
