//! Trace record parsing: one logical record per dynamic instruction,
//! preceded by parameter lines and followed by an optional result line
//! (§6 "Trace format").

use crate::error::TraceError;

#[derive(Debug, Clone, PartialEq)]
pub struct InstructionHeader {
    pub line_num: u32,
    pub function: String,
    pub basic_block: String,
    pub instruction: String,
    pub opcode: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperandLine {
    /// Operand slot, 1-based, matching the trace's own numbering.
    pub slot: u32,
    pub type_name: String,
    pub size_bits: u32,
    pub is_reg: bool,
    pub register_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultLine {
    pub type_name: String,
    pub size_bits: u32,
    pub is_reg: bool,
    pub register_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryLine {
    pub address: u64,
    pub size_bits: u32,
}

/// One parsed line of the trace (§6 table of header kinds).
#[derive(Debug, Clone, PartialEq)]
pub enum TraceLine {
    Instruction(InstructionHeader),
    Operand(OperandLine),
    Result(ResultLine),
    Memory(MemoryLine),
}

fn parse_u32(field: &str, line: u64, what: &str) -> Result<u32, TraceError> {
    field.trim().parse::<u32>().map_err(|_| TraceError::MalformedLine {
        line,
        detail: format!("expected an integer for {what}, got {field:?}"),
    })
}

fn parse_u64_any_base(field: &str, line: u64, what: &str) -> Result<u64, TraceError> {
    let field = field.trim();
    let parsed = if let Some(hex) = field.strip_prefix("0x").or_else(|| field.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        field.parse::<u64>()
    };
    parsed.map_err(|_| TraceError::MalformedLine {
        line,
        detail: format!("expected an address for {what}, got {field:?}"),
    })
}

fn parse_bool01(field: &str, line: u64, what: &str) -> Result<bool, TraceError> {
    match field.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(TraceError::MalformedLine {
            line,
            detail: format!("expected 0 or 1 for {what}, got {other:?}"),
        }),
    }
}

/// Parse one raw trace line into a [`TraceLine`]. `line_no` is the 1-based
/// source line, used to report malformed-line errors (§7).
pub fn parse_line(raw: &str, line_no: u64) -> Result<TraceLine, TraceError> {
    let raw = raw.trim_end();
    let mut fields = raw.split(',');
    let tag = fields.next().ok_or_else(|| TraceError::MalformedLine {
        line: line_no,
        detail: "empty line".to_string(),
    })?;

    let rest: Vec<&str> = fields.collect();

    match tag {
        "0" => {
            if rest.len() != 5 {
                return Err(TraceError::MalformedLine {
                    line: line_no,
                    detail: format!("instruction header expects 5 fields, got {}", rest.len()),
                });
            }
            Ok(TraceLine::Instruction(InstructionHeader {
                line_num: parse_u32(rest[0], line_no, "line_num")?,
                function: rest[1].to_string(),
                basic_block: rest[2].to_string(),
                instruction: rest[3].to_string(),
                opcode: rest[4].to_string(),
            }))
        }
        "r" => {
            if rest.len() != 4 {
                return Err(TraceError::MalformedLine {
                    line: line_no,
                    detail: format!("result line expects 4 fields, got {}", rest.len()),
                });
            }
            Ok(TraceLine::Result(ResultLine {
                type_name: rest[0].to_string(),
                size_bits: parse_u32(rest[1], line_no, "size")?,
                is_reg: parse_bool01(rest[2], line_no, "is_reg")?,
                register_name: rest[3].to_string(),
            }))
        }
        "m" => {
            if rest.len() != 2 {
                return Err(TraceError::MalformedLine {
                    line: line_no,
                    detail: format!("memory line expects 2 fields, got {}", rest.len()),
                });
            }
            Ok(TraceLine::Memory(MemoryLine {
                address: parse_u64_any_base(rest[0], line_no, "address")?,
                size_bits: parse_u32(rest[1], line_no, "size")?,
            }))
        }
        digits if digits.chars().all(|c| c.is_ascii_digit()) && !digits.is_empty() => {
            if rest.len() != 4 {
                return Err(TraceError::MalformedLine {
                    line: line_no,
                    detail: format!("operand line expects 4 fields, got {}", rest.len()),
                });
            }
            let slot = parse_u32(digits, line_no, "operand slot")?;
            Ok(TraceLine::Operand(OperandLine {
                slot,
                type_name: rest[0].to_string(),
                size_bits: parse_u32(rest[1], line_no, "size")?,
                is_reg: parse_bool01(rest[2], line_no, "is_reg")?,
                register_name: rest[3].to_string(),
            }))
        }
        other => Err(TraceError::UnknownTag { line: line_no, tag: other.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_instruction_header() {
        let line = parse_line("0,12,main,entry,%add1,add", 1).unwrap();
        match line {
            TraceLine::Instruction(h) => {
                assert_eq!(h.line_num, 12);
                assert_eq!(h.function, "main");
                assert_eq!(h.basic_block, "entry");
                assert_eq!(h.instruction, "%add1");
                assert_eq!(h.opcode, "add");
            }
            _ => panic!("expected instruction header"),
        }
    }

    #[test]
    fn parses_operand_and_result_lines() {
        let op = parse_line("1,i32,32,1,%x", 2).unwrap();
        assert!(matches!(op, TraceLine::Operand(OperandLine { slot: 1, is_reg: true, .. })));
        let res = parse_line("r,i32,32,1,%y", 3).unwrap();
        assert!(matches!(res, TraceLine::Result(ResultLine { is_reg: true, .. })));
    }

    #[test]
    fn parses_memory_line_with_hex_address() {
        let m = parse_line("m,0x1000,64", 4).unwrap();
        assert!(matches!(m, TraceLine::Memory(MemoryLine { address: 0x1000, size_bits: 64 })));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = parse_line("z,1,2", 5).unwrap_err();
        assert!(matches!(err, TraceError::UnknownTag { line: 5, .. }));
    }
}
