//! Trace-parse and configuration errors (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {line}: malformed trace record: {detail}")]
    MalformedLine { line: u64, detail: String },

    #[error("line {line}: unknown record tag {tag:?}")]
    UnknownTag { line: u64, tag: String },

    #[error("line {line}: operand refers to undefined register {register:?} in function {function:?}")]
    UndefinedRegister { line: u64, function: String, register: String },

    #[error("failed to read trace: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("line {line}: unknown configuration kind {kind:?}")]
    UnknownKind { line: u64, kind: String },

    #[error("line {line}: malformed configuration entry: {detail}")]
    Malformed { line: u64, detail: String },

    #[error("configuration references unknown array {0:?}")]
    UnknownArray(String),

    #[error("configuration references unknown loop label ({function:?}, {label:?})")]
    UnknownLoopLabel { function: String, label: String },

    #[error("partition factor {factor} x word size {word_size} exceeds total size {total_size} for array {array:?}")]
    IncompatiblePartitionFactor { array: String, factor: u32, word_size: u32, total_size: u32 },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}
