//! Errors raised while applying the optimization pipeline (§4.4, §7).

use aladdin_ir::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PassError {
    #[error("{pass}: loop reference {function}:{label} does not resolve to a known label")]
    UnknownLoopLabel { pass: &'static str, function: String, label: String },

    #[error("{pass}: array {array:?} named in config has no observed memory access")]
    UnknownArray { pass: &'static str, array: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}
