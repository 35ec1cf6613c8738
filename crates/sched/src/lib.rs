//! The event-driven scheduler, external memory interface, and reporter
//! (§4.5, §4.6). Consumes the `ProgramGraph` and `MemoryBindingTable` the
//! other two crates produce; has no notion of traces or graph rewrites of
//! its own.

pub mod alap;
pub mod error;
pub mod latency;
pub mod memory_interface;
pub mod reporter;
pub mod scheduler;

pub use error::SchedError;
pub use memory_interface::mock::FixedLatencyMemory;
pub use memory_interface::MemorySubsystem;
pub use reporter::{DefaultPowerModel, PowerModel, Reporter};
pub use scheduler::{AggregateStats, CycleActivity, Scheduler, DEFAULT_DEADLOCK_THRESHOLD};
