//! Protocol drivers.
//!
//! - `sequencer`: judges one or more agents in order over a shared stream.
//! - `step`: executes scripted single-step opcodes.
//! - `announce`: emits wait notifications only.
//!
//! Each driver owns its streams exclusively and runs on the calling task;
//! agents are never driven concurrently within one driver.

pub mod announce;
pub mod sequencer;
pub mod step;

pub use announce::{announce_waits, clamp_count};
pub use sequencer::{RunSummary, Sequencer};
pub use step::{Opcode, StepContext, StepDriver};
