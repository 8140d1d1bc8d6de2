//! Agent pipe protocol: line framing, message encoding and stream I/O.
//!
//! - `message`: [`Message`](message::Message) and the `encode`/`decode` pair.
//! - `codec`: newline framing that never fails on line content.
//! - `reader`: sequential inbound line reads with end-of-stream tracking.
//! - `writer`: outbound lines, flushed after every write.

pub mod codec;
pub mod message;
pub mod reader;
pub mod writer;

pub use message::{decode, encode, Message, Tag};
