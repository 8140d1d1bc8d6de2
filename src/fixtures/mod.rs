//! Minimal stdio children used alongside the protocol drivers when testing a
//! supervisor: pass-through, closed pipes, memory pressure and judges.

pub mod judge;
pub mod memory;
pub mod stream;
