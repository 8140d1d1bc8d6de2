#![forbid(unsafe_code)]

//! Drivers and fixtures for the agent pipe protocol spoken between a process
//! supervisor and the agents it spawns.

pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod errors;
pub mod fixtures;
pub mod models;
pub mod protocol;

pub use config::HarnessConfig;
pub use errors::{AppError, Result};
