//! Error types shared across the harness.

use std::fmt::{Display, Formatter};

/// Shared harness result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Harness error enumeration covering all failure modes that leave a driver.
///
/// Wrong answers and sessions cut short by end-of-stream are not errors;
/// they are recorded on the session and reported on the diagnostics channel.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Stream or file-system failure.
    Io(String),
    /// Wire line that does not decode to a protocol message.
    MalformedLine(String),
    /// Single-step opcode outside the supported set.
    InvalidOpcode(String),
    /// Session state machine misuse.
    Protocol(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::MalformedLine(msg) => write!(f, "malformed line: {msg}"),
            Self::InvalidOpcode(msg) => write!(f, "invalid opcode: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
