//! Harness configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::protocol::codec::MAX_LINE_BYTES;
use crate::{AppError, Result};

/// Output stream that receives the `"0# <line>"` inbound trace.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TraceChannel {
    /// Trace lines are interleaved with protocol output on stdout.
    #[default]
    Data,
    /// Trace lines go to the diagnostics stream next to session reports.
    Diagnostics,
}

fn default_probe_payload() -> String {
    "some_message".into()
}

fn default_step_agent_id() -> u32 {
    1
}

fn default_step_payload() -> String {
    "msg".into()
}

fn default_broadcast_agent_id() -> u32 {
    999
}

fn default_slow_responder_ms() -> u64 {
    200
}

fn default_wait_delay_ms() -> u64 {
    200
}

fn default_max_line_bytes() -> usize {
    MAX_LINE_BYTES
}

/// Harness configuration parsed from an optional TOML file.
///
/// Every key has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HarnessConfig {
    /// Payload the sequencer sends and expects echoed back.
    #[serde(default = "default_probe_payload")]
    pub probe_payload: String,
    /// Agent addressed by the wait, step and data opcodes.
    #[serde(default = "default_step_agent_id")]
    pub step_agent_id: u32,
    /// Payload sent by the data and broadcast opcodes.
    #[serde(default = "default_step_payload")]
    pub step_payload: String,
    /// Agent addressed by the echo-back opcode.
    #[serde(default)]
    pub echo_agent_id: u32,
    /// Agent addressed by the broadcast opcode.
    #[serde(default = "default_broadcast_agent_id")]
    pub broadcast_agent_id: u32,
    /// Suspend interval of the slow-responder opcode, in milliseconds.
    #[serde(default = "default_slow_responder_ms")]
    pub slow_responder_ms: u64,
    /// Default trailing delay of the wait announcer, in milliseconds.
    #[serde(default = "default_wait_delay_ms")]
    pub wait_delay_ms: u64,
    /// Destination of the inbound trace.
    #[serde(default)]
    pub trace_channel: TraceChannel,
    /// Longest inbound line accepted, in bytes.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Optional JSONL file receiving one record per finalized session.
    #[serde(default)]
    pub session_log_path: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            probe_payload: default_probe_payload(),
            step_agent_id: default_step_agent_id(),
            step_payload: default_step_payload(),
            echo_agent_id: 0,
            broadcast_agent_id: default_broadcast_agent_id(),
            slow_responder_ms: default_slow_responder_ms(),
            wait_delay_ms: default_wait_delay_ms(),
            trace_channel: TraceChannel::default(),
            max_line_bytes: default_max_line_bytes(),
            session_log_path: None,
        }
    }
}

impl HarnessConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Interval suspended by the slow-responder opcode.
    #[must_use]
    pub fn slow_responder_delay(&self) -> Duration {
        Duration::from_millis(self.slow_responder_ms)
    }

    /// Default trailing delay of the wait announcer.
    #[must_use]
    pub fn wait_delay(&self) -> Duration {
        Duration::from_millis(self.wait_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.probe_payload.is_empty() {
            return Err(AppError::Config("probe_payload must not be empty".into()));
        }

        for (key, value) in [
            ("probe_payload", &self.probe_payload),
            ("step_payload", &self.step_payload),
        ] {
            if value.contains(['\n', '\r']) {
                return Err(AppError::Config(format!(
                    "{key} must not contain a line terminator"
                )));
            }
        }

        if self.max_line_bytes == 0 {
            return Err(AppError::Config(
                "max_line_bytes must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
