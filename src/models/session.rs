//! Agent session state machine.
//!
//! A session starts `Active` with a `Pending` verdict. Every inbound data
//! reply re-evaluates the verdict (`Ok`/`Fail`); the verdict is only final
//! once the agent's terminate message arrives. End-of-stream before that
//! finalizes the session as `Unterminated`. Both final phases are absorbing.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::protocol::message::{decode, Message};
use crate::{AppError, Result};

/// Error message recorded for an empty reply.
pub const EMPTY_REPLY: &str = "empty message (or end-of-stream)";

/// Prefix of the error message recorded for a reply other than the probe.
pub const WRONG_ANSWER_PREFIX: &str = "wrong answer: ";

/// Error message recorded when input ends before the terminate message.
pub const UNTERMINATED_REASON: &str = "end-of-stream before terminate";

/// Interim judgement of the agent's replies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// No reply judged yet.
    Pending,
    /// Last reply matched the probe.
    Ok,
    /// Last reply did not match the probe.
    Fail,
}

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Still consuming inbound lines.
    Active,
    /// Terminate message observed.
    Terminated,
    /// Input ended before the terminate message.
    Unterminated,
}

/// Status written to the diagnostics channel for a finalized session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    /// Terminated after a matching reply.
    Ok,
    /// Terminated after a wrong reply.
    Fail,
    /// Terminated before any reply was judged.
    Terminated,
    /// Input ended before the terminate message.
    Unterminated,
}

impl ReportStatus {
    /// Wire spelling used on the diagnostics channel.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Fail => "FAIL",
            Self::Terminated => "TERMINATED",
            Self::Unterminated => "UNTERMINATED",
        }
    }
}

impl Display for ReportStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effect of one inbound line on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Line did not concern this session's state.
    Ignored,
    /// Reply judged; the verdict is interim.
    Judged(Verdict),
    /// Terminate message observed; the session is final.
    Terminated,
}

/// Per-agent protocol session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSession {
    id: u32,
    expected_echo: String,
    verdict: Verdict,
    phase: SessionPhase,
    error_message: Option<String>,
}

impl AgentSession {
    /// Start a session for agent `id` expecting `expected_echo` as the reply.
    #[must_use]
    pub fn new(id: u32, expected_echo: impl Into<String>) -> Self {
        Self {
            id,
            expected_echo: expected_echo.into(),
            verdict: Verdict::Pending,
            phase: SessionPhase::Active,
            error_message: None,
        }
    }

    /// Agent id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Payload the agent is expected to echo.
    #[must_use]
    pub fn expected_echo(&self) -> &str {
        &self.expected_echo
    }

    /// Current verdict.
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether the session reached an absorbing phase.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.phase != SessionPhase::Active
    }

    /// Error message relevant to the reported status, if any.
    ///
    /// A wrong answer followed by a matching one is no longer reported.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match (self.phase, self.verdict) {
            (SessionPhase::Unterminated, _) => Some(UNTERMINATED_REASON),
            (_, Verdict::Fail) => self.error_message.as_deref(),
            _ => None,
        }
    }

    /// Status to report, or `None` while the session is still active.
    #[must_use]
    pub fn report_status(&self) -> Option<ReportStatus> {
        match (self.phase, self.verdict) {
            (SessionPhase::Active, _) => None,
            (SessionPhase::Unterminated, _) => Some(ReportStatus::Unterminated),
            (SessionPhase::Terminated, Verdict::Pending) => Some(ReportStatus::Terminated),
            (SessionPhase::Terminated, Verdict::Ok) => Some(ReportStatus::Ok),
            (SessionPhase::Terminated, Verdict::Fail) => Some(ReportStatus::Fail),
        }
    }

    /// Feed one raw inbound line.
    ///
    /// - `<id>T#` for this agent finalizes the session.
    /// - `<id>#<payload>` for this agent is judged against the probe.
    /// - An empty line is judged as an empty reply.
    /// - A line that does not decode is judged as a wrong answer carrying the
    ///   raw line, so the offending text reaches the report.
    /// - Anything addressed to another agent, and wait/step chatter from this
    ///   agent, is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if the session is already finalized.
    pub fn observe_line(&mut self, line: &str) -> Result<Transition> {
        self.ensure_active()?;

        if line.is_empty() {
            return Ok(Transition::Judged(self.judge("")));
        }

        match decode(line) {
            Ok(msg) => self.observe(&msg),
            Err(err) => {
                warn!(agent_id = self.id, %err, raw_line = line, "session: undecodable reply");
                Ok(Transition::Judged(self.fail(format!("{WRONG_ANSWER_PREFIX}{line}"))))
            }
        }
    }

    /// Feed one decoded inbound message.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if the session is already finalized.
    pub fn observe(&mut self, msg: &Message) -> Result<Transition> {
        self.ensure_active()?;

        if msg.agent_id() != self.id {
            debug!(
                agent_id = self.id,
                addressee = msg.agent_id(),
                "session: ignoring message for another agent"
            );
            return Ok(Transition::Ignored);
        }

        match msg {
            Message::Terminate { .. } => {
                self.phase = SessionPhase::Terminated;
                Ok(Transition::Terminated)
            }
            Message::Data { payload, .. } => Ok(Transition::Judged(self.judge(payload))),
            Message::Wait { .. } | Message::Step { .. } => Ok(Transition::Ignored),
        }
    }

    /// Finalize after end-of-stream without a terminate message.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if the session is already finalized.
    pub fn end_of_stream(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.phase = SessionPhase::Unterminated;
        Ok(())
    }

    fn judge(&mut self, payload: &str) -> Verdict {
        if payload == self.expected_echo {
            self.verdict = Verdict::Ok;
            return self.verdict;
        }

        if payload.is_empty() {
            self.fail(EMPTY_REPLY.to_owned())
        } else {
            self.fail(format!("{WRONG_ANSWER_PREFIX}{payload}"))
        }
    }

    fn fail(&mut self, message: String) -> Verdict {
        self.verdict = Verdict::Fail;
        self.error_message = Some(message);
        self.verdict
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_finalized() {
            return Err(AppError::Protocol(format!(
                "session for agent {} is already finalized",
                self.id
            )));
        }
        Ok(())
    }
}
