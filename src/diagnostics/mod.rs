//! Session outcome reporting on the diagnostics channel.
//!
//! Each finalized session produces exactly one [`SessionReport`]. The report
//! is written to the diagnostics stream as `<id><STATUS>[ <error>]`, kept in
//! the in-memory session log, and optionally appended to a [`SessionLog`]
//! sink such as [`writer::JsonlSessionLog`].

pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWrite;
use tracing::{info, warn};

use crate::models::session::{AgentSession, ReportStatus};
use crate::protocol::writer::MessageWriter;
use crate::{AppError, Result};

/// Outcome of one finalized session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionReport {
    /// Time the session was finalized.
    pub timestamp: DateTime<Utc>,
    /// Agent id.
    pub agent_id: u32,
    /// Reported status.
    pub status: ReportStatus,
    /// Error context: the offending payload or the end-of-stream reason.
    pub error_message: Option<String>,
}

impl SessionReport {
    /// Build the report of a finalized session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Protocol`] if the session is still active.
    pub fn from_session(session: &AgentSession) -> Result<Self> {
        let status = session.report_status().ok_or_else(|| {
            AppError::Protocol(format!(
                "session for agent {} is not finalized",
                session.id()
            ))
        })?;

        Ok(Self {
            timestamp: Utc::now(),
            agent_id: session.id(),
            status,
            error_message: session.error_message().map(str::to_owned),
        })
    }

    /// Diagnostics line, without the trailing newline.
    #[must_use]
    pub fn line(&self) -> String {
        match &self.error_message {
            Some(msg) => format!("{}{} {msg}", self.agent_id, self.status),
            None => format!("{}{}", self.agent_id, self.status),
        }
    }
}

/// Persistent sink for session reports.
pub trait SessionLog: Send + Sync {
    /// Append one report.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be persisted.
    fn append(&self, report: &SessionReport) -> Result<()>;
}

/// Writes session reports to the diagnostics stream.
pub struct DiagnosticsReporter<D> {
    out: MessageWriter<D>,
    sink: Option<Box<dyn SessionLog>>,
    reports: Vec<SessionReport>,
}

impl<D> DiagnosticsReporter<D>
where
    D: AsyncWrite + Unpin,
{
    /// Report to `out` only.
    #[must_use]
    pub fn new(out: D) -> Self {
        Self {
            out: MessageWriter::new(out),
            sink: None,
            reports: Vec::new(),
        }
    }

    /// Additionally append every report to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn SessionLog>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Report a finalized session.
    ///
    /// A failing [`SessionLog`] sink is logged and does not fail the report;
    /// the diagnostics stream is the contract, the sink is a copy.
    ///
    /// # Errors
    ///
    /// - [`AppError::Protocol`] if the session is still active.
    /// - [`AppError::Io`] if the diagnostics stream cannot be written.
    pub async fn report(&mut self, session: &AgentSession) -> Result<SessionReport> {
        let report = SessionReport::from_session(session)?;
        info!(
            agent_id = report.agent_id,
            status = %report.status,
            error = report.error_message.as_deref().unwrap_or(""),
            "session finalized"
        );

        self.out.send_line(report.line()).await?;

        if let Some(sink) = &self.sink {
            if let Err(err) = sink.append(&report) {
                warn!(agent_id = report.agent_id, %err, "session log append failed");
            }
        }

        self.reports.push(report.clone());
        Ok(report)
    }

    /// Write a free-form line to the diagnostics stream.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the diagnostics stream cannot be written.
    pub async fn write_line(&mut self, line: impl Into<String>) -> Result<()> {
        self.out.send_line(line).await
    }

    /// Reports written so far, in finalization order.
    #[must_use]
    pub fn reports(&self) -> &[SessionReport] {
        &self.reports
    }
}
