//! Multi-agent sequencer.
//!
//! Drives one [`AgentSession`] at a time over a shared duplex stream:
//!
//! 1. send `<id>W#` and `<id>#<probe>`;
//! 2. read inbound lines, tracing each as `0# <line>`;
//! 3. on `<id>T#` report the session and move to the next agent;
//! 4. on any other line judge it and send `<id>S#`.
//!
//! End-of-stream before `<id>T#` reports the session as unterminated and
//! aborts the run: no later agent can receive input anymore. Lines that are
//! not valid UTF-8 or exceed the line limit still arrive as lines and are
//! judged like any other reply.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{HarnessConfig, TraceChannel};
use crate::diagnostics::{DiagnosticsReporter, SessionReport};
use crate::models::session::{AgentSession, ReportStatus, Transition};
use crate::protocol::codec::ProtocolCodec;
use crate::protocol::message::Message;
use crate::protocol::reader::LineReader;
use crate::protocol::writer::MessageWriter;
use crate::Result;

/// Prefix of every inbound trace line.
pub const TRACE_PREFIX: &str = "0# ";

/// Result of a sequencer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// One report per finalized session, in processing order.
    pub reports: Vec<SessionReport>,
    /// Whether the run stopped early on an unterminated session.
    pub aborted: bool,
}

impl RunSummary {
    /// Process exit code: `1` for an aborted run, `0` otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(self.aborted)
    }
}

/// Sequential driver of agent sessions.
pub struct Sequencer<R, W, D> {
    probe_payload: String,
    trace_channel: TraceChannel,
    reader: LineReader<R>,
    out: MessageWriter<W>,
    diagnostics: DiagnosticsReporter<D>,
    sessions: Vec<AgentSession>,
}

impl<R, W, D> Sequencer<R, W, D>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    D: AsyncWrite + Unpin,
{
    /// Build a sequencer reading `inbound`, writing protocol lines to
    /// `data_out` and session reports through `diagnostics`.
    #[must_use]
    pub fn new(
        config: &HarnessConfig,
        inbound: R,
        data_out: W,
        diagnostics: DiagnosticsReporter<D>,
    ) -> Self {
        Self {
            probe_payload: config.probe_payload.clone(),
            trace_channel: config.trace_channel,
            reader: LineReader::with_codec(
                inbound,
                ProtocolCodec::with_max_line_bytes(config.max_line_bytes),
            ),
            out: MessageWriter::new(data_out),
            diagnostics,
            sessions: Vec::new(),
        }
    }

    /// Drive the sessions of `agent_ids`, strictly in order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AppError::Io`] if the inbound stream cannot be read
    /// or the data or diagnostics stream cannot be written. Wrong answers and unterminated sessions are part
    /// of the returned [`RunSummary`], not errors.
    pub async fn run(&mut self, agent_ids: &[u32]) -> Result<RunSummary> {
        let mut reports = Vec::with_capacity(agent_ids.len());

        for &agent_id in agent_ids {
            let span = info_span!("agent_session", agent_id);
            let report = self.drive(agent_id).instrument(span).await?;
            let unterminated = report.status == ReportStatus::Unterminated;
            reports.push(report);

            if unterminated {
                let remaining = agent_ids.len() - reports.len();
                warn!(agent_id, remaining, "sequencer: input exhausted, aborting run");
                return Ok(RunSummary {
                    reports,
                    aborted: true,
                });
            }
        }

        info!(agents = reports.len(), "sequencer: run complete");
        Ok(RunSummary {
            reports,
            aborted: false,
        })
    }

    /// Sessions driven so far, in processing order.
    #[must_use]
    pub fn sessions(&self) -> &[AgentSession] {
        &self.sessions
    }

    async fn drive(&mut self, agent_id: u32) -> Result<SessionReport> {
        let mut session = AgentSession::new(agent_id, self.probe_payload.clone());

        self.out.send(&Message::Wait { agent_id }).await?;
        self.out
            .send(&Message::data(agent_id, self.probe_payload.clone()))
            .await?;

        loop {
            let Some(line) = self.reader.next_line().await? else {
                session.end_of_stream()?;
                break;
            };

            self.trace(&line).await?;

            match session.observe_line(&line)? {
                Transition::Terminated => break,
                transition => {
                    debug!(?transition, "sequencer: reply observed");
                    self.out.send(&Message::Step { agent_id }).await?;
                }
            }
        }

        let report = self.diagnostics.report(&session).await;
        self.sessions.push(session);
        report
    }

    async fn trace(&mut self, line: &str) -> Result<()> {
        let traced = format!("{TRACE_PREFIX}{line}");
        match self.trace_channel {
            TraceChannel::Data => self.out.send_line(traced).await,
            TraceChannel::Diagnostics => self.diagnostics.write_line(traced).await,
        }
    }
}
