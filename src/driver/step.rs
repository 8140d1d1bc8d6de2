//! Single-step driver for scripted protocol probes.
//!
//! Each opcode performs one protocol action; a sequence of opcodes is
//! executed left to right and the process exit code is the value of the last
//! opcode executed.
//!
//! | Opcode | Action                                                   |
//! |--------|----------------------------------------------------------|
//! | 0      | send `<step_agent>W#`                                    |
//! | 1      | send `<step_agent>S#`                                    |
//! | 2      | send `<step_agent>#<step_payload>`                       |
//! | 3      | read one inbound line into the context                   |
//! | 4      | send `<echo_agent>#<last line>`                          |
//! | 5      | write the last line to the diagnostics stream            |
//! | 6      | send `<broadcast_agent>#<step_payload>`, then pause      |
//! | 7      | pause for the slow-responder interval                    |
//!
//! Opcode 6 always includes the pause of opcode 7. Fixture scripts depend on
//! that composite, so it is kept as an explicit two-action opcode.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::HarnessConfig;
use crate::protocol::codec::ProtocolCodec;
use crate::protocol::message::Message;
use crate::protocol::reader::LineReader;
use crate::protocol::writer::MessageWriter;
use crate::{AppError, Result};

/// Exit code for an invalid opcode, and for a run without opcodes.
pub const INVALID_OPCODE_EXIT: i32 = -1;

/// Closed set of single-step actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// 0: announce the step agent as waiting.
    AnnounceWait,
    /// 1: send a continue signal to the step agent.
    Step,
    /// 2: send the step payload to the step agent.
    SendPayload,
    /// 3: read one inbound line.
    ReadLine,
    /// 4: echo the last line back to the echo agent.
    EchoBack,
    /// 5: write the last line to the diagnostics stream.
    ReportLast,
    /// 6: send the step payload to the broadcast agent, then pause.
    BroadcastThenPause,
    /// 7: pause.
    Pause,
}

impl Opcode {
    /// Parse a command-line opcode.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidOpcode`] for anything other than the
    /// integers `0` through `7`.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "0" => Ok(Self::AnnounceWait),
            "1" => Ok(Self::Step),
            "2" => Ok(Self::SendPayload),
            "3" => Ok(Self::ReadLine),
            "4" => Ok(Self::EchoBack),
            "5" => Ok(Self::ReportLast),
            "6" => Ok(Self::BroadcastThenPause),
            "7" => Ok(Self::Pause),
            other => Err(AppError::InvalidOpcode(format!("{other:?}"))),
        }
    }

    /// Numeric value, also used as the exit code.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::AnnounceWait => 0,
            Self::Step => 1,
            Self::SendPayload => 2,
            Self::ReadLine => 3,
            Self::EchoBack => 4,
            Self::ReportLast => 5,
            Self::BroadcastThenPause => 6,
            Self::Pause => 7,
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// State carried across opcodes of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepContext {
    /// Line captured by the most recent successful [`Opcode::ReadLine`].
    pub last_message: String,
}

/// Executes opcodes against an inbound stream, a data stream and a
/// diagnostics stream.
pub struct StepDriver<R, W, D> {
    step_agent_id: u32,
    step_payload: String,
    echo_agent_id: u32,
    broadcast_agent_id: u32,
    pause: Duration,
    reader: LineReader<R>,
    out: MessageWriter<W>,
    diagnostics: MessageWriter<D>,
}

impl<R, W, D> StepDriver<R, W, D>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    D: AsyncWrite + Unpin,
{
    /// Build a driver over the given streams.
    #[must_use]
    pub fn new(config: &HarnessConfig, inbound: R, data_out: W, diagnostics: D) -> Self {
        Self {
            step_agent_id: config.step_agent_id,
            step_payload: config.step_payload.clone(),
            echo_agent_id: config.echo_agent_id,
            broadcast_agent_id: config.broadcast_agent_id,
            pause: config.slow_responder_delay(),
            reader: LineReader::with_codec(
                inbound,
                ProtocolCodec::with_max_line_bytes(config.max_line_bytes),
            ),
            out: MessageWriter::new(data_out),
            diagnostics: MessageWriter::new(diagnostics),
        }
    }

    /// Parse and execute `raw` opcodes in order.
    ///
    /// Returns the code of the last opcode executed, or
    /// [`INVALID_OPCODE_EXIT`] when `raw` is empty. Opcodes before an invalid
    /// one have already taken effect when the error is returned.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidOpcode`] on the first unknown opcode.
    /// - [`AppError::Io`] if an output stream cannot be written.
    pub async fn run<S: AsRef<str>>(&mut self, ctx: &mut StepContext, raw: &[S]) -> Result<i32> {
        let mut exit_code = INVALID_OPCODE_EXIT;

        for raw_op in raw {
            let opcode = Opcode::parse(raw_op.as_ref()).inspect_err(|err| {
                warn!(%err, "step driver: aborting on invalid opcode");
            })?;
            self.execute(ctx, opcode).await?;
            exit_code = opcode.code();
        }

        info!(exit_code, "step driver: run complete");
        Ok(exit_code)
    }

    /// Execute a single opcode.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if an output stream cannot be written.
    pub async fn execute(&mut self, ctx: &mut StepContext, opcode: Opcode) -> Result<()> {
        debug!(%opcode, "step driver: execute");

        match opcode {
            Opcode::AnnounceWait => {
                self.out
                    .send(&Message::Wait {
                        agent_id: self.step_agent_id,
                    })
                    .await
            }
            Opcode::Step => {
                self.out
                    .send(&Message::Step {
                        agent_id: self.step_agent_id,
                    })
                    .await
            }
            Opcode::SendPayload => {
                self.out
                    .send(&Message::data(self.step_agent_id, self.step_payload.clone()))
                    .await
            }
            Opcode::ReadLine => {
                self.read_into(ctx).await;
                Ok(())
            }
            Opcode::EchoBack => {
                self.out
                    .send(&Message::data(self.echo_agent_id, ctx.last_message.clone()))
                    .await
            }
            Opcode::ReportLast => self.diagnostics.send_line(ctx.last_message.clone()).await,
            Opcode::BroadcastThenPause => {
                self.out
                    .send(&Message::data(
                        self.broadcast_agent_id,
                        self.step_payload.clone(),
                    ))
                    .await?;
                self.pause().await;
                Ok(())
            }
            Opcode::Pause => {
                self.pause().await;
                Ok(())
            }
        }
    }

    /// Read one line; end-of-stream or a read failure leaves the context as is.
    async fn read_into(&mut self, ctx: &mut StepContext) {
        match self.reader.next_line().await {
            Ok(Some(line)) => ctx.last_message = line,
            Ok(None) => debug!("step driver: end-of-stream, keeping last message"),
            Err(err) => warn!(%err, "step driver: read failed, keeping last message"),
        }
    }

    async fn pause(&self) {
        tokio::time::sleep(self.pause).await;
    }
}
