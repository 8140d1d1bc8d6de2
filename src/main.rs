#![forbid(unsafe_code)]

//! `spawner-harness` — child-process fixtures for testing a process supervisor.
//!
//! Protocol drivers (`pipe`, `step`, `wait`) speak the agent pipe protocol on
//! stdout/stdin and report on stderr. The remaining commands are plain stdio
//! fixtures. The exit code is part of each command's contract.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use spawner_harness::diagnostics::writer::JsonlSessionLog;
use spawner_harness::diagnostics::DiagnosticsReporter;
use spawner_harness::driver::step::INVALID_OPCODE_EXIT;
use spawner_harness::driver::{announce_waits, clamp_count, Sequencer, StepContext, StepDriver};
use spawner_harness::fixtures::{judge, memory, stream};
use spawner_harness::{AppError, HarnessConfig, Result};

/// Exit code for harness failures (bad config, broken streams).
const FAILURE_EXIT: i32 = 2;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "spawner-harness",
    about = "Agent pipe protocol drivers and stdio fixtures",
    version,
    long_about = None
)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Append logs to this file instead of stderr.
    ///
    /// Logging is off unless `RUST_LOG` is set.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Judge agents in order: wait, probe, expect the echo, then terminate.
    Pipe {
        /// Agent ids, processed strictly in the given order.
        agent_ids: Vec<u32>,
    },

    /// Execute single-step opcodes (0-7) in order; exits with the last one.
    Step {
        /// Opcodes; anything outside 0-7 aborts with exit code -1.
        #[arg(allow_hyphen_values = true)]
        opcodes: Vec<String>,
    },

    /// Announce agents 1..=COUNT as waiting, then hold the pipe open.
    Wait {
        /// Number of agents to announce; zero or negative announces none.
        #[arg(allow_negative_numbers = true)]
        count: Option<i64>,
        /// Delay before exiting, in milliseconds.
        delay_ms: Option<u64>,
    },

    /// Copy stdin to stdout, or print the given texts without newlines.
    Echo {
        /// Text written to stdout instead of copying stdin.
        text: Option<String>,
        /// Text written to stderr.
        err_text: Option<String>,
    },

    /// Interleave stdin and a file onto stdout, byte by byte.
    CatFile {
        /// File to interleave.
        path: PathBuf,
    },

    /// Close stdout, then sleep.
    CloseStdout {
        /// Sleep duration in (fractional) seconds.
        seconds: Option<f64>,
    },

    /// Allocate, touch and free memory blocks.
    Alloc {
        /// Number of blocks.
        #[arg(long, default_value_t = memory::DEFAULT_BLOCKS)]
        blocks: usize,
        /// Size of each block in bytes.
        #[arg(long, default_value_t = memory::DEFAULT_BLOCK_BYTES)]
        block_size: usize,
    },

    /// Compare the first integers of input, output and answer files.
    Compare {
        /// Input file.
        input: PathBuf,
        /// Contestant output file.
        output: PathBuf,
        /// Reference answer file.
        answer: PathBuf,
    },

    /// Interactive judge: ask each input integer, expect it repeated.
    Judge {
        /// File of integers to ask.
        #[arg(long, default_value = "input.txt")]
        input: PathBuf,
        /// File receiving the result code.
        #[arg(long, default_value = "output.txt")]
        output: PathBuf,
    },
}

fn main() {
    let args = Cli::parse();

    let code = match bootstrap(args) {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "spawner-harness failed");
            eprintln!("error: {err}");
            FAILURE_EXIT
        }
    };

    std::process::exit(code);
}

fn bootstrap(args: Cli) -> Result<i32> {
    init_tracing(args.log_format, args.log_file.as_deref())?;

    let config = match &args.config {
        Some(path) => HarnessConfig::load_from_path(path)?,
        None => HarnessConfig::default(),
    };
    info!(command = ?args.command, "spawner-harness start");

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args.command, config))
}

async fn run(command: Command, config: HarnessConfig) -> Result<i32> {
    match command {
        Command::Pipe { agent_ids } => {
            let mut diagnostics = DiagnosticsReporter::new(tokio::io::stderr());
            if let Some(path) = &config.session_log_path {
                diagnostics = diagnostics.with_sink(Box::new(JsonlSessionLog::open(path)?));
            }

            let mut sequencer = Sequencer::new(
                &config,
                tokio::io::stdin(),
                tokio::io::stdout(),
                diagnostics,
            );
            let summary = sequencer.run(&agent_ids).await?;
            Ok(summary.exit_code())
        }

        Command::Step { opcodes } => {
            let mut driver = StepDriver::new(
                &config,
                tokio::io::stdin(),
                tokio::io::stdout(),
                tokio::io::stderr(),
            );
            let mut ctx = StepContext::default();
            match driver.run(&mut ctx, &opcodes).await {
                Ok(code) => Ok(code),
                Err(AppError::InvalidOpcode(_)) => Ok(INVALID_OPCODE_EXIT),
                Err(err) => Err(err),
            }
        }

        Command::Wait { count, delay_ms } => {
            let Some(count) = count else {
                return Ok(0);
            };
            let delay = delay_ms.map_or_else(|| config.wait_delay(), Duration::from_millis);
            announce_waits(tokio::io::stdout(), clamp_count(count), delay).await?;
            Ok(0)
        }

        Command::Echo { text, err_text } => {
            match text {
                Some(text) => {
                    stream::print_texts(
                        &text,
                        err_text.as_deref(),
                        tokio::io::stdout(),
                        tokio::io::stderr(),
                    )
                    .await?;
                }
                None => {
                    stream::echo(tokio::io::stdin(), tokio::io::stdout()).await?;
                }
            }
            Ok(0)
        }

        Command::CatFile { path } => {
            stream::cat_file(tokio::io::stdin(), &path, tokio::io::stdout()).await?;
            Ok(0)
        }

        Command::CloseStdout { seconds } => {
            stream::close_stdout(seconds.unwrap_or_default()).await?;
            Ok(0)
        }

        Command::Alloc { blocks, block_size } => {
            let total = memory::churn_allocations(blocks, block_size);
            info!(total, "alloc: done");
            Ok(0)
        }

        Command::Compare {
            input,
            output,
            answer,
        } => {
            let outcome = judge::compare_files(&input, &output, &answer).await?;
            Ok(outcome.exit_code())
        }

        Command::Judge { input, output } => {
            judge::interactive_judge(&input, &output, tokio::io::stdin(), tokio::io::stdout())
                .await?;
            Ok(0)
        }
    }
}

fn init_tracing(log_format: LogFormat, log_file: Option<&Path>) -> Result<()> {
    // stdout and stderr carry the protocol, so logging stays off by default.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));

    let writer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| {
                    AppError::Config(format!("cannot open log file {}: {err}", path.display()))
                })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(false);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
