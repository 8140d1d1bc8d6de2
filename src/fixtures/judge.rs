//! Checker and interactor fixtures.
//!
//! `compare_files` is a three-file checker: the first integer of the input,
//! of the contestant output and of the reference answer. `interactive_judge`
//! plays question/answer with a child over stdio, recording the result in an
//! output file.

use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::protocol::reader::LineReader;
use crate::protocol::writer::MessageWriter;
use crate::{AppError, Result};

/// Outcome of [`compare_files`], mapped to the checker exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOutcome {
    /// Output matches the input (exit 0).
    Accepted,
    /// Output differs from the input (exit 1).
    WrongOutput,
    /// Reference answer differs from the input (exit 3).
    BadAnswer,
}

impl CompareOutcome {
    /// Checker exit code.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Accepted => 0,
            Self::WrongOutput => 1,
            Self::BadAnswer => 3,
        }
    }
}

/// Compare the first integers of three files.
///
/// A broken reference answer takes precedence over a wrong output.
///
/// # Errors
///
/// Returns [`AppError::Io`] if a file cannot be read and
/// [`AppError::MalformedLine`] if it does not start with an integer.
pub async fn compare_files(input: &Path, output: &Path, answer: &Path) -> Result<CompareOutcome> {
    let expected = first_integer(input).await?;
    let produced = first_integer(output).await?;
    let reference = first_integer(answer).await?;

    let outcome = if reference != expected {
        CompareOutcome::BadAnswer
    } else if produced != expected {
        CompareOutcome::WrongOutput
    } else {
        CompareOutcome::Accepted
    };

    info!(expected, produced, reference, ?outcome, "compare: done");
    Ok(outcome)
}

/// Result of an interactive judging session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JudgeVerdict {
    /// Every question was answered correctly.
    Accepted {
        /// Number of questions asked.
        rounds: usize,
    },
    /// A reply did not repeat the question.
    Rejected {
        /// Question asked.
        expected: i64,
        /// Reply received; `None` for end-of-stream or a non-integer reply.
        got: Option<i64>,
    },
}

impl JudgeVerdict {
    /// Value written to the result file.
    #[must_use]
    pub fn result_code(&self) -> i32 {
        match self {
            Self::Accepted { .. } => 0,
            Self::Rejected { .. } => 1,
        }
    }
}

/// Ask every integer of `input_path` over `questions` and expect it repeated
/// on `answers`.
///
/// On the first wrong reply `1` is written to `output_path` and judging stops.
/// When all questions are answered, `0` is sent to the child and written to
/// `output_path`.
///
/// # Errors
///
/// - [`AppError::Io`] if a file or stream fails.
/// - [`AppError::MalformedLine`] if the input file contains a non-integer.
pub async fn interactive_judge<R, W>(
    input_path: &Path,
    output_path: &Path,
    answers: R,
    questions: W,
) -> Result<JudgeVerdict>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let raw = read_file(input_path).await?;
    let values = parse_integers(&raw, input_path)?;

    let mut answers = LineReader::new(answers);
    let mut questions = MessageWriter::new(questions);

    for &expected in &values {
        questions.send_line(expected.to_string()).await?;

        let got = match answers.next_line().await {
            Ok(Some(line)) => line.trim().parse::<i64>().ok(),
            Ok(None) => None,
            Err(err) => {
                debug!(%err, "judge: reply unreadable");
                None
            }
        };

        if got != Some(expected) {
            let verdict = JudgeVerdict::Rejected { expected, got };
            write_result(output_path, &verdict).await?;
            info!(?verdict, "judge: rejected");
            return Ok(verdict);
        }
    }

    questions.send_line("0").await?;
    let verdict = JudgeVerdict::Accepted {
        rounds: values.len(),
    };
    write_result(output_path, &verdict).await?;
    info!(?verdict, "judge: accepted");
    Ok(verdict)
}

async fn first_integer(path: &Path) -> Result<i64> {
    let raw = read_file(path).await?;
    parse_integers(&raw, path)?
        .first()
        .copied()
        .ok_or_else(|| AppError::MalformedLine(format!("{}: no integer", path.display())))
}

fn parse_integers(raw: &str, path: &Path) -> Result<Vec<i64>> {
    raw.split_whitespace()
        .map(|token| {
            token.parse::<i64>().map_err(|e| {
                AppError::MalformedLine(format!("{}: {token:?}: {e}", path.display()))
            })
        })
        .collect()
}

async fn read_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::Io(format!("cannot read {}: {e}", path.display())))
}

async fn write_result(path: &Path, verdict: &JudgeVerdict) -> Result<()> {
    tokio::fs::write(path, format!("{}\n", verdict.result_code()))
        .await
        .map_err(|e| AppError::Io(format!("cannot write {}: {e}", path.display())))
}
