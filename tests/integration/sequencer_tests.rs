//! Integration tests for multi-agent sequencer runs.
//!
//! Validates:
//! - probe/echo/terminate exchanges and their diagnostics lines
//! - strict agent ordering
//! - `0# ` trace of every inbound line, in order
//! - abort on end-of-stream before terminate
//! - non-UTF-8 and over-long replies judged without ending the run
//! - a live agent answering over in-memory pipes

use tokio::io::duplex;

use spawner_harness::config::{HarnessConfig, TraceChannel};
use spawner_harness::diagnostics::writer::JsonlSessionLog;
use spawner_harness::diagnostics::DiagnosticsReporter;
use spawner_harness::driver::{RunSummary, Sequencer};
use spawner_harness::models::session::ReportStatus;
use spawner_harness::protocol::reader::LineReader;
use spawner_harness::protocol::writer::MessageWriter;
use spawner_harness::protocol::{decode, Message};

struct Run {
    summary: RunSummary,
    stdout: String,
    stderr: String,
}

async fn run_with(config: &HarnessConfig, input: &str, agent_ids: &[u32]) -> Run {
    run_bytes(config, input.as_bytes(), agent_ids).await
}

async fn run_bytes(config: &HarnessConfig, input: &[u8], agent_ids: &[u32]) -> Run {
    let mut out = Vec::new();
    let mut err = Vec::new();

    let summary = {
        let mut sequencer = Sequencer::new(
            config,
            input,
            &mut out,
            DiagnosticsReporter::new(&mut err),
        );
        sequencer.run(agent_ids).await.expect("run completes")
    };

    Run {
        summary,
        stdout: String::from_utf8(out).unwrap(),
        stderr: String::from_utf8(err).unwrap(),
    }
}

async fn run(input: &str, agent_ids: &[u32]) -> Run {
    run_with(&HarnessConfig::default(), input, agent_ids).await
}

fn traces(stdout: &str) -> Vec<&str> {
    stdout.lines().filter(|l| l.starts_with("0# ")).collect()
}

#[tokio::test]
async fn correct_echo_reports_ok() {
    let r = run("3#some_message\n3T#\n", &[3]).await;

    assert_eq!(
        r.stdout,
        "3W#\n3#some_message\n0# 3#some_message\n3S#\n0# 3T#\n"
    );
    assert_eq!(r.stderr, "3OK\n");
    assert!(!r.summary.aborted);
    assert_eq!(r.summary.exit_code(), 0);
    assert_eq!(r.summary.reports[0].status, ReportStatus::Ok);
    assert_eq!(r.summary.reports[0].error_message, None);
}

#[tokio::test]
async fn wrong_echo_reports_fail_with_payload() {
    let r = run("3#bogus\n3T#\n", &[3]).await;

    assert_eq!(r.stderr, "3FAIL wrong answer: bogus\n");
    assert_eq!(
        r.summary.reports[0].error_message.as_deref(),
        Some("wrong answer: bogus")
    );
    assert_eq!(r.summary.exit_code(), 0, "wrong answers do not abort the run");
}

#[tokio::test]
async fn empty_reply_reports_empty_message() {
    let r = run("\n3T#\n", &[3]).await;

    assert_eq!(r.stderr, "3FAIL empty message (or end-of-stream)\n");
    assert_eq!(traces(&r.stdout), vec!["0# ", "0# 3T#"]);
}

#[tokio::test]
async fn terminate_without_reply_reports_terminated() {
    let r = run("5T#\n", &[5]).await;

    assert_eq!(r.stdout, "5W#\n5#some_message\n0# 5T#\n");
    assert_eq!(r.stderr, "5TERMINATED\n");
}

#[tokio::test]
async fn end_of_stream_aborts_remaining_agents() {
    let r = run("1#some_message\n", &[1, 2]).await;

    assert!(r.summary.aborted);
    assert_eq!(r.summary.exit_code(), 1);
    assert_eq!(r.summary.reports.len(), 1);
    assert_eq!(r.summary.reports[0].status, ReportStatus::Unterminated);
    assert_eq!(
        r.stderr,
        "1UNTERMINATED end-of-stream before terminate\n"
    );
    assert!(!r.stdout.contains("2W#"), "agent 2 must never start");
}

#[tokio::test]
async fn agents_are_processed_strictly_in_order() {
    let input = "3#some_message\n3T#\n7#bogus\n7T#\n2T#\n";
    let r = run(input, &[3, 7, 2]).await;

    assert_eq!(
        r.stdout,
        concat!(
            "3W#\n3#some_message\n0# 3#some_message\n3S#\n0# 3T#\n",
            "7W#\n7#some_message\n0# 7#bogus\n7S#\n0# 7T#\n",
            "2W#\n2#some_message\n0# 2T#\n",
        )
    );
    assert_eq!(r.stderr, "3OK\n7FAIL wrong answer: bogus\n2TERMINATED\n");

    let ids: Vec<u32> = r.summary.reports.iter().map(|rep| rep.agent_id).collect();
    assert_eq!(ids, vec![3, 7, 2]);
}

#[tokio::test]
async fn every_inbound_line_is_traced_once_in_order() {
    let input = "9#some_message\n3#x\ngarbage\n3W#\n3T#\n";
    let r = run(input, &[3]).await;

    assert_eq!(
        traces(&r.stdout),
        vec!["0# 9#some_message", "0# 3#x", "0# garbage", "0# 3W#", "0# 3T#"]
    );
    assert_eq!(r.stderr, "3FAIL wrong answer: garbage\n");
    assert_eq!(
        r.stdout.matches("3S#").count(),
        4,
        "every non-terminating line is followed by a step"
    );
}

#[tokio::test]
async fn later_correct_echo_clears_failure() {
    let r = run("3#bad\n3#some_message\n3T#\n", &[3]).await;
    assert_eq!(r.stderr, "3OK\n");
}

#[tokio::test]
async fn trace_can_be_routed_to_diagnostics() {
    let config = HarnessConfig {
        trace_channel: TraceChannel::Diagnostics,
        ..HarnessConfig::default()
    };
    let r = run_with(&config, "4#some_message\n4T#\n", &[4]).await;

    assert_eq!(r.stdout, "4W#\n4#some_message\n4S#\n");
    assert_eq!(r.stderr, "0# 4#some_message\n0# 4T#\n4OK\n");
}

#[tokio::test]
async fn custom_probe_payload_is_sent_and_expected() {
    let config = HarnessConfig {
        probe_payload: "ping".into(),
        ..HarnessConfig::default()
    };
    let r = run_with(&config, "1#ping\n1T#\n", &[1]).await;

    assert!(r.stdout.starts_with("1W#\n1#ping\n"));
    assert_eq!(r.stderr, "1OK\n");
}

#[tokio::test]
async fn overlong_reply_is_truncated_and_judged() {
    let config = HarnessConfig {
        max_line_bytes: 16,
        ..HarnessConfig::default()
    };
    let input = format!("1#{}\n1T#\n2#some_message\n2T#\n", "x".repeat(64));
    let r = run_with(&config, &input, &[1, 2]).await;

    let truncated = "x".repeat(14);
    assert!(!r.summary.aborted);
    assert_eq!(
        r.stdout,
        format!(
            "1W#\n1#some_message\n0# 1#{truncated}\n1S#\n0# 1T#\n\
             2W#\n2#some_message\n0# 2#some_message\n2S#\n0# 2T#\n"
        )
    );
    assert_eq!(r.stderr, format!("1FAIL wrong answer: {truncated}\n2OK\n"));
}

#[tokio::test]
async fn non_utf8_reply_is_traced_and_judged() {
    let input: &[u8] = b"1\xff\n1T#\n2#some_message\n2T#\n";
    let r = run_bytes(&HarnessConfig::default(), input, &[1, 2]).await;

    assert!(!r.summary.aborted);
    assert_eq!(r.summary.exit_code(), 0);
    assert_eq!(
        traces(&r.stdout),
        vec!["0# 1\u{FFFD}", "0# 1T#", "0# 2#some_message", "0# 2T#"]
    );
    assert_eq!(r.stderr, "1FAIL wrong answer: 1\u{FFFD}\n2OK\n");
    assert_eq!(r.summary.reports[1].status, ReportStatus::Ok);
}

#[tokio::test]
async fn empty_agent_list_does_nothing() {
    let r = run("1#some_message\n", &[]).await;
    assert!(r.stdout.is_empty());
    assert!(r.stderr.is_empty());
    assert_eq!(r.summary.exit_code(), 0);
}

#[tokio::test]
async fn sessions_are_kept_in_processing_order() {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let input: &[u8] = b"2T#\n1T#\n";
    let mut sequencer = Sequencer::new(
        &HarnessConfig::default(),
        input,
        &mut out,
        DiagnosticsReporter::new(&mut err),
    );

    sequencer.run(&[2, 1]).await.unwrap();

    let ids: Vec<u32> = sequencer.sessions().iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec![2, 1]);
    assert!(sequencer.sessions().iter().all(|s| s.is_finalized()));
}

#[tokio::test]
async fn session_log_receives_every_report() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("sessions.jsonl");
    let log = JsonlSessionLog::open(&path).unwrap();

    let mut out = Vec::new();
    let input: &[u8] = b"1#some_message\n1T#\n2#nope\n2T#\n";
    let mut sequencer = Sequencer::new(
        &HarnessConfig::default(),
        input,
        &mut out,
        DiagnosticsReporter::new(Vec::new()).with_sink(Box::new(log)),
    );
    sequencer.run(&[1, 2]).await.unwrap();
    drop(sequencer);

    let content = std::fs::read_to_string(&path).unwrap();
    let statuses: Vec<String> = content
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["status"].to_string())
        .collect();
    assert_eq!(statuses, vec!["\"OK\"", "\"FAIL\""]);
}

/// Agent that echoes every probe it receives and terminates on each step.
async fn echo_agent(
    from_sequencer: tokio::io::DuplexStream,
    to_sequencer: tokio::io::DuplexStream,
) -> Vec<String> {
    let mut reader = LineReader::new(from_sequencer);
    let mut writer = MessageWriter::new(to_sequencer);
    let mut seen = Vec::new();

    while let Some(line) = reader.next_line().await.unwrap() {
        seen.push(line.clone());
        if line.starts_with("0# ") {
            continue;
        }
        match decode(&line).unwrap() {
            msg @ Message::Data { .. } => writer.send(&msg).await.unwrap(),
            Message::Step { agent_id } => {
                writer.send(&Message::Terminate { agent_id }).await.unwrap();
            }
            Message::Wait { .. } | Message::Terminate { .. } => {}
        }
    }

    seen
}

#[tokio::test]
async fn live_agent_exchange_over_pipes() {
    let (agent_out, sequencer_in) = duplex(1024);
    let (sequencer_out, agent_in) = duplex(1024);

    let agent = tokio::spawn(echo_agent(agent_in, agent_out));

    let mut err = Vec::new();
    let summary = {
        let mut sequencer = Sequencer::new(
            &HarnessConfig::default(),
            sequencer_in,
            sequencer_out,
            DiagnosticsReporter::new(&mut err),
        );
        sequencer.run(&[1, 2]).await.unwrap()
    };

    let seen = agent.await.unwrap();

    assert!(!summary.aborted);
    assert_eq!(String::from_utf8(err).unwrap(), "1OK\n2OK\n");
    assert_eq!(
        seen,
        vec![
            "1W#",
            "1#some_message",
            "0# 1#some_message",
            "1S#",
            "0# 1T#",
            "2W#",
            "2#some_message",
            "0# 2#some_message",
            "2S#",
            "0# 2T#",
        ]
    );
}
