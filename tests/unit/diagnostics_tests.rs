//! Unit tests for session reports and the JSONL session log.

use std::fs;
use std::sync::{Arc, Mutex};

use spawner_harness::diagnostics::writer::JsonlSessionLog;
use spawner_harness::diagnostics::{DiagnosticsReporter, SessionLog, SessionReport};
use spawner_harness::models::session::{AgentSession, ReportStatus};
use spawner_harness::{AppError, Result};

fn finalized(id: u32, lines: &[&str]) -> AgentSession {
    let mut session = AgentSession::new(id, "some_message");
    for line in lines {
        session.observe_line(line).unwrap();
    }
    session
}

/// Sink that keeps reports in memory.
#[derive(Default, Clone)]
struct MemoryLog(Arc<Mutex<Vec<SessionReport>>>);

impl SessionLog for MemoryLog {
    fn append(&self, report: &SessionReport) -> Result<()> {
        self.0.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Sink that always fails.
struct BrokenLog;

impl SessionLog for BrokenLog {
    fn append(&self, _report: &SessionReport) -> Result<()> {
        Err(AppError::Io("disk full".into()))
    }
}

#[test]
fn report_lines_follow_status_table() {
    let ok = SessionReport::from_session(&finalized(3, &["3#some_message", "3T#"])).unwrap();
    assert_eq!(ok.line(), "3OK");

    let fail = SessionReport::from_session(&finalized(3, &["3#bogus", "3T#"])).unwrap();
    assert_eq!(fail.line(), "3FAIL wrong answer: bogus");

    let terminated = SessionReport::from_session(&finalized(9, &["9T#"])).unwrap();
    assert_eq!(terminated.line(), "9TERMINATED");

    let mut cut = AgentSession::new(5, "some_message");
    cut.end_of_stream().unwrap();
    let unterminated = SessionReport::from_session(&cut).unwrap();
    assert_eq!(unterminated.status, ReportStatus::Unterminated);
    assert_eq!(
        unterminated.line(),
        "5UNTERMINATED end-of-stream before terminate"
    );
}

#[test]
fn active_session_cannot_be_reported() {
    let session = AgentSession::new(1, "some_message");
    assert!(matches!(
        SessionReport::from_session(&session),
        Err(AppError::Protocol(_))
    ));
}

#[tokio::test]
async fn reporter_writes_one_line_per_session_and_copies_to_sink() {
    let log = MemoryLog::default();
    let mut err = Vec::new();
    let mut reporter = DiagnosticsReporter::new(&mut err).with_sink(Box::new(log.clone()));

    reporter
        .report(&finalized(1, &["1#some_message", "1T#"]))
        .await
        .unwrap();
    reporter.report(&finalized(2, &["2#x", "2T#"])).await.unwrap();

    assert_eq!(reporter.reports().len(), 2);
    drop(reporter);

    assert_eq!(String::from_utf8(err).unwrap(), "1OK\n2FAIL wrong answer: x\n");
    let stored = log.0.lock().unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].agent_id, 2);
}

#[tokio::test]
async fn failing_sink_does_not_fail_the_report() {
    let mut err = Vec::new();
    let mut reporter = DiagnosticsReporter::new(&mut err).with_sink(Box::new(BrokenLog));

    let report = reporter.report(&finalized(1, &["1T#"])).await.unwrap();
    assert_eq!(report.status, ReportStatus::Terminated);
    drop(reporter);
    assert_eq!(String::from_utf8(err).unwrap(), "1TERMINATED\n");
}

#[test]
fn jsonl_log_appends_one_object_per_report() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("sessions.jsonl");

    let log = JsonlSessionLog::open(&path).expect("open creates parent dirs");
    assert_eq!(log.path(), path.as_path());

    let ok = SessionReport::from_session(&finalized(1, &["1#some_message", "1T#"])).unwrap();
    let fail = SessionReport::from_session(&finalized(2, &["2#bad", "2T#"])).unwrap();
    log.append(&ok).unwrap();
    log.append(&fail).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["agent_id"], 1);
    assert_eq!(first["status"], "OK");
    assert!(first["error_message"].is_null());

    let second: SessionReport = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second, fail);
}

#[test]
fn jsonl_log_appends_across_reopen() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("sessions.jsonl");
    let report = SessionReport::from_session(&finalized(1, &["1T#"])).unwrap();

    JsonlSessionLog::open(&path).unwrap().append(&report).unwrap();
    JsonlSessionLog::open(&path).unwrap().append(&report).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
}
