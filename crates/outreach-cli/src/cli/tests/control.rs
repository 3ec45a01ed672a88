//! Tests for status and job control subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_status() {
    assert!(matches!(parse(&["outreach", "status"]), CliCommand::Status { id: None }));
    let id = uuid::Uuid::new_v4();
    match parse(&["outreach", "status", &id.to_string()]) {
        CliCommand::Status { id: Some(got) } => assert_eq!(got, id),
        _ => panic!("expected Status with id"),
    }
}

#[test]
fn cli_parse_pause_resume_cancel() {
    let id = uuid::Uuid::new_v4();
    let s = id.to_string();
    assert!(matches!(parse(&["outreach", "pause", &s]), CliCommand::Pause { id: got } if got == id));
    assert!(matches!(parse(&["outreach", "resume", &s]), CliCommand::Resume { id: got } if got == id));
    assert!(matches!(parse(&["outreach", "cancel", &s]), CliCommand::Cancel { id: got } if got == id));
    assert!(Cli::try_parse_from(["outreach", "pause"]).is_err());
}

#[test]
fn cli_parse_set_retry_delay() {
    let id = uuid::Uuid::new_v4();
    match parse(&["outreach", "set-retry-delay", &id.to_string(), "5000"]) {
        CliCommand::SetRetryDelay { id: got, ms } => {
            assert_eq!(got, id);
            assert_eq!(ms, 5_000);
        }
        _ => panic!("expected SetRetryDelay"),
    }
    let s = id.to_string();
    assert!(Cli::try_parse_from(["outreach", "set-retry-delay", s.as_str()]).is_err());
}
