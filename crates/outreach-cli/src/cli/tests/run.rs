//! Tests for run and continue subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_run_defaults() {
    match parse(&["outreach", "run", "contacts.json"]) {
        CliCommand::Run {
            input,
            timeout_ms,
            retry_delay_ms,
        } => {
            assert_eq!(input, std::path::PathBuf::from("contacts.json"));
            assert!(timeout_ms.is_none());
            assert!(retry_delay_ms.is_none());
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_with_limits() {
    match parse(&[
        "outreach",
        "run",
        "/data/contacts.json",
        "--timeout-ms",
        "8000",
        "--retry-delay-ms",
        "70000",
    ]) {
        CliCommand::Run {
            timeout_ms,
            retry_delay_ms,
            ..
        } => {
            assert_eq!(timeout_ms, Some(8_000));
            assert_eq!(retry_delay_ms, Some(70_000));
        }
        _ => panic!("expected Run with limits"),
    }
}

#[test]
fn cli_parse_run_requires_input() {
    assert!(Cli::try_parse_from(["outreach", "run"]).is_err());
    assert!(Cli::try_parse_from(["outreach", "run", "x.json", "--timeout-ms", "soon"]).is_err());
}

#[test]
fn cli_parse_continue() {
    let id = uuid::Uuid::new_v4();
    match parse(&["outreach", "continue", &id.to_string()]) {
        CliCommand::Continue { id: got } => assert_eq!(got, id),
        _ => panic!("expected Continue"),
    }
    assert!(Cli::try_parse_from(["outreach", "continue", "42"]).is_err());
}
