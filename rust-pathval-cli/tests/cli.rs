//! Black-box tests of the verb dispatcher.

use assert_cmd::Command;
use predicates::prelude::*;

fn pathval() -> Command {
    Command::cargo_bin("pathval").unwrap()
}

#[test]
fn unknown_verb_reports_usage_error() {
    pathval()
        .write_stdin("frobnicate\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("command input error"));
}

#[test]
fn install_then_validate_prints_the_traversed_path() {
    pathval()
        .write_stdin("install\nvalidate\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "probe traversed: of:0000000000000001 -> of:0000000000000002 -> of:0000000000000004",
        ));
}

#[test]
fn revalidate_before_validate_reports_the_error() {
    pathval()
        .write_stdin("install\nrevalidate\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("trace not started"));
}

#[test]
fn stopvalidate_is_idempotent() {
    pathval()
        .write_stdin("stopvalidate\nstopvalidate\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("path tracing stopped").count(2));
}

#[test]
fn probe_hosts_are_configurable() {
    pathval()
        .args(["--probe-src", "h2", "--probe-dst", "d1"])
        .write_stdin("install\nvalidate\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "probe traversed: of:0000000000000001 -> of:0000000000000003 -> of:0000000000000004",
        ));
}

#[test]
fn unknown_probe_host_fails_at_startup() {
    pathval()
        .args(["--probe-src", "nosuch"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown host"));
}
