use std::process::{Command, Output};

fn txload(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_txload"));
    command.args(args).env("RUST_LOG", "warn");

    for (key, value) in env {
        command.env(key, value);
    }

    command.output().unwrap()
}

#[test]
fn usage_errors() {
    assert_eq!(txload(&["store"], &[]).status.code(), Some(1));
    assert_eq!(txload(&["store", "1", "2", "3"], &[]).status.code(), Some(1));
    assert_eq!(txload(&["store", "-1", "2"], &[]).status.code(), Some(1));
    assert_eq!(txload(&["store", "1", "many"], &[]).status.code(), Some(1));
}

#[test]
fn malformed_setting() {
    let output = txload(&["cli-malformed", "1", "1"], &[("TXLOAD_ITERATIONS", "10k")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
fn store_that_cannot_be_created() {
    let output = txload(&["cli-tiny", "1", "1"], &[("TXLOAD_STORE_SIZE", "16")]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn small_run_reports_elapsed() {
    let output = txload(
        &["cli-small", "2", "1"],
        &[("TXLOAD_RECORDS", "500"), ("TXLOAD_ITERATIONS", "400")],
    );

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("elapsed: "));
    assert!(stdout.trim_end().ends_with(" ms"));
}

#[test]
fn zero_workers() {
    let output = txload(&["cli-zero", "0", "0"], &[]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .starts_with("elapsed: "));
}

#[test]
fn failed_preparation() {
    let output = txload(
        &["cli-prepare", "1", "1"],
        &[("TXLOAD_RECORDS", "1000"), ("TXLOAD_STORE_SIZE", "2048")],
    );

    assert_eq!(output.status.code(), Some(3));
    assert!(output.stdout.is_empty());
}
