// tests/cli_tests.rs
use assert_cmd::Command;
use clap::Parser;
use clap::error::ErrorKind;
use predicates::prelude::*;
use seaopt::cli::Args;
use std::fs;
use std::path::PathBuf;

fn sample_file(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("seaopt_test_{name}.ir"));
    fs::write(&path, content).expect("failed to write sample input");
    path
}

const SAMPLE: &str = "
graph @main {
  b0:
    m0 = initmem
    t0 = const i32 2
    t1 = const i32 3
    t2 = add i32 t0, t1
    return m0, t2
}
";

#[test]
fn help_displays_correctly() {
    Command::cargo_bin("seaopt")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("-i, --input <FILE>"));
}

#[test]
fn version_displays_correctly() {
    let version = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    Command::cargo_bin("seaopt").unwrap().arg("--version").assert().success().stdout(predicate::str::contains(version));
}

#[test]
fn rejects_wrong_extension() {
    let result = Args::try_parse_from(["seaopt", "--input", "module.txt"]);
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().kind(), ErrorKind::ValueValidation);
}

#[test]
fn accepts_ir_extension() {
    let args = Args::try_parse_from(["seaopt", "--input", "module.ir"]).unwrap();
    assert_eq!(args.input, PathBuf::from("module.ir"));
    assert!(!args.no_opt);
    assert!(!args.verbose);
}

#[test]
fn missing_file_fails_with_error() {
    Command::cargo_bin("seaopt")
        .unwrap()
        .args(["--input", "/nonexistent/seaopt_missing.ir"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ERROR"));
}

#[test]
fn optimizes_sample_module() {
    let path = sample_file("fold", SAMPLE);
    Command::cargo_bin("seaopt")
        .unwrap()
        .args(["--input", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("const[5]"))
        .stderr(predicate::str::contains("module modified"));
}

#[test]
fn no_opt_keeps_module_untouched() {
    let path = sample_file("noopt", SAMPLE);
    Command::cargo_bin("seaopt")
        .unwrap()
        .args(["--input", path.to_str().unwrap(), "--no-opt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("add(").and(predicate::str::contains("const[5]").not()));
}

#[test]
fn only_filter_skips_non_matching_graphs() {
    let path = sample_file("filter", SAMPLE);
    Command::cargo_bin("seaopt")
        .unwrap()
        .args(["--input", path.to_str().unwrap(), "--only", "other_.*"])
        .assert()
        .success()
        .stdout(predicate::str::contains("const[5]").not());
}

#[test]
fn invalid_regex_is_rejected() {
    let path = sample_file("badre", SAMPLE);
    Command::cargo_bin("seaopt")
        .unwrap()
        .args(["--input", path.to_str().unwrap(), "--only", "["])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --only pattern"));
}

#[test]
fn parse_errors_point_at_the_line() {
    let path = sample_file("parse_error", "graph @x {\n  b0:\n    t0 = bogus i32 t1\n}\n");
    Command::cargo_bin("seaopt")
        .unwrap()
        .args(["--input", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 3"));
}

#[test]
fn timings_are_reported() {
    let path = sample_file("timings", SAMPLE);
    Command::cargo_bin("seaopt")
        .unwrap()
        .args(["--input", path.to_str().unwrap(), "--timings"])
        .assert()
        .success()
        .stderr(predicate::str::contains("parse").and(predicate::str::contains("optimize")));
}
