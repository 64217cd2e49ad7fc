use predicates::prelude::*;
use std::fs;

fn sable() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("sable").into()
}

fn fixture_path(name: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    format!(
        "{}/tests/fixtures/{}.sable",
        manifest_dir.replace("/crates/sable-cli", ""),
        name
    )
}

fn write_source(dir: &tempfile::TempDir, name: &str, source: &str) -> String {
    let file = dir.path().join(name);
    fs::write(&file, source).unwrap();
    file.to_str().unwrap().to_string()
}

// ── check command ───────────────────────────────────────────

#[test]
fn check_valid_file_exits_zero() {
    sable()
        .args(["check", &fixture_path("shapes")])
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn check_type_error_exits_nonzero() {
    sable()
        .args(["check", &fixture_path("type-error")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("type error"))
        .stderr(predicate::str::contains(
            "operator '+' cannot be applied to Number and Boolean",
        ));
}

#[test]
fn check_reports_spans_relative_to_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "unknown.sable", "return missing");

    sable()
        .args(["check", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains(":7:14: type error: undefined variable 'missing'"));
}

#[test]
fn check_rejects_unannotated_recursion() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(
        &dir,
        "loop.sable",
        "def f(n: Number) = if n == 0 then true else f(n - 1)\nreturn f(3)",
    );

    sable()
        .args(["check", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("type determination entered a loop"));
}

// ── run command ─────────────────────────────────────────────

#[test]
fn run_factorial_produces_output() {
    sable()
        .args(["run", &fixture_path("factorial")])
        .assert()
        .success()
        .stdout("120\n");
}

#[test]
fn run_shapes_matches_on_tags() {
    sable()
        .args(["run", &fixture_path("shapes")])
        .assert()
        .success()
        .stdout("{circle: 12, rect: 12, width: 5}\n");
}

#[test]
fn run_sequences_uses_the_prelude() {
    sable()
        .args(["run", &fixture_path("sequences")])
        .assert()
        .success()
        .stdout(predicate::str::contains("first: [0, 4, 16, 36, 64]"))
        .stdout(predicate::str::contains("total: 6"))
        .stdout(predicate::str::contains("big: 2000000000000000000000n"));
}

#[test]
fn run_runtime_error_exits_nonzero() {
    sable()
        .args(["run", &fixture_path("runtime-error")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("runtime error: division by zero"));
}

#[test]
fn run_without_prelude_has_no_builtins() {
    sable()
        .args(["run", "--no-prelude", &fixture_path("sequences")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("undefined variable"));
}

#[test]
fn run_without_prelude_plain_program() {
    sable()
        .args(["run", "--no-prelude", &fixture_path("factorial")])
        .assert()
        .success()
        .stdout("120\n");
}

#[test]
fn run_deep_recursion_returns_its_value() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(
        &dir,
        "count.sable",
        "def count(n: Number): Number = if n == 0 then 0 else 1 + count(n - 1)\nreturn count(10000)",
    );

    sable()
        .args(["run", &file])
        .assert()
        .success()
        .stdout("10000\n");
}

// ── parse command ───────────────────────────────────────────

#[test]
fn parse_outputs_syntax_tree() {
    sable()
        .args(["parse", &fixture_path("factorial")])
        .assert()
        .success()
        .stdout(predicate::str::contains("(def factorial"));
}

#[test]
fn parse_does_not_include_prelude() {
    sable()
        .args(["parse", &fixture_path("factorial")])
        .assert()
        .success()
        .stdout(predicate::str::contains("external def").not());
}

// ── logging ─────────────────────────────────────────────────

#[test]
fn log_level_flag_enables_debug_events() {
    sable()
        .args(["--log-level", "debug", "check", &fixture_path("factorial")])
        .assert()
        .success()
        .stderr(predicate::str::contains("program validated"));
}

#[test]
fn logging_is_quiet_by_default() {
    sable()
        .env_remove("SABLE_LOG")
        .args(["check", &fixture_path("factorial")])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn sable_log_env_sets_the_filter() {
    sable()
        .env("SABLE_LOG", "sable_typeck=debug")
        .args(["check", &fixture_path("factorial")])
        .assert()
        .success()
        .stderr(predicate::str::contains("built program"));
}

// ── error handling ──────────────────────────────────────────

#[test]
fn missing_file_produces_error() {
    sable()
        .args(["run", "nonexistent.sable"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn no_subcommand_shows_help() {
    sable()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn syntax_error_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "bad.sable", "val x = (1 +");

    sable()
        .args(["check", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse error"));
}
