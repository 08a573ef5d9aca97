//! End-to-end CLI behavior: exit codes, early actions, and pragma handling
//! through the shipped binary.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn norn() -> Command {
    Command::cargo_bin("norn").unwrap()
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn clean_file_exits_zero() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "clean.nn", "a = 1\nb = 2\n");

    norn().arg("check").arg(file).assert().code(0);
}

#[test]
fn no_input_files_is_a_usage_error() {
    norn()
        .arg("check")
        .assert()
        .code(32)
        .stderr(predicate::str::contains("no input files"));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    norn().arg("check").arg("--no-such-flag").assert().code(32);
    norn()
        .arg("check")
        .arg("--jobs=not-a-number")
        .assert()
        .code(32);
}

#[test]
fn missing_path_is_a_usage_error() {
    norn()
        .arg("check")
        .arg("/no/such/path.nn")
        .assert()
        .code(32)
        .stderr(predicate::str::contains("no such file or directory"));
}

#[test]
fn convention_violation_sets_bit_sixteen() {
    let dir = TempDir::new().unwrap();
    let long = "x".repeat(120);
    let file = write_file(&dir, "long.nn", &format!("v = \"{long}\"\n"));

    norn()
        .arg("check")
        .arg(file)
        .assert()
        .code(16)
        .stdout(predicate::str::contains("line-too-long"));
}

#[test]
fn syntax_error_sets_the_fatal_bit() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "broken.nn", "a = 1\n    b = 2\n");

    norn()
        .arg("check")
        .arg(file)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("syntax-error"));
}

#[test]
fn exit_bits_accumulate_across_categories() {
    let dir = TempDir::new().unwrap();
    let body = "a = 1\nb = 2\nc = 3\nd = 4\ne = 5\n";
    let long = "y".repeat(120);
    write_file(&dir, "one.nn", body);
    write_file(&dir, "two.nn", &format!("{body}w = \"{long}\"\n"));

    // refactor (8) from the duplicated block, convention (16) from the
    // long line
    norn().arg("check").arg(dir.path()).assert().code(24);
}

#[test]
fn disable_flag_silences_the_message() {
    let dir = TempDir::new().unwrap();
    let long = "x".repeat(120);
    let file = write_file(&dir, "long.nn", &format!("v = \"{long}\"\n"));

    norn()
        .arg("check")
        .arg("--disable=line-too-long")
        .arg(file)
        .assert()
        .code(0);
}

#[test]
fn inline_pragma_reports_useless_suppression() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "quiet.nn", "# norn: disable=line-too-long\na = 1\n");

    norn()
        .arg("check")
        .arg(file)
        .assert()
        .code(0)
        .stdout(predicate::str::contains("useless-suppression"));
}

#[test]
fn skip_file_pragma_reports_file_ignored_only() {
    let dir = TempDir::new().unwrap();
    let long = "x".repeat(120);
    let file = write_file(
        &dir,
        "skipped.nn",
        &format!("# norn: skip-file\nv = \"{long}\"\n"),
    );

    norn()
        .arg("check")
        .arg(file)
        .assert()
        .code(0)
        .stdout(
            predicate::str::contains("file-ignored")
                .and(predicate::str::contains("line-too-long").not()),
        );
}

#[test]
fn parallel_run_matches_sequential_output_shape() {
    let dir = TempDir::new().unwrap();
    let long = "z".repeat(120);
    write_file(&dir, "a.nn", &format!("v = \"{long}\"\n"));
    write_file(&dir, "b.nn", "ok = 1\n");

    norn()
        .arg("check")
        .arg("--jobs=2")
        .arg(dir.path())
        .assert()
        .code(16)
        .stdout(predicate::str::contains("line-too-long"));
}

#[test]
fn list_msgs_names_the_builtin_diagnostics() {
    norn()
        .arg("list-msgs")
        .assert()
        .code(0)
        .stdout(
            predicate::str::contains("C0101")
                .and(predicate::str::contains("duplicate-lines"))
                .and(predicate::str::contains("useless-suppression")),
        );
}

#[test]
fn print_default_config_emits_yaml() {
    norn()
        .arg("print-default-config")
        .assert()
        .code(0)
        .stdout(
            predicate::str::contains("max_line_length")
                .and(predicate::str::contains("min_similarity_lines")),
        );
}
