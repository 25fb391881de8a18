//! End-to-end tests for the `validate` command.

#[allow(dead_code)]
mod common;
#[allow(unused_imports)]
use common::prelude::*;

#[test]
fn test_validate_valid_pipelines() {
    let fixture = TestFixture::new().with_sample_pipelines();

    fixture
        .command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] backend (1 jobs, 2 trigger patterns)"))
        .stdout(predicate::str::contains("[OK] web/ui"))
        .stdout(predicate::str::contains("All pipelines are valid"));
}

#[test]
fn test_validate_reports_failures_with_hints() {
    let fixture = TestFixture::new()
        .with_pipeline("a", "include: b.yml\n")
        .with_file("b.yml", "include: .gitlab/pipelines/a.yml\n");

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Cyclic include"))
        .stdout(predicate::str::contains("hint:"))
        .stdout(predicate::str::contains("1 pipeline(s) failed to compile"));
}

#[test]
fn test_validate_strict_flags_untriggered_pipelines() {
    let fixture = TestFixture::new().with_pipeline("manual", "job: {script: [x]}\n");

    fixture.command().arg("validate").assert().success();

    fixture
        .command()
        .arg("validate")
        .arg("--strict")
        .assert()
        .failure()
        .stdout(predicate::str::contains("manual"));
}

#[test]
fn test_validate_unknown_settings_key() {
    let fixture = TestFixture::new()
        .with_settings("pipeline-folder: ci\n")
        .with_pipeline("a", "job: {script: [x]}\n");

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pipelines-folder"));
}

#[test]
fn test_validate_missing_folder() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pipelines folder not found"));
}
