use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

#[test]
fn test_cli_verified_run() {
    let mut cmd = Command::new(cargo_bin!("kycflow"));
    cmd.arg("tests/fixtures/verified.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with(
            "verification,alias,method,status,verdict",
        ))
        .stdout(predicate::str::contains(
            ",alice,driving-license,REPORT_READY,verified",
        ))
        .stdout(predicate::str::contains(
            ",bob,aadhaar-otp,AWAITING_PAYMENT,\n",
        ))
        .stderr(predicate::str::contains("Error processing").not());
}

#[test]
fn test_cli_declined_run() {
    let mut cmd = Command::new(cargo_bin!("kycflow"));
    cmd.arg("tests/fixtures/declined.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            ",carol,face-match,REJECTED,rejected",
        ))
        .stdout(predicate::str::contains(",dave,aadhaar-otp,FAILED,\n"))
        .stderr(predicate::str::contains("Error processing command 4"))
        .stderr(predicate::str::contains("Error processing command 9"))
        .stderr(predicate::str::contains("Error processing command 10"))
        .stderr(predicate::str::contains("is not accepted while verification is FAILED"));
}

#[test]
fn test_cli_config_file_makes_verification_free() {
    let mut cmd = Command::new(cargo_bin!("kycflow"));
    cmd.arg("tests/fixtures/verified.csv")
        .arg("--config")
        .arg("tests/fixtures/free.toml");

    // Without a payment step, `confirm` is out of order but the report still runs.
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            ",alice,driving-license,REPORT_READY,verified",
        ))
        .stdout(predicate::str::contains(",bob,aadhaar-otp,STEP_COMPLETED,"))
        .stderr(predicate::str::contains("Error processing command 5"));
}

#[test]
fn test_cli_rejects_invalid_config() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "[steps]").unwrap();
    writeln!(config, "face_match_threshold = 2.0").unwrap();

    let mut cmd = Command::new(cargo_bin!("kycflow"));
    cmd.arg("tests/fixtures/verified.csv")
        .arg("--config")
        .arg(config.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("face_match_threshold"));
}

#[test]
fn test_cli_blob_dir_keeps_uploads() {
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = Command::new(cargo_bin!("kycflow"));
    cmd.arg("tests/fixtures/verified.csv")
        .arg("--blob-dir")
        .arg(dir.path());

    cmd.assert().success();
    let shards: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(shards.len(), 1);
}

#[test]
fn test_cli_missing_input() {
    let mut cmd = Command::new(cargo_bin!("kycflow"));
    cmd.arg("tests/fixtures/does-not-exist.csv");

    cmd.assert().failure();
}

#[test]
fn test_cli_empty_input_prints_header() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "command,verification,step,key,payload").unwrap();

    let mut cmd = Command::new(cargo_bin!("kycflow"));
    cmd.arg(csv.path());

    cmd.assert()
        .success()
        .stdout("verification,alias,method,status,verdict\n");
}
