#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::Command;

#[test]
fn version_reports_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_hsmlink"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_extended_lists_wire_protocol() {
    let output = Command::new(env!("CARGO_BIN_EXE_hsmlink"))
        .arg("version")
        .arg("--extended")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("protocol: 0x01"), "stdout: {stdout}");
}

#[test]
fn doctor_passes_on_clean_env() {
    let output = Command::new(env!("CARGO_BIN_EXE_hsmlink"))
        .arg("--format")
        .arg("json")
        .arg("doctor")
        .output()
        .expect("doctor should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("doctor-report.schema.json"));
    assert!(stdout.contains("\"overall\":\"pass\""), "stdout: {stdout}");
}

#[test]
fn request_timeout_returns_124() {
    let missing = PathBuf::from(format!(
        "/tmp/hsmlink-missing-{}-{}.sock",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));

    let output = Command::new(env!("CARGO_BIN_EXE_hsmlink"))
        .arg("request")
        .arg(&missing)
        .arg("--kind")
        .arg("1")
        .arg("--timeout")
        .arg("1s")
        .output()
        .expect("request should run");

    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn bad_hex_payload_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_hsmlink"))
        .arg("request")
        .arg("/tmp/hsmlink-never-used.sock")
        .arg("--kind")
        .arg("1")
        .arg("--hex")
        .arg("zz")
        .output()
        .expect("request should run");

    assert_eq!(output.status.code(), Some(64));
}
