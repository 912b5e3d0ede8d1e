//! CLI integration tests.
//!
//! Tests:
//! - Help and version output
//! - Insert, gather and truncate through a settings directory
//! - Refresh from a records file
//! - Configuration errors exit non-zero

mod common;

use common::{TestFixture, TABLE};
use rowkeep::settings::{DatabaseSettings, DEFAULT_SETTINGS_KEY};
use serde_json::{json, Value};
use std::process::{Command, Output};

fn rowkeep(fixture: &TestFixture, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rowkeep"))
        .arg("--config-dir")
        .arg(fixture.config_dir())
        .args(["--channel", "calls"])
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run rowkeep")
}

fn write_settings(fixture: &TestFixture) {
    let settings = DatabaseSettings::new(
        "sqlite",
        json!({
            "path": fixture.db_path,
            "columns": ["caller", "duration"],
        }),
    )
    .link("calls", TABLE);

    std::fs::create_dir_all(fixture.config_dir()).unwrap();
    std::fs::write(
        fixture.config_dir().join(format!("{DEFAULT_SETTINGS_KEY}.json")),
        serde_json::to_string_pretty(&settings).unwrap(),
    )
    .unwrap();
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "rowkeep failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_cli_help_output() {
    let output = Command::new(env!("CARGO_BIN_EXE_rowkeep"))
        .arg("--help")
        .output()
        .expect("failed to run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--config-dir"), "help should mention --config-dir");
    assert!(stdout.contains("--channel"), "help should mention --channel");
    assert!(stdout.contains("refresh"), "help should list the refresh command");
    assert!(stdout.contains("truncate"), "help should list the truncate command");
}

#[test]
fn test_cli_version_output() {
    let output = Command::new(env!("CARGO_BIN_EXE_rowkeep"))
        .arg("--version")
        .output()
        .expect("failed to run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "version output should contain version number: {stdout}"
    );
}

#[test]
fn test_insert_gather_truncate() {
    let fixture = TestFixture::new();
    write_settings(&fixture);

    let ack = stdout_json(&rowkeep(
        &fixture,
        &["insert", r#"{"id": 1, "caller": "100", "duration": 12}"#],
    ));
    assert_eq!(ack["affected_rows"], json!(1));

    let rows = stdout_json(&rowkeep(&fixture, &["gather"]));
    assert_eq!(rows, json!([{"id": 1, "caller": "100", "duration": 12}]));

    let found = stdout_json(&rowkeep(&fixture, &["select", "1"]));
    assert_eq!(found["caller"], json!("100"));

    let ack = stdout_json(&rowkeep(&fixture, &["truncate"]));
    assert_eq!(ack["destroyedRows"], json!(1));

    let rows = stdout_json(&rowkeep(&fixture, &["gather"]));
    assert_eq!(rows, json!([]));
}

#[test]
fn test_refresh_from_file() {
    let fixture = TestFixture::new();
    write_settings(&fixture);
    for id in [1, 2, 3] {
        let record = json!({"id": id, "caller": "old"}).to_string();
        stdout_json(&rowkeep(&fixture, &["insert", record.as_str()]));
    }

    let file = fixture.temp_dir.path().join("records.json");
    std::fs::write(&file, r#"[{"id": 1, "caller": "new"}, {"id": 2, "caller": "new"}]"#).unwrap();

    let refresh = stdout_json(&rowkeep(
        &fixture,
        &["refresh", "--file", file.to_str().unwrap()],
    ));
    assert_eq!(refresh["deleted_rows"], json!(1));

    let rows = stdout_json(&rowkeep(&fixture, &["gather"]));
    assert_eq!(
        rows,
        json!([{"id": 1, "caller": "new", "duration": null}, {"id": 2, "caller": "new", "duration": null}])
    );
}

#[test]
fn test_unknown_channel_exits_with_error() {
    let fixture = TestFixture::new();
    write_settings(&fixture);

    let output = Command::new(env!("CARGO_BIN_EXE_rowkeep"))
        .arg("--config-dir")
        .arg(fixture.config_dir())
        .args(["--channel", "voicemail", "gather"])
        .output()
        .expect("failed to run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("voicemail"), "stderr should name the channel: {stderr}");
}
