//! CLI binary integration tests using assert_cmd + predicates.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin("schema-engine").expect("binary should exist")
}

fn flat_meta_schema() -> Value {
    json!({
        "schema_name": "table_name",
        "properties": {
            "properties_name": "fields",
            "property": {
                "key": "key", "name": "name", "type": "type",
                "validation": {
                    "allowed_types": ["txt", "dte"],
                    "type_constraints": {
                        "txt": {"target_type": "string", "requires_options": false},
                        "dte": {"target_type": "date", "requires_options": false}
                    }
                }
            }
        }
    })
}

fn demo_external_schema() -> Value {
    json!({
        "table_name": "Demo",
        "fields": [
            {"key": "name", "name": "Name", "type": "txt"},
            {"key": "dob", "name": "DOB", "type": "dte"},
        ]
    })
}

fn write_fixture(dir: &TempDir, name: &str, value: &Value) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

#[test]
fn register_prints_assigned_id_and_name() {
    let dir = TempDir::new().unwrap();
    let meta = write_fixture(&dir, "meta.json", &flat_meta_schema());
    let external = write_fixture(&dir, "external.json", &demo_external_schema());

    cmd()
        .arg("register")
        .arg("--meta-schema")
        .arg(&meta)
        .arg("--external-schema")
        .arg(&external)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"Demo\""));
}

#[test]
fn schema_prints_generated_json_schema_with_title() {
    let dir = TempDir::new().unwrap();
    let meta = write_fixture(&dir, "meta.json", &flat_meta_schema());
    let external = write_fixture(&dir, "external.json", &demo_external_schema());

    let output = cmd()
        .arg("schema")
        .arg("--meta-schema")
        .arg(&meta)
        .arg("--external-schema")
        .arg(&external)
        .output()
        .unwrap();
    assert!(output.status.success());
    let schema: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["title"], json!("Demo"));
    assert_eq!(schema["properties"]["fields"]["properties"]["Name"]["type"], json!(["string", "null"]));
}

#[test]
fn validate_reports_success_for_well_formed_response() {
    let dir = TempDir::new().unwrap();
    let meta = write_fixture(&dir, "meta.json", &flat_meta_schema());
    let external = write_fixture(&dir, "external.json", &demo_external_schema());
    let response = write_fixture(
        &dir,
        "response.json",
        &json!({"table_name": "Demo", "fields": {"Name": "Jane", "DOB": "2000-01-01"}}),
    );

    cmd()
        .arg("validate")
        .arg("--meta-schema")
        .arg(&meta)
        .arg("--external-schema")
        .arg(&external)
        .arg(&response)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"valid\": true"));
}

#[test]
fn validate_exits_nonzero_and_reports_errors_for_malformed_response() {
    let dir = TempDir::new().unwrap();
    let meta = write_fixture(&dir, "meta.json", &flat_meta_schema());
    let external = write_fixture(&dir, "external.json", &demo_external_schema());
    let response = write_fixture(
        &dir,
        "response.json",
        &json!({"table_name": "Demo", "fields": {"Name": "Jane", "DOB": "not-a-date"}}),
    );

    cmd()
        .arg("validate")
        .arg("--meta-schema")
        .arg(&meta)
        .arg("--external-schema")
        .arg(&external)
        .arg(&response)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"valid\": false"));
}

#[test]
fn list_prints_one_line_per_field() {
    let dir = TempDir::new().unwrap();
    let meta = write_fixture(&dir, "meta.json", &flat_meta_schema());
    let external = write_fixture(&dir, "external.json", &demo_external_schema());

    cmd()
        .arg("list")
        .arg("--meta-schema")
        .arg(&meta)
        .arg("--external-schema")
        .arg(&external)
        .assert()
        .success()
        .stdout(predicate::str::contains("Name\tstring\ttxt"))
        .stdout(predicate::str::contains("DOB\tdate\tdte"));
}

#[test]
fn missing_external_schema_file_fails_with_context() {
    let dir = TempDir::new().unwrap();
    let meta = write_fixture(&dir, "meta.json", &flat_meta_schema());

    cmd()
        .arg("register")
        .arg("--meta-schema")
        .arg(&meta)
        .arg("--external-schema")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open file"));
}
