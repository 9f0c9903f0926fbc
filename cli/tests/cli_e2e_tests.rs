//! CLI end-to-end tests exercising the full register -> schema -> validate
//! -> reverse-map pipeline through the binary, using a small PCC-flavored
//! meta-schema fixture.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin("schema-engine").expect("binary should exist")
}

fn pcc_like_meta_schema() -> Value {
    json!({
        "schema_name": "assessmentDescription",
        "schema_id": "templateId",
        "properties": {
            "properties_name": "fields",
            "property": {
                "key": "questionKey", "name": "questionText", "type": "questionType",
                "id": "questionNumber", "options": "responseOptions",
                "validation": {
                    "allowed_types": ["txt", "rad", "chk"],
                    "type_constraints": {
                        "txt": {"target_type": "string", "requires_options": false},
                        "rad": {"target_type": "single_select", "requires_options": true},
                        "chk": {"target_type": "boolean", "requires_options": false}
                    }
                }
            }
        }
    })
}

fn pcc_like_external_schema() -> Value {
    json!({
        "assessmentDescription": "Admission Assessment",
        "templateId": "TPL-1",
        "fields": [
            {"questionKey": "pain_level", "questionText": "Pain Level", "questionType": "txt", "questionNumber": "1"},
            {
                "questionKey": "mobility", "questionText": "Mobility", "questionType": "rad", "questionNumber": "2",
                "responseOptions": [
                    {"responseText": "Independent", "responseValue": "I"},
                    {"responseText": "Assisted", "responseValue": "A"}
                ]
            },
            {"questionKey": "ambulatory", "questionText": "Ambulatory", "questionType": "chk", "questionNumber": "3"},
        ]
    })
}

fn write_fixture(dir: &TempDir, name: &str, value: &Value) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

#[test]
fn full_pipeline_register_schema_validate_reverse_map() {
    let dir = TempDir::new().unwrap();
    let meta = write_fixture(&dir, "meta.json", &pcc_like_meta_schema());
    let external = write_fixture(&dir, "external.json", &pcc_like_external_schema());

    // register
    cmd()
        .arg("register")
        .arg("--meta-schema")
        .arg(&meta)
        .arg("--external-schema")
        .arg(&external)
        .assert()
        .success()
        .stdout(predicate::str::contains("Admission Assessment"));

    // schema: generated JSON Schema carries the title and a nullable enum with a null terminal
    let schema_output = cmd()
        .arg("schema")
        .arg("--meta-schema")
        .arg(&meta)
        .arg("--external-schema")
        .arg(&external)
        .output()
        .unwrap();
    assert!(schema_output.status.success());
    let schema: Value = serde_json::from_slice(&schema_output.stdout).unwrap();
    assert_eq!(schema["title"], json!("Admission Assessment"));
    let mobility_enum = schema["properties"]["fields"]["properties"]["2.Mobility"]["enum"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert!(mobility_enum.contains(&json!(null)));

    // validate: well-formed response passes
    let response = write_fixture(
        &dir,
        "response.json",
        &json!({
            "table_name": "Admission Assessment",
            "fields": {
                "1.Pain Level": "moderate",
                "2.Mobility": "Independent",
                "3.Ambulatory": true
            }
        }),
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

    // reverse-map (default wire flavor): resolves Mobility back to its responseValue
    // and converts the checkbox to the PCC "1"/"null" sentinel.
    let reverse_output = cmd()
        .arg("reverse-map")
        .arg("--meta-schema")
        .arg(&meta)
        .arg("--external-schema")
        .arg(&external)
        .arg("--formatter-set")
        .arg("default")
        .arg(&response)
        .output()
        .unwrap();
    assert!(reverse_output.status.success());
    let mapped: Value = serde_json::from_slice(&reverse_output.stdout).unwrap();
    assert_eq!(mapped["fields"]["mobility"]["value"], json!("I"));
    assert_eq!(mapped["fields"]["ambulatory"]["value"], json!("1"));
}

#[test]
fn invalid_meta_schema_fails_at_construction() {
    let dir = TempDir::new().unwrap();
    let meta = write_fixture(&dir, "meta.json", &json!({"not": "a valid meta-schema"}));
    let external = write_fixture(&dir, "external.json", &json!({}));

    cmd()
        .arg("register")
        .arg("--meta-schema")
        .arg(&meta)
        .arg("--external-schema")
        .arg(&external)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Engine construction failed"));
}
