//! CLI tests
//!
//! Invokes the restchain binary for validation, error exits and full runs.

mod common;

use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{restchain, write_pipeline};

const VALID: &str = r#"
url: http://localhost:1
commands:
  - name: lookup
    endpoint: bibs/{mms_id}
  - endpoint: items/{$id}
"#;

#[test]
fn test_help() {
    restchain()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--var"));
}

#[test]
fn test_missing_pipeline_argument() {
    restchain().assert().code(1);
}

#[test]
fn test_missing_pipeline_file() {
    let dir = tempfile::tempdir().unwrap();
    restchain()
        .arg(dir.path().join("nope.yaml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_validate_reports_unresolved_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_pipeline(dir.path(), "pipeline.yaml", VALID);

    restchain()
        .arg(&file)
        .arg("--validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid: 2 commands"))
        .stdout(predicate::str::contains("lookup has no value for {mms_id}"));
}

#[test]
fn test_invalid_pipeline_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_pipeline(dir.path(), "pipeline.yaml", "url: http://x\ncommands: []\n");

    restchain()
        .arg(&file)
        .arg("--validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("at least one command"));
}

#[test]
fn test_invalid_var_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_pipeline(dir.path(), "pipeline.yaml", VALID);

    restchain()
        .arg(&file)
        .args(["--var", "novalue", "--validate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("NAME=VALUE"));
}

#[tokio::test]
async fn test_full_run_with_json_report() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/7"))
        .and(query_param("apikey", "from-env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"barcode": "B-7"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_pipeline(
        dir.path(),
        "pipeline.toml",
        r#"
[[commands]]
endpoint = "items/{$id}"

[[commands.targets]]
var = "barcode"
path = "barcode"

[[saves]]
type = "property"
name = "Barcode"
value = "barcode"
"#,
    );
    let uri = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        restchain()
            .arg(&file)
            .args(["--url", &uri, "--var", "id=7", "--format", "json"])
            .env("RESTCHAIN_API_KEY", "from-env")
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert!(lines.iter().any(|l| l["event"] == "pipeline_summary" && l["state"] == "SUCCESS"));
    assert!(lines
        .iter()
        .any(|l| l["event"] == "saved_record" && l["name"] == "Barcode" && l["value"] == "B-7"));
    assert!(!stdout.contains("from-env"));
}

#[tokio::test]
async fn test_failed_run_exits_with_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/record"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_pipeline(
        dir.path(),
        "pipeline.yaml",
        &format!(
            r#"
url: {}
commands:
  - endpoint: record
    update:
      var: record
      entries:
        - path: id.value
          value: "1"
"#,
            server.uri()
        ),
    );

    let output = tokio::task::spawn_blocking(move || restchain().arg(&file).output().unwrap())
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Result: FAILED"));
}
