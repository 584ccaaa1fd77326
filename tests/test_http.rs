//! HTTP transport tests
//!
//! Runs pipelines over real HTTP against wiremock servers. The pipeline is
//! blocking, so it runs inside `spawn_blocking`.

mod common;

use std::time::Duration;

use restchain::client::HttpTransport;
use restchain::pipeline::{
    EndpointOutcome, MemorySink, Pipeline, PipelineConfig, RunReport, SaveKind,
};
use restchain::store::VariableStore;
use serde_json::json;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::yaml_pipeline;

/// Run `config` against its base URL, returning the report, the final store
/// and the saved records.
async fn run(config: PipelineConfig) -> (RunReport, VariableStore, MemorySink) {
    tokio::task::spawn_blocking(move || {
        let transport = HttpTransport::new(Some(Duration::from_secs(5))).unwrap();
        let mut pipeline = Pipeline::from_config(&config, transport).unwrap();
        let mut sink = MemorySink::new();
        let report = pipeline.run(&mut sink).unwrap();
        (report, pipeline.store().clone(), sink)
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_get_sends_parameters_api_key_and_accept() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/bibs/991"))
        .and(query_param("view", "full"))
        .and(query_param("apikey", "k3y"))
        .and(header("accept", "application/json"))
        .and(header("x-tenant", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bib": {"mms_id": "991", "title": "Faust"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = yaml_pipeline(&format!(
        r#"
url: {}/v1
api-key: k3y
commands:
  - endpoint: bibs/{{mms}}
    values:
      mms: "991"
    parameters:
      view: full
    headers:
      X-Tenant: main
    targets:
      - var: title
        path: bib.title
"#,
        server.uri()
    ));

    let (report, store, _) = run(config).await;
    assert!(report.success());
    assert_eq!(store.get("title"), vec![json!("Faust")]);

    // the reported URL hides the key
    let url = &report.commands[0].endpoints[0].url;
    assert!(!url.contains("k3y"), "{}", url);
}

#[tokio::test]
async fn test_put_sends_wrapped_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item_data": {"barcode": "B-7"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/items/7"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"item": {"barcode": "B-7", "note": "checked"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let config = yaml_pipeline(&format!(
        r#"
url: {}
variables:
  - name: id
    value: "7"
commands:
  - endpoint: items/{{$id}}
    targets:
      - var: barcode
        path: item_data.barcode
  - endpoint: items/{{$id}}
    method: PUT
    body:
      type: json
      content: '{{"barcode": "{{$barcode}}", "note": "{{note}}"}}'
      wrapper: item
    values:
      note: checked
    targets:
      - var: ok
        path: ok
"#,
        server.uri()
    ));

    let (report, store, _) = run(config).await;
    assert!(report.success(), "{:?}", report);
    assert_eq!(store.get("ok"), vec![json!(true)]);
}

#[tokio::test]
async fn test_xml_post_is_not_parsed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/requests"))
        .and(header("accept", "application/xml"))
        .and(header("content-type", "application/xml"))
        .and(body_string("<request><id>5</id></request>"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<ok/>"))
        .expect(1)
        .mount(&server)
        .await;

    let config = yaml_pipeline(&format!(
        r#"
url: {}
commands:
  - endpoint: requests
    method: post
    accept: xml
    body:
      type: xml
      content: "<id>5</id>"
      wrapper: request
    targets:
      - var: anything
        path: ok
"#,
        server.uri()
    ));

    let (report, store, _) = run(config).await;
    assert!(report.success());
    assert_eq!(report.commands[0].endpoints[0].outcome, EndpointOutcome::NotParsed);
    assert!(!store.contains("anything"));
}

#[tokio::test]
async fn test_error_status_body_is_still_used() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errorList": {"error": [{"errorCode": "401689"}]}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let config = yaml_pipeline(&format!(
        r#"
url: {}
commands:
  - endpoint: missing
    targets:
      - var: code
        path: errorList.error.errorCode
  - endpoint: broken
    targets:
      - var: never
        path: x
"#,
        server.uri()
    ));

    let (report, store, _) = run(config).await;
    assert!(report.success());
    assert_eq!(store.get("code"), vec![json!("401689")]);
    assert!(report.commands[1].failed());
}

#[tokio::test]
async fn test_fan_out_and_save() {
    let server = MockServer::start().await;

    for (id, library) in [("1", "MAIN"), ("2", "LAW")] {
        Mock::given(method("GET"))
            .and(path(format!("/holdings/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "holding": {"library": {"value": library}}
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = yaml_pipeline(&format!(
        r#"
url: {}
variables:
  - name: holding
    value: ["1", "2"]
commands:
  - endpoint: holdings/{{$holding}}
    targets:
      - var: library
        path: holding.library.value
saves:
  - type: property
    name: Library
    value: library
    choice: first
"#,
        server.uri()
    ));

    let (report, store, sink) = run(config).await;
    assert!(report.success());
    assert_eq!(store.get("library"), vec![json!("LAW")]);
    assert_eq!(sink.records().len(), 1);
    assert_eq!(sink.records()[0].kind, SaveKind::Property);
    assert_eq!(sink.values_of("Library"), vec!["LAW"]);
}

#[tokio::test]
async fn test_unreachable_server_is_reported() {
    let config = yaml_pipeline(
        r#"
url: http://127.0.0.1:9
commands:
  - endpoint: anything
"#,
    );

    let (report, _, _) = run(config).await;
    assert!(report.success());
    assert!(matches!(
        report.commands[0].endpoints[0].outcome,
        EndpointOutcome::Failed { .. }
    ));
}
