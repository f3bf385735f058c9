//! HTTP-level tests for `CkanClient` against a wiremock server.
//!
//! The client is blocking, so the mock server runs on a multi-threaded tokio
//! runtime and requests are issued from the test thread.

use std::io::Read;

use ckanny_api::{
    Catalog, CkanClient, ClientConfig, ContentFetcher, DatastoreSearch, DatastoreUpsert, Error,
    InsertMethod, NewResource, Record, Upload,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    runtime: Runtime,
}

impl Harness {
    fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    fn client(&self) -> CkanClient {
        CkanClient::new(ClientConfig::new(self.server.uri())).unwrap()
    }

    fn client_with_key(&self, key: &str) -> CkanClient {
        let config = ClientConfig::new(self.server.uri()).with_api_key(Some(key.to_string()));
        CkanClient::new(config).unwrap()
    }
}

fn action(name: &str) -> String {
    format!("/api/3/action/{}", name)
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"success": true, "result": result}))
}

fn failure(status: u16, error: Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({"success": false, "error": error}))
}

#[test]
fn package_show_decodes_result() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("package_show")))
            .and(body_partial_json(json!({"id": "hash-table"})))
            .respond_with(ok(json!({
                "id": "pkg-1",
                "name": "hash-table",
                "resources": [{"id": "res-1", "name": "hash-table.csv"}]
            }))),
    );

    let package = harness.client().package_show("hash-table").unwrap();

    assert_eq!(package.id, "pkg-1");
    assert_eq!(package.resources.len(), 1);
    assert_eq!(package.resources[0].id, "res-1");
}

#[test]
fn not_found_error_is_typed() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("package_show")))
            .respond_with(failure(
                404,
                json!({"__type": "Not Found Error", "message": "Not found"}),
            )),
    );

    let err = harness.client().package_show("missing").unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {:?}", err);
}

#[test]
fn resource_show_not_found_names_the_resource() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("resource_show")))
            .respond_with(failure(
                404,
                json!({"__type": "Not Found Error", "message": "Not found"}),
            )),
    );

    let err = harness.client().resource_show("rid").unwrap_err();
    assert_eq!(err.to_string(), "Not found: Resource `rid` was not found in filestore.");
}

#[test]
fn validation_error_keeps_field_errors() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("datastore_create")))
            .respond_with(failure(
                409,
                json!({"__type": "Validation Error", "resource_id": ["Not found: Resource"]}),
            )),
    );

    let request = ckanny_api::DatastoreCreate {
        resource_id: "rid".into(),
        ..Default::default()
    };
    let err = harness.client().datastore_create(&request).unwrap_err();

    assert_eq!(err.field_errors("resource_id"), vec!["Not found: Resource"]);
}

#[test]
fn api_key_header_is_sent() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("organization_list_for_user")))
            .and(header("X-CKAN-API-Key", "secret"))
            .and(body_partial_json(json!({"permission": "admin_group"})))
            .respond_with(ok(json!([
                {"id": "org-1", "name": "hdx", "display_name": "HDX"}
            ]))),
    );

    let orgs = harness
        .client_with_key("secret")
        .organization_list_for_user("admin_group")
        .unwrap();

    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].display_name, "HDX");
}

#[test]
fn datastore_upsert_sends_method_and_records() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("datastore_upsert")))
            .and(body_partial_json(json!({
                "resource_id": "ledger",
                "method": "upsert",
                "records": [{"datastore_id": "r1", "hash": "h1"}]
            })))
            .respond_with(ok(json!({}))),
    );

    let mut record = Record::new();
    record.insert("datastore_id".into(), json!("r1"));
    record.insert("hash".into(), json!("h1"));
    let request = DatastoreUpsert {
        resource_id: "ledger".into(),
        records: vec![record],
        method: InsertMethod::Upsert,
        force: false,
    };

    harness.client().datastore_upsert(&request).unwrap();
}

#[test]
fn oversized_payload_is_reported() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("datastore_upsert")))
            .respond_with(ResponseTemplate::new(413)),
    );

    let request = DatastoreUpsert {
        resource_id: "rid".into(),
        ..Default::default()
    };
    let err = harness.client().datastore_upsert(&request).unwrap_err();

    assert!(matches!(err, Error::PayloadTooLarge { .. }), "got {:?}", err);
}

#[test]
fn datastore_search_returns_records() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("datastore_search")))
            .and(body_partial_json(json!({"filters": {"datastore_id": "r1"}, "limit": 1})))
            .respond_with(ok(json!({"records": [{"hash": "abc"}], "total": 1}))),
    );

    let mut filters = serde_json::Map::new();
    filters.insert("datastore_id".into(), json!("r1"));
    let request = DatastoreSearch {
        resource_id: "ledger".into(),
        filters,
        fields: vec!["hash".into()],
        limit: Some(1),
    };
    let result = harness.client().datastore_search(&request).unwrap();

    assert_eq!(result.records[0]["hash"], "abc");
    assert_eq!(result.total, Some(1));
}

#[test]
fn resource_create_with_upload_is_multipart() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("resource_create")))
            .respond_with(ok(json!({"id": "res-9", "package_id": "pkg-1"}))),
    );

    let resource = NewResource {
        package_id: Some("pkg-1".into()),
        name: Some("hash-table.csv".into()),
        url: "http://example.com".into(),
        format: Some("csv".into()),
        ..Default::default()
    };
    let upload = Upload {
        file_name: "hash-table.csv".into(),
        bytes: b"datastore_id,hash\n".to_vec(),
    };

    let created = harness
        .client()
        .resource_create(&resource, Some(upload))
        .unwrap();
    assert_eq!(created.id, "res-9");

    let requests = harness.runtime.block_on(harness.server.received_requests()).unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"), "got {}", content_type);
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("datastore_id,hash"));
    assert!(body.contains("name=\"package_id\""));
}

#[test]
fn fetch_downloads_resource_body() {
    let harness = Harness::start();
    let file_url = format!("{}/files/data.csv", harness.server.uri());
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("resource_show")))
            .respond_with(ok(json!({"id": "r1", "url": file_url}))),
    );
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/files/data.csv"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("a,b\n1,2\n", "text/csv; charset=utf-8"),
            ),
    );

    let mut fetched = harness.client().fetch("r1").unwrap();
    let mut body = String::new();
    fetched.body.read_to_string(&mut body).unwrap();

    assert_eq!(body, "a,b\n1,2\n");
    assert_eq!(fetched.content_type.as_deref(), Some("text/csv"));
    assert_eq!(fetched.encoding.as_deref(), Some("utf-8"));
    assert_eq!(fetched.file_name.as_deref(), Some("data.csv"));
}

#[test]
fn fetch_forbidden_is_not_authorized() {
    let harness = Harness::start();
    let file_url = format!("{}/files/private.csv", harness.server.uri());
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("resource_show")))
            .respond_with(ok(json!({"id": "r1", "url": file_url}))),
    );
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/files/private.csv"))
            .respond_with(ResponseTemplate::new(403)),
    );

    let err = harness.client().fetch("r1").unwrap_err();
    assert!(matches!(err, Error::NotAuthorized { .. }), "got {:?}", err);
}

#[test]
fn fetch_from_other_host_omits_api_key() {
    let harness = Harness::start();
    let files = harness.runtime.block_on(MockServer::start());
    let file_url = format!("{}/files/data.csv", files.uri());
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("resource_show")))
            .and(header("X-CKAN-API-Key", "secret"))
            .respond_with(ok(json!({"id": "r1", "url": file_url}))),
    );
    harness.runtime.block_on(
        Mock::given(method("GET"))
            .and(path("/files/data.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a\n1\n"))
            .mount(&files),
    );

    harness.client_with_key("secret").fetch("r1").unwrap();

    let requests = harness
        .runtime
        .block_on(files.received_requests())
        .unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("X-CKAN-API-Key").is_none());
}

#[test]
fn fetch_from_own_host_sends_api_key() {
    let harness = Harness::start();
    let file_url = format!("{}/dataset/d/resource/r1/download/data.csv", harness.server.uri());
    harness.mount(
        Mock::given(method("POST"))
            .and(path(action("resource_show")))
            .respond_with(ok(json!({"id": "r1", "url": file_url}))),
    );
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/dataset/d/resource/r1/download/data.csv"))
            .and(header("X-CKAN-API-Key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a\n1\n")),
    );

    let fetched = harness.client_with_key("secret").fetch("r1").unwrap();
    assert_eq!(fetched.file_name.as_deref(), Some("data.csv"));
}
