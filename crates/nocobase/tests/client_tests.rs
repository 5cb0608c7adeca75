use assert_matches::assert_matches;
use base64::Engine as _;
use nodekit_core::error::NodeError;
use nodekit_nocobase::bulk::bulk_create;
use nodekit_nocobase::node::{run_items, NodeInput};
use nodekit_nocobase::operation::{BinaryData, QueryOptions, UploadRequest, UploadSource};
use nodekit_nocobase::search::{search_collections, search_records, search_workflows};
use nodekit_nocobase::{NocoBaseClient, NocoBaseCredentials, OperationRequest};
use serde_json::json;
use wiremock::matchers::{
    body_json, body_string_contains, header, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> NocoBaseClient {
    NocoBaseClient::new(NocoBaseCredentials::new(server.uri(), "secret-token"))
}

fn created(id: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"data": {"id": id}}))
}

#[tokio::test]
async fn list_sends_auth_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts:list"))
        .and(header("authorization", "Bearer secret-token"))
        .and(header("accept", "application/json"))
        .and(query_param("sort", "-createdAt"))
        .and(query_param("pageSize", "50"))
        .and(query_param("filter", r#"{"status":"draft"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": 1}]})))
        .expect(1)
        .mount(&server)
        .await;

    let query = QueryOptions {
        sort: Some("-createdAt".into()),
        page_size: Some(50),
        filter: Some(json!({"status": "draft"})),
        ..QueryOptions::default()
    };
    let response = client_for(&server)
        .execute(&OperationRequest::list("posts", Some(query)))
        .await
        .unwrap();
    assert_eq!(response, json!({"data": [{"id": 1}]}));
}

#[tokio::test]
async fn list_custom_drops_system_collections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/collections:list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "a"},
            {"name": "b", "origin": "core"},
            {"name": "c", "autoCreate": true}
        ])))
        .mount(&server)
        .await;

    let response = client_for(&server)
        .execute(&OperationRequest::list_custom(None))
        .await
        .unwrap();
    assert_eq!(response, json!([{"name": "a"}]));
}

#[tokio::test]
async fn disabled_workflow_is_never_triggered() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows:list"))
        .and(query_param("filter", r#"{"id":"5"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 5, "title": "Nightly sync", "enabled": false}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/workflows"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .execute(&OperationRequest::execute_workflow("5", None))
        .await
        .unwrap_err();
    assert_matches!(err, NodeError::WorkflowDisabled { ref title, .. } if title == "Nightly sync");
    assert_eq!(
        err.to_string(),
        "Workflow 'Nightly sync' (ID: 5) is disabled and cannot be triggered"
    );
}

#[tokio::test]
async fn missing_workflow_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows:list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/workflows"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .execute(&OperationRequest::execute_workflow("99", None))
        .await
        .unwrap_err();
    assert_matches!(err, NodeError::WorkflowNotFound(ref id) if id == "99");
}

#[tokio::test]
async fn enabled_workflow_is_triggered_with_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/workflows:list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": 5, "key": "wf5", "enabled": true}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/workflows"))
        .and(query_param("triggerWorkflows", "5"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"amount": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let data = json!({"amount": 3}).as_object().cloned();
    let response = client_for(&server)
        .execute(&OperationRequest::execute_workflow("5", data))
        .await
        .unwrap();
    assert_eq!(response, json!({"data": "ok"}));
}

#[tokio::test]
async fn non_success_status_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts:get"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .execute(&OperationRequest::get("posts", Some("1".into()), None))
        .await
        .unwrap_err();
    assert_matches!(err, NodeError::Api { status: 404, ref body } if body == "not found");
}

#[tokio::test]
async fn bulk_stops_at_first_invalid_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts:create"))
        .respond_with(created(1))
        .expect(1)
        .mount(&server)
        .await;

    let records = json!([{"title": "one"}, {}, {"title": "three"}]);
    let result = bulk_create(&client_for(&server), "posts", records, false)
        .await
        .unwrap();

    assert_eq!(result.total_records, 3);
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 1);
    assert!(result.summary.contains("record 1"), "{}", result.summary);
    assert!(result.summary.contains("validation error"));
}

#[tokio::test]
async fn bulk_creates_every_record_when_continuing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts:create"))
        .respond_with(created(1))
        .expect(3)
        .mount(&server)
        .await;

    let records = json!([{"title": "one"}, {"title": "two"}, {"title": "three"}]);
    let result = bulk_create(&client_for(&server), "posts", records, true)
        .await
        .unwrap();

    assert_eq!(result.success_count, 3);
    assert_eq!(result.failure_count, 0);
    assert_eq!(result.summary, "Successfully created all 3 records");
}

#[tokio::test]
async fn bulk_continues_past_invalid_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts:create"))
        .respond_with(created(1))
        .expect(2)
        .mount(&server)
        .await;

    let records = json!([{"title": "one"}, {}, {"title": "three"}]);
    let result = bulk_create(&client_for(&server), "posts", records, true)
        .await
        .unwrap();

    assert_eq!(result.results.len(), 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert_eq!(result.summary, "Created 2 of 3 records (1 failures)");
    assert_eq!(
        result.results[1].error.as_deref(),
        Some("Record at index 1 is an empty object")
    );
}

#[tokio::test]
async fn bulk_wraps_a_single_object_and_rejects_empty_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts:create"))
        .and(body_json(json!({"title": "solo"})))
        .respond_with(created(9))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = bulk_create(&client, "posts", json!({"title": "solo"}), false)
        .await
        .unwrap();
    assert_eq!(result.total_records, 1);

    let err = bulk_create(&client, "posts", json!([]), false)
        .await
        .unwrap_err();
    assert_matches!(err, NodeError::Validation(_));
}

#[tokio::test]
async fn upload_sends_multipart_file_and_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/attachments:create"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains(r#"name="file"; filename="cat.png""#))
        .and(body_string_contains("Content-Type: image/png"))
        .and(body_string_contains(r#"{"source":"camera"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"id": 3}})))
        .expect(1)
        .mount(&server)
        .await;

    let upload = UploadRequest {
        source: UploadSource::Binary {
            property: "data".into(),
            data: BinaryData {
                data: base64::engine::general_purpose::STANDARD.encode(b"PNGDATA"),
                file_name: Some("cat.png".into()),
                mime_type: None,
            },
        },
        file_name: None,
    };
    let metadata = json!({"title": "Cat", "meta": {"source": "camera"}});
    let response = client_for(&server)
        .execute(&OperationRequest::upload_file(
            "attachments",
            upload,
            metadata.as_object().cloned(),
        ))
        .await
        .unwrap();
    assert_eq!(response["data"]["id"], 3);
}

#[tokio::test]
async fn item_loop_records_errors_when_continuing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/app:getInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{"version":"1.4"}}"#))
        .mount(&server)
        .await;

    let items: Vec<NodeInput> = serde_json::from_value(json!([
        {"operation": "getServerInfo"},
        {"operation": "list"},
        {"operation": "nope"}
    ]))
    .unwrap();

    let client = client_for(&server);
    let output = run_items(&client, &items, true).await.unwrap();
    assert_eq!(output.len(), 3);
    assert_eq!(output[0]["data"]["version"], "1.4");
    assert!(output[1]["error"]
        .as_str()
        .unwrap()
        .contains("Collection ID is required"));
    assert!(output[2]["error"].as_str().unwrap().contains("'nope'"));

    let err = run_items(&client, &items, false).await.unwrap_err();
    assert_eq!(err.item_index, 1);
}

#[tokio::test]
async fn item_loop_runs_bulk_create() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts:create"))
        .respond_with(created(1))
        .expect(2)
        .mount(&server)
        .await;

    let items: Vec<NodeInput> = serde_json::from_value(json!([{
        "operation": "bulkCreate",
        "collectionName": {"mode": "list", "value": "posts"},
        "bulkData": "[{\"title\":\"a\"},{\"title\":\"b\"}]"
    }]))
    .unwrap();

    let output = run_items(&client_for(&server), &items, false).await.unwrap();
    assert_eq!(output[0]["successCount"], 2);
    assert_eq!(output[0]["totalRecords"], 2);
}

#[tokio::test]
async fn search_helpers_map_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/collections:list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"name": "posts", "title": "Blog Posts"},
            {"name": "users", "origin": "@nocobase/plugin-users"}
        ]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/workflows:list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": 1, "title": "Publish", "enabled": true},
            {"id": 2, "title": "Archive", "enabled": false},
            {"id": 3, "enabled": true}
        ]})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let collections = search_collections(&client, Some("blog")).await;
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].name, "Blog Posts");
    assert_eq!(collections[0].value, "posts");
    assert_eq!(
        collections[0].url.as_deref(),
        Some(format!("{}/api/posts", server.uri()).as_str())
    );

    let workflows = search_workflows(&client, None).await;
    let names: Vec<&str> = workflows.iter().map(|w| w.name.as_str()).collect();
    assert_eq!(names, vec!["Publish", "Workflow ID: 3"]);
}

#[tokio::test]
async fn search_records_pages_until_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notes:list"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/notes:list"))
        .and(query_param("sort", "-createdAt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": 1, "title": "Groceries"},
            {"id": 2, "title": "Meeting notes"},
            {"id": 3, "name": "grocery run"}
        ]})))
        .expect(1)
        .mount(&server)
        .await;

    let results = search_records(&client_for(&server), "notes", "title", Some("GROC")).await;
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Groceries (ID: 1)"]);
}

#[tokio::test]
async fn search_degrades_to_empty_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(search_records(&client, "notes", "title", None).await.is_empty());
    assert!(search_workflows(&client, None).await.is_empty());
}
