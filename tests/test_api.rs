//! CRUD API client against a mock server

use openrequest::api::{ApiClient, CollectionSource};
use openrequest::config::ApiConfig;
use openrequest::models::{
    CollectionUpdate, EnvironmentInput, NewCollection, RequestUpdate, VariableTable,
};
use openrequest::OpenRequestError;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&ApiConfig {
        base_url: format!("{}/", server.uri()),
        ..ApiConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_list_and_fetch_collections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/collection"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_id": "c1", "name": "Users", "size": 2}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/collection/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "c1",
            "name": "Users",
            "requests": [
                {"_id": "r1", "name": "List", "method": "GET", "url": "{{base}}/users", "bodyType": "none"}
            ]
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    let collections = api.get_collections().await.unwrap();
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].size, 2);

    let full = api.get_collection("c1").await.unwrap();
    assert_eq!(full.name, "Users");
    assert_eq!(full.requests[0].url, "{{base}}/users");
}

#[tokio::test]
async fn test_create_and_update_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/collection"))
        .and(body_json(json!({"name": "New", "description": "d"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"_id": "c9", "name": "New"})))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/collection/c9"))
        .and(body_json(json!({"name": "Renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"_id": "c9", "name": "Renamed"})))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/collection/c9/request/r1"))
        .and(body_json(json!({"url": "http://x"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "r1", "method": "GET", "url": "http://x"
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    let created = api
        .create_collection(&NewCollection {
            name: "New".to_string(),
            description: "d".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(created.id, "c9");

    let renamed = api
        .update_collection(
            "c9",
            &CollectionUpdate {
                name: Some("Renamed".to_string()),
                ..CollectionUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Renamed");

    let request = api
        .update_request(
            "c9",
            "r1",
            &RequestUpdate {
                url: Some("http://x".to_string()),
                ..RequestUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(request.url, "http://x");
}

#[tokio::test]
async fn test_environments() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/environment/search"))
        .and(query_param("q", "dev env"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_id": "e1", "name": "dev env", "variables": {"base": "http://localhost"}, "isActive": true}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/environment"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "_id": "e2", "name": "prod", "variables": {}
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/environment/e2"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let api = client(&server);
    let found = api.search_environments("dev env").await.unwrap();
    assert_eq!(found[0].variables.get("base").map(String::as_str), Some("http://localhost"));
    assert!(found[0].is_active);

    let created = api
        .create_environment(&EnvironmentInput {
            name: "prod".to_string(),
            variables: VariableTable::new(),
        })
        .await
        .unwrap();
    assert_eq!(created.id, "e2");
    assert!(!created.is_active);

    api.delete_environment("e2").await.unwrap();
}

#[tokio::test]
async fn test_error_message_from_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/collection/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Collection not found"})))
        .mount(&server)
        .await;

    let err = client(&server).get_collection_by_id("missing").await.unwrap_err();
    match err {
        OpenRequestError::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Collection not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_without_body_uses_reason() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client(&server).delete_collection("c1").await.unwrap_err();
    assert!(matches!(
        err,
        OpenRequestError::Api { status: 500, ref message } if message == "Internal Server Error"
    ));
}
