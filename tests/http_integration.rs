//! Integration tests for the resource handlers using wiremock
//!
//! These run the real client (static test token, base paths pointed at a
//! mock server) through full handler flows: CRUD, pagination, drift on 404,
//! retry on quota errors, and operation polling.

use gcpsync::config::ProviderConfig;
use gcpsync::gcp::auth::GcpCredentials;
use gcpsync::gcp::client::GcpClient;
use gcpsync::resource::{pager, ReadOutcome};
use gcpsync::services::{alloydb, secretmanager};
use gcpsync::state::ResourceState;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{bearer_token, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Client whose every service base points at the mock server
fn mock_client(server: &MockServer) -> GcpClient {
    let base = format!("{}/v1", server.uri());
    let mut config = ProviderConfig::with_project("test-project");
    config.alloydb_base_path = Some(base.clone());
    config.kms_base_path = Some(base.clone());
    config.secret_manager_regional_base_path = Some(base.clone());
    config.tpu_v2_base_path = Some(base);
    config.operation_poll_interval = Duration::from_millis(10);

    GcpClient::with_credentials(config, GcpCredentials::from_static_token("test-token")).unwrap()
}

mod regional_secret_tests {
    use super::*;

    const SECRET_PATH: &str = "/v1/projects/test-project/locations/us-central1/secrets/db-password";

    #[tokio::test]
    async fn test_create_read_delete_cycle() {
        let server = MockServer::start().await;
        let client = mock_client(&server);

        let secret_doc = json!({
            "name": "projects/test-project/locations/us-central1/secrets/db-password",
            "labels": {"team": "infra"},
            "createTime": "2026-08-01T00:00:00Z"
        });

        Mock::given(method("POST"))
            .and(path("/v1/projects/test-project/locations/us-central1/secrets"))
            .and(query_param("secretId", "db-password"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&secret_doc))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(SECRET_PATH))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&secret_doc))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path(SECRET_PATH))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let mut state = ResourceState::new();
        state.set("secret_id", "db-password");
        state.set("location", "us-central1");
        state.set("labels", json!({"team": "infra"}));

        secretmanager::regional_secret::create(&client, &mut state)
            .await
            .expect("create should succeed");

        assert_eq!(
            state.id(),
            Some("projects/test-project/locations/us-central1/secrets/db-password")
        );
        assert_eq!(state.get_str("create_time"), Some("2026-08-01T00:00:00Z"));
        assert_eq!(state.get("labels").unwrap()["team"], "infra");

        secretmanager::regional_secret::delete(&client, &mut state)
            .await
            .expect("delete should succeed");
        assert!(state.id().is_none());
    }

    #[tokio::test]
    async fn test_read_404_removes_from_state() {
        let server = MockServer::start().await;
        let client = mock_client(&server);

        Mock::given(method("GET"))
            .and(path(SECRET_PATH))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"code": 404, "message": "Secret not found"}
            })))
            .mount(&server)
            .await;

        let mut state = ResourceState::with_id(
            "projects/test-project/locations/us-central1/secrets/db-password",
        );
        state.set("secret_id", "db-password");

        let outcome = secretmanager::regional_secret::read(&client, &mut state)
            .await
            .expect("404 is drift, not an error");

        assert_eq!(outcome, ReadOutcome::Removed);
        assert!(state.id().is_none());
        assert!(state.get("secret_id").is_none());
    }

    #[tokio::test]
    async fn test_version_access_decodes_payload() {
        let server = MockServer::start().await;
        let client = mock_client(&server);

        let version_path = format!("{}/versions/3", SECRET_PATH);

        Mock::given(method("GET"))
            .and(path(format!("{}/versions/latest", SECRET_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/locations/us-central1/secrets/db-password/versions/3",
                "state": "ENABLED",
                "createTime": "2026-08-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}:access", version_path)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "payload": {"data": "aHVudGVyMg=="}
            })))
            .mount(&server)
            .await;

        let mut state = ResourceState::new();
        state.set("secret", "us-central1/db-password");

        secretmanager::regional_secret_version::read(&client, &mut state)
            .await
            .expect("version read should succeed");

        assert_eq!(state.get_str("version"), Some("3"));
        assert_eq!(state.get_str("secret_data"), Some("hunter2"));
        assert_eq!(state.get_str("secret_data_base64"), Some("aHVudGVyMg=="));
        assert_eq!(state.get_bool("enabled"), Some(true));
    }
}

mod pagination_tests {
    use super::*;

    /// Three pages means exactly three requests, no more
    #[tokio::test]
    async fn test_list_follows_tokens_with_one_request_per_page() {
        let server = MockServer::start().await;
        let client = mock_client(&server);
        let list_path = "/v1/projects/test-project/locations/us-central1/secrets";

        Mock::given(method("GET"))
            .and(path(list_path))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secrets": [{"name": "c"}, {"name": "d"}],
                "nextPageToken": "page-3"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(list_path))
            .and(query_param("pageToken", "page-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secrets": [{"name": "e"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(list_path))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "secrets": [{"name": "a"}, {"name": "b"}],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}{}", server.uri(), list_path);
        let items = pager::list_all(&client, &url, "secrets", &[])
            .await
            .expect("list should succeed");

        assert_eq!(items.len(), 5);
        assert_eq!(items[0]["name"], "a");
        assert_eq!(items[4]["name"], "e");
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }
}

mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_429_is_retried_then_succeeds() {
        let server = MockServer::start().await;
        let client = mock_client(&server);

        Mock::given(method("GET"))
            .and(path("/v1/rate-limited"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"code": 429, "message": "Rate limit exceeded"}
            })))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/rate-limited"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/v1/rate-limited", server.uri());
        let response = client
            .get(&url, Duration::from_secs(10))
            .await
            .expect("retry should recover from 429");

        assert_eq!(response["ok"], true);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_400_is_not_retried() {
        let server = MockServer::start().await;
        let client = mock_client(&server);

        Mock::given(method("GET"))
            .and(path("/v1/bad-request"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "Invalid field"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/v1/bad-request", server.uri());
        let err = client
            .get(&url, Duration::from_secs(10))
            .await
            .expect_err("400 should fail");

        assert!(err.to_string().contains("Invalid field"));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}

mod alloydb_operation_tests {
    use super::*;

    #[tokio::test]
    async fn test_cluster_create_polls_operation_to_completion() {
        let server = MockServer::start().await;
        let client = mock_client(&server);

        let cluster_path = "/v1/projects/test-project/locations/us-central1/clusters/primary";
        let op_path = "/v1/projects/test-project/locations/us-central1/operations/op-1";

        Mock::given(method("POST"))
            .and(path("/v1/projects/test-project/locations/us-central1/clusters"))
            .and(query_param("clusterId", "primary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/locations/us-central1/operations/op-1",
                "done": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        // first poll still pending, second poll done
        Mock::given(method("GET"))
            .and(path(op_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/locations/us-central1/operations/op-1",
                "done": false
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(op_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/locations/us-central1/operations/op-1",
                "done": true,
                "response": {
                    "name": "projects/test-project/locations/us-central1/clusters/primary"
                }
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(cluster_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/locations/us-central1/clusters/primary",
                "state": "READY",
                "network": "projects/test-project/global/networks/default",
                "databaseVersion": "POSTGRES_15"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut state = ResourceState::new();
        state.set("cluster_id", "primary");
        state.set("location", "us-central1");
        state.set("network", "projects/test-project/global/networks/default");

        alloydb::cluster::create(&client, &mut state)
            .await
            .expect("create should succeed");

        assert_eq!(state.get_str("state"), Some("READY"));
        assert_eq!(state.get_str("database_version"), Some("POSTGRES_15"));
    }

    #[tokio::test]
    async fn test_failed_operation_surfaces_server_message() {
        let server = MockServer::start().await;
        let client = mock_client(&server);

        Mock::given(method("POST"))
            .and(path("/v1/projects/test-project/locations/us-central1/clusters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/test-project/locations/us-central1/operations/op-2",
                "done": true,
                "error": {"code": 8, "message": "quota exhausted for CPUs"}
            })))
            .mount(&server)
            .await;

        let mut state = ResourceState::new();
        state.set("cluster_id", "primary");
        state.set("location", "us-central1");

        let err = alloydb::cluster::create(&client, &mut state)
            .await
            .expect_err("failed operation should propagate");
        assert!(err.to_string().contains("quota exhausted for CPUs"));
    }
}
