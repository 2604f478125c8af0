mod common;

use serde_json::json;

#[tokio::test]
async fn upsert_provider_profile_round_trips() {
    let (url, server_handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{url}/v1/config/providers"))
        .json(&json!({
            "id": "openai-staging",
            "kind": "openai",
            "base_uri": "https://staging.example.com/v1",
            "default_model": "gpt-4o-mini"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["id"], "openai-staging");
    assert_eq!(body["kind"], "openai");
    assert_eq!(body["base_uri"], "https://staging.example.com/v1");

    server_handle.abort();
}

#[tokio::test]
async fn upsert_provider_profile_defaults_unknown_kind_to_local_tool() {
    let (url, server_handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{url}/v1/config/providers"))
        .json(&json!({"id": "custom-tool", "base_uri": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "local_tool");

    server_handle.abort();
}

#[tokio::test]
async fn upsert_provider_profile_rejects_empty_id() {
    let (url, server_handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{url}/v1/config/providers"))
        .json(&json!({"id": "", "kind": "openai", "base_uri": "https://x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    server_handle.abort();
}

#[tokio::test]
async fn reconfigure_engine_accepts_a_valid_log_level() {
    let (url, server_handle) = common::spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{url}/v1/config/engine"))
        .json(&json!({"log_level": "debug"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["log_level"], "debug");

    server_handle.abort();
}
