// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::unwrap_used, clippy::expect_used)]

use fabricd::config::Config;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::time::Duration;

async fn start_test_server(config: Config) -> Option<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => return None,
        Err(e) => panic!("failed to bind test server listener: {e}"),
    };
    let addr = listener.local_addr().unwrap();

    let server_handle = tokio::spawn(async move {
        let (app, _state) = fabricd::server::create_app(config);
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    Some((addr, server_handle))
}

#[tokio::test]
async fn chain_start_and_signal_round_trip() {
    let Some((addr, _handle)) = start_test_server(Config::default()).await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };
    let client = reqwest::Client::new();

    let stages = serde_json::json!([
        {"services": ["svc-a"], "location": "local", "processor": "uppercase"},
        {"services": ["svc-b"], "location": "local"},
    ]);
    let response = client
        .post(format!("http://{addr}/chains"))
        .json(&stages)
        .send()
        .await
        .expect("chain start request failed");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    let chain_id = body["chainId"].as_str().unwrap().to_string();
    let node_id = body["nodes"][0].as_str().unwrap().to_string();

    let run = client
        .post(format!("http://{addr}/signal"))
        .json(&serde_json::json!({"signal": "NODE_RUN", "id": node_id, "data": "hi"}))
        .send()
        .await
        .expect("run signal failed");
    assert_eq!(run.status(), reqwest::StatusCode::OK);
    let output: serde_json::Value = run.json().await.unwrap();
    assert_eq!(output, serde_json::json!("HI"));

    let state = client
        .get(format!("http://{addr}/chains/{chain_id}/state"))
        .send()
        .await
        .expect("state request failed");
    assert_eq!(state.status(), reqwest::StatusCode::OK);
    let state_body: serde_json::Value = state.json().await.unwrap();
    assert!(state_body["completed"].as_array().unwrap().contains(&serde_json::json!(node_id)));
}

#[tokio::test]
async fn unknown_signal_is_rejected_without_crashing_the_server() {
    let Some((addr, _handle)) = start_test_server(Config::default()).await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/signal"))
        .json(&serde_json::json!({"signal": "DO_A_BARREL_ROLL"}))
        .send()
        .await
        .expect("signal request failed");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let health = client.get(format!("http://{addr}/health")).send().await.expect("health check failed");
    assert_eq!(health.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn inbound_setup_materializes_configured_local_service() {
    let mut config = Config::default();
    config.server.uid = "node-b".to_string();
    config.server.local_services = vec!["svc-remote".to_string()];

    let Some((addr, _handle)) = start_test_server(config).await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/fabric/setup"))
        .json(&serde_json::json!({
            "chainId": "node-a-1700000000000-1a2b3c4d",
            "remoteConfigs": {"services": ["svc-remote"]}
        }))
        .send()
        .await
        .expect("setup request failed");
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    let run = client
        .post(format!("http://{addr}/fabric/run"))
        .json(&serde_json::json!({
            "chainId": "node-a-1700000000000-1a2b3c4d",
            "targetId": "svc-remote",
            "data": 41
        }))
        .send()
        .await
        .expect("run request failed");
    assert_eq!(run.status(), reqwest::StatusCode::OK);
}
