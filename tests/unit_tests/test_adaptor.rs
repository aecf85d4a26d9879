// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    api::{
        self,
        adaptor::ApiRequest,
        gate::{FnGate, NoGate},
    },
    cfg::config::GatewayConfig,
};
use serde_json::json;

fn cfg() -> GatewayConfig {
    GatewayConfig::default()
}

#[tokio::test]
async fn wrong_method_is_405() {
    let req = ApiRequest {
        method: "GET".to_string(),
        body: json!({"host": "h"}),
    };
    let resp = api::dispatch(&cfg(), &NoGate, "smtp/probe", req)
        .await
        .expect("route");
    assert_eq!(resp.status, 405);
    assert!(resp.body["error"].is_string());
}

#[tokio::test]
async fn missing_host_is_400() {
    let resp = api::dispatch(&cfg(), &NoGate, "iscsi/discover", ApiRequest::post(json!({})))
        .await
        .expect("route");
    assert_eq!(resp.status, 400);
}

#[tokio::test]
async fn bad_port_is_400() {
    let resp = api::dispatch(
        &cfg(),
        &NoGate,
        "smb/probe",
        ApiRequest::post(json!({"host": "h", "port": 99999})),
    )
    .await
    .expect("route");
    assert_eq!(resp.status, 400);
}

#[tokio::test]
async fn invalid_host_characters_are_400() {
    let resp = api::dispatch(
        &cfg(),
        &NoGate,
        "smb/probe",
        ApiRequest::post(json!({"host": "bad host!"})),
    )
    .await
    .expect("route");
    assert_eq!(resp.status, 400);
}

#[tokio::test]
async fn blocked_target_is_403_with_cloudflare_flag() {
    let gate = FnGate(|h: &str| h == "edge.example");
    let resp = api::dispatch(
        &cfg(),
        &gate,
        "smb/probe",
        ApiRequest::post(json!({"host": "edge.example"})),
    )
    .await
    .expect("route");
    assert_eq!(resp.status, 403);
    assert_eq!(resp.body["success"], false);
    assert_eq!(resp.body["isCloudflare"], true);
}

#[tokio::test]
async fn unknown_route_is_none() {
    let resp = api::dispatch(
        &cfg(),
        &NoGate,
        "gopher/fetch",
        ApiRequest::post(json!({"host": "h"})),
    )
    .await;
    assert!(resp.is_none());
}

#[tokio::test]
async fn missing_endpoint_specific_field_is_400() {
    // smb/list requires a share before it ever opens a socket.
    let resp = api::dispatch(
        &cfg(),
        &NoGate,
        "smb/list",
        ApiRequest::post(json!({"host": "h"})),
    )
    .await
    .expect("route");
    assert_eq!(resp.status, 400);

    // radius/auth requires the shared secret.
    let resp = api::dispatch(
        &cfg(),
        &NoGate,
        "radius/auth",
        ApiRequest::post(json!({"host": "h", "username": "u"})),
    )
    .await
    .expect("route");
    assert_eq!(resp.status, 400);
}

#[tokio::test]
async fn vault_health_accepts_any_method() {
    // The handler skips the method gate; with an unroutable host the
    // failure must be a transport error (500), never a 405.
    let req = ApiRequest {
        method: "GET".to_string(),
        body: json!({"host": "vault.invalid", "timeout": 200}),
    };
    let resp = api::dispatch(&cfg(), &NoGate, "vault/health", req)
        .await
        .expect("route");
    assert_ne!(resp.status, 405);
}
