// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Probes that speak plain HTTP/1.1 over the raw transport: RabbitMQ
//! management, Vault health, JSON-RPC, and the Graphite plaintext feed.

use chrono::Utc;
use serde::Serialize;

use crate::{
    cfg::config::GatewayConfig,
    error::{ProbeError, Result, WireCode},
    models::http::HttpRequest,
    transport::{conn::Target, framing::FrameReader, session::with_session},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RabbitMqOverviewResult {
    pub status: u16,
    pub rabbitmq_version: Option<String>,
    pub erlang_version: Option<String>,
    pub cluster_name: Option<String>,
    pub node: Option<String>,
}

/// GET `/api/overview` with Basic auth against the management plugin.
pub async fn rabbitmq_overview(
    cfg: &GatewayConfig,
    target: &Target,
    username: &str,
    password: &str,
) -> Result<RabbitMqOverviewResult> {
    let cap = cfg.caps.http_response;
    let ua = cfg.identity.http_user_agent.clone();
    let host = target.host.clone();
    let port = target.port;
    let username = username.to_string();
    let password = password.to_string();
    with_session(target, async |t| {
        let req = HttpRequest::new("GET", "/api/overview", &host, port, &ua)
            .basic_auth(&username, &password);
        t.write_all(&req.render()).await?;

        let mut fr = FrameReader::new(cap);
        let resp = fr.read_http_response(t).await?;
        if resp.status == 401 {
            return Err(ProbeError::auth_fail("management API rejected credentials")
                .with_code(WireCode::Http(401)));
        }
        if resp.status != 200 {
            return Err(ProbeError::protocol(format!(
                "management API returned HTTP {}",
                resp.status
            ))
            .with_code(WireCode::Http(resp.status)));
        }

        let body: serde_json::Value = serde_json::from_slice(&resp.body)
            .map_err(|_| ProbeError::malformed("overview body is not JSON"))?;
        let get = |k: &str| body.get(k).and_then(|v| v.as_str()).map(str::to_string);

        Ok(RabbitMqOverviewResult {
            status: resp.status,
            rabbitmq_version: get("rabbitmq_version"),
            erlang_version: get("erlang_version"),
            cluster_name: get("cluster_name"),
            node: get("node"),
        })
    })
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultHealthResult {
    pub status: u16,
    pub initialized: Option<bool>,
    pub sealed: Option<bool>,
    pub standby: Option<bool>,
    pub version: Option<String>,
}

/// GET `/v1/sys/health`. Vault encodes health in the status code as much
/// as the body, so non-200 statuses are still results here.
pub async fn vault_health(cfg: &GatewayConfig, target: &Target) -> Result<VaultHealthResult> {
    let cap = cfg.caps.http_response;
    let ua = cfg.identity.http_user_agent.clone();
    let host = target.host.clone();
    let port = target.port;
    with_session(target, async |t| {
        let req = HttpRequest::new("GET", "/v1/sys/health", &host, port, &ua);
        t.write_all(&req.render()).await?;

        let mut fr = FrameReader::new(cap);
        let resp = fr.read_http_response(t).await?;
        let body: serde_json::Value =
            serde_json::from_slice(&resp.body).unwrap_or(serde_json::Value::Null);

        Ok(VaultHealthResult {
            status: resp.status,
            initialized: body.get("initialized").and_then(|v| v.as_bool()),
            sealed: body.get("sealed").and_then(|v| v.as_bool()),
            standby: body.get("standby").and_then(|v| v.as_bool()),
            version: body
                .get("version")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    })
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonRpcCallResult {
    pub status: u16,
    pub response: serde_json::Value,
}

/// Single JSON-RPC 2.0 call; the request id is always 1.
pub async fn jsonrpc_call(
    cfg: &GatewayConfig,
    target: &Target,
    path: &str,
    method: &str,
    rpc_params: serde_json::Value,
) -> Result<JsonRpcCallResult> {
    let payload = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": rpc_params,
        "id": 1,
    });
    post_json(cfg, target, path, payload).await
}

/// Batch call: ids are assigned 1..N in request order, and any caller ids
/// are ignored.
pub async fn jsonrpc_batch(
    cfg: &GatewayConfig,
    target: &Target,
    path: &str,
    calls: &[(String, serde_json::Value)],
) -> Result<JsonRpcCallResult> {
    let payload: Vec<serde_json::Value> = calls
        .iter()
        .enumerate()
        .map(|(i, (method, params))| {
            serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": (i + 1) as u64,
            })
        })
        .collect();
    post_json(cfg, target, path, serde_json::Value::Array(payload)).await
}

async fn post_json(
    cfg: &GatewayConfig,
    target: &Target,
    path: &str,
    payload: serde_json::Value,
) -> Result<JsonRpcCallResult> {
    let cap = cfg.caps.http_response;
    let ua = cfg.identity.http_user_agent.clone();
    let host = target.host.clone();
    let port = target.port;
    let path = path.to_string();
    let body_bytes = serde_json::to_vec(&payload)
        .map_err(|e| ProbeError::internal(format!("encode request: {e}")))?;
    with_session(target, async |t| {
        let req = HttpRequest::new("POST", &path, &host, port, &ua)
            .header("Accept", "application/json")
            .body("application/json", body_bytes);
        t.write_all(&req.render()).await?;

        let mut fr = FrameReader::new(cap);
        let resp = fr.read_http_response(t).await?;
        let response: serde_json::Value =
            serde_json::from_slice(&resp.body).unwrap_or(serde_json::Value::Null);

        Ok(JsonRpcCallResult {
            status: resp.status,
            response,
        })
    })
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphiteSendResult {
    pub metric: String,
    pub value: f64,
    pub timestamp: i64,
    pub sent: bool,
}

/// Plaintext protocol: `metric value unix_seconds\n`. Graphite answers
/// nothing; a successful write is the result.
pub async fn graphite_send(
    _cfg: &GatewayConfig,
    target: &Target,
    metric: &str,
    value: f64,
) -> Result<GraphiteSendResult> {
    let timestamp = Utc::now().timestamp();
    let metric = metric.to_string();
    let line = format!("{metric} {value} {timestamp}\n");
    with_session(target, async |t| {
        t.write_all(line.as_bytes()).await?;
        Ok(GraphiteSendResult {
            metric: metric.clone(),
            value,
            timestamp,
            sent: true,
        })
    })
    .await
}
