// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Deserialize;

use crate::{
    api::{
        adaptor::{
            ApiRequest, ApiResponse, TimeoutStyle, error_response, parse_params,
            require_post,
        },
        endpoints::{BaseParams, make_target},
        gate::TargetGate,
    },
    cfg::config::GatewayConfig,
    ops::httpapi,
};

#[derive(Debug, Deserialize)]
struct HttpApiParams {
    #[serde(flatten)]
    base: BaseParams,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<serde_json::Value>,
    #[serde(default)]
    calls: Option<Vec<BatchCall>>,
    #[serde(default)]
    metric: Option<String>,
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct BatchCall {
    method: String,
    #[serde(default)]
    params: Option<serde_json::Value>,
}

pub async fn rabbitmq_overview(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: HttpApiParams = match parse_params(&req, "rabbitmq/overview") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let target = match make_target(cfg, gate, &params.base, 15672, None, false) {
        Ok(t) => t,
        Err(r) => return r,
    };
    let username = params.username.as_deref().unwrap_or("guest");
    let password = params.password.as_deref().unwrap_or("guest");
    match httpapi::rabbitmq_overview(cfg, &target, username, password).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

/// Vault's own health semantics ride the status code; any HTTP method is
/// accepted here.
pub async fn vault_health(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let params: HttpApiParams = match parse_params(&req, "vault/health") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let target = match make_target(cfg, gate, &params.base, 8200, None, false) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match httpapi::vault_health(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn jsonrpc_call(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: HttpApiParams = match parse_params(&req, "jsonrpc/call") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let Some(method) = params.method.as_deref().filter(|m| !m.is_empty()) else {
        return ApiResponse::bad_request("method is required");
    };
    let target = match make_target(cfg, gate, &params.base, 8080, None, false) {
        Ok(t) => t,
        Err(r) => return r,
    };
    let path = params.path.as_deref().unwrap_or("/");
    let rpc_params = params.params.clone().unwrap_or(serde_json::Value::Null);
    match httpapi::jsonrpc_call(cfg, &target, path, method, rpc_params).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

/// Batch ids are assigned 1..N server-side; client-supplied ids are
/// ignored by design.
pub async fn jsonrpc_batch(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: HttpApiParams = match parse_params(&req, "jsonrpc/batch") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let Some(calls) = params.calls.as_ref().filter(|c| !c.is_empty()) else {
        return ApiResponse::bad_request("calls is required and must be non-empty");
    };
    let target = match make_target(cfg, gate, &params.base, 8080, None, false) {
        Ok(t) => t,
        Err(r) => return r,
    };
    let path = params.path.as_deref().unwrap_or("/");
    let pairs: Vec<(String, serde_json::Value)> = calls
        .iter()
        .map(|c| {
            (
                c.method.clone(),
                c.params.clone().unwrap_or(serde_json::Value::Null),
            )
        })
        .collect();
    match httpapi::jsonrpc_batch(cfg, &target, path, &pairs).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn graphite_send(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: HttpApiParams = match parse_params(&req, "graphite/send") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let Some(metric) = params.metric.as_deref().filter(|m| !m.is_empty()) else {
        return ApiResponse::bad_request("metric is required");
    };
    let Some(value) = params.value else {
        return ApiResponse::bad_request("value is required");
    };
    let target = match make_target(cfg, gate, &params.base, 2003, None, false) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match httpapi::graphite_send(cfg, &target, metric, value).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}
