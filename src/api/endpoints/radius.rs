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
    models::radius::RADSEC_SECRET,
    ops::radius,
    transport::conn::TlsParams,
};

const DEFAULT_RADIUS_PORT: u16 = 1812;
const DEFAULT_RADSEC_PORT: u16 = 2083;

#[derive(Debug, Deserialize)]
struct RadiusParams {
    #[serde(flatten)]
    base: BaseParams,
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
}

/// RADIUS over plain TCP. The shared secret is required here; RADSEC has a
/// fixed one.
pub async fn auth(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: RadiusParams = match parse_params(&req, "radius/auth") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let Some(secret) = params.secret.as_deref().filter(|s| !s.is_empty()) else {
        return ApiResponse::bad_request("secret is required");
    };
    let target =
        match make_target(cfg, gate, &params.base, DEFAULT_RADIUS_PORT, None, false) {
            Ok(t) => t,
            Err(r) => return r,
        };
    match radius::auth(
        cfg,
        &target,
        &params.username,
        params.password.as_deref().unwrap_or_default(),
        secret.as_bytes(),
    )
    .await
    {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn acct(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: RadiusParams = match parse_params(&req, "radius/acct") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let Some(secret) = params.secret.as_deref().filter(|s| !s.is_empty()) else {
        return ApiResponse::bad_request("secret is required");
    };
    let target =
        match make_target(cfg, gate, &params.base, DEFAULT_RADIUS_PORT, None, false) {
            Ok(t) => t,
            Err(r) => return r,
        };
    let session_id = params
        .session_id
        .clone()
        .unwrap_or_else(|| "portofcall-acct".to_string());
    match radius::acct(cfg, &target, &params.username, &session_id, secret.as_bytes())
        .await
    {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

/// RADSEC (RFC 6614): RADIUS over TLS on 2083 with the fixed secret
/// `"radsec"`; no ALPN.
pub async fn radsec_auth(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: RadiusParams = match parse_params(&req, "radsec/auth") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let target = match make_target(
        cfg,
        gate,
        &params.base,
        DEFAULT_RADSEC_PORT,
        Some(TlsParams::default()),
        false,
    ) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match radius::auth(
        cfg,
        &target,
        &params.username,
        params.password.as_deref().unwrap_or_default(),
        RADSEC_SECRET,
    )
    .await
    {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}
