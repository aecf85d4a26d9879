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
    ops::sip,
};

const DEFAULT_PORT: u16 = 5060;

#[derive(Debug, Deserialize)]
struct SipParams {
    #[serde(flatten)]
    base: BaseParams,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// SIP endpoints allow long transactions (provisional ringing phases), so
/// the timeout clamps against the SIP bound.
pub async fn options(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: SipParams = match parse_params(&req, "sip/options") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let target = match make_target(cfg, gate, &params.base, DEFAULT_PORT, None, true) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match sip::options(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn register(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: SipParams = match parse_params(&req, "sip/register") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let Some(username) = params.username.as_deref().filter(|s| !s.is_empty()) else {
        return ApiResponse::bad_request("username is required");
    };
    let target = match make_target(cfg, gate, &params.base, DEFAULT_PORT, None, true) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match sip::register(
        cfg,
        &target,
        username,
        params.password.as_deref().unwrap_or_default(),
    )
    .await
    {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}
