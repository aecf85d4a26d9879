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
    ops::iscsi::{self, IscsiLoginParams},
};

const DEFAULT_PORT: u16 = 3260;

#[derive(Debug, Deserialize)]
struct IscsiParams {
    #[serde(flatten)]
    base: BaseParams,
    /// Non-empty selects a Normal-session login (and names the target).
    #[serde(default, rename = "targetName")]
    target_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    secret: Option<String>,
}

pub async fn discover(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: IscsiParams = match parse_params(&req, "iscsi/discover") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let target = match make_target(cfg, gate, &params.base, DEFAULT_PORT, None, false) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match iscsi::discover(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn login(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: IscsiParams = match parse_params(&req, "iscsi/login") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let target = match make_target(cfg, gate, &params.base, DEFAULT_PORT, None, false) {
        Ok(t) => t,
        Err(r) => return r,
    };
    let login_params = IscsiLoginParams {
        target_name: params.target_name.clone().filter(|s| !s.is_empty()),
        username: params.username.clone().filter(|s| !s.is_empty()),
        secret: params.secret.clone(),
    };
    match iscsi::login(cfg, &target, &login_params).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}
