// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Handlers for the text-line protocol family: SMTP, POP3, FTP, Icecast,
//! and EPMD.

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
    ops::{epmd, ftp, icecast, pop3, smtp},
};

#[derive(Debug, Deserialize)]
struct TextProbeParams {
    #[serde(flatten)]
    base: BaseParams,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    mount: Option<String>,
    #[serde(default)]
    node: Option<String>,
}

macro_rules! prepare {
    ($req:expr, $gate:expr, $cfg:expr, $name:literal, $port:expr) => {{
        if let Err(r) = require_post(&$req) {
            return r;
        }
        let params: TextProbeParams = match parse_params(&$req, $name) {
            Ok(p) => p,
            Err(r) => return r,
        };
        let target = match make_target($cfg, $gate, &params.base, $port, None, false) {
            Ok(t) => t,
            Err(r) => return r,
        };
        (params, target)
    }};
}

pub async fn smtp_probe(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (_params, target) = prepare!(req, gate, cfg, "smtp/probe", 25);
    match smtp::probe(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::SoftFail),
    }
}

pub async fn pop3_probe(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (_params, target) = prepare!(req, gate, cfg, "pop3/probe", 110);
    match pop3::probe(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::SoftFail),
    }
}

pub async fn ftp_probe(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (params, target) = prepare!(req, gate, cfg, "ftp/probe", 21);
    let ftp_params = ftp::FtpParams {
        username: params.username.clone().filter(|s| !s.is_empty()),
        password: params.password.clone(),
    };
    match ftp::probe(cfg, &target, &ftp_params).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::SoftFail),
    }
}

pub async fn icecast_probe(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (params, target) = prepare!(req, gate, cfg, "icecast/probe", 8000);
    let credentials = match (&params.username, &params.password) {
        (Some(u), Some(p)) if !u.is_empty() => Some((u.clone(), p.clone())),
        _ => None,
    };
    match icecast::probe(cfg, &target, credentials).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn icecast_source(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (params, target) = prepare!(req, gate, cfg, "icecast/source", 8000);
    let mount = params
        .mount
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "/stream".to_string());
    match icecast::source(
        cfg,
        &target,
        &mount,
        params.password.as_deref().unwrap_or_default(),
    )
    .await
    {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn epmd_names(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (_params, target) = prepare!(req, gate, cfg, "epmd/names", 4369);
    match epmd::names(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn epmd_port(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (params, target) = prepare!(req, gate, cfg, "epmd/port", 4369);
    let Some(node) = params.node.as_deref().filter(|n| !n.is_empty()) else {
        return ApiResponse::bad_request("node is required");
    };
    match epmd::port_please(cfg, &target, node).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}
