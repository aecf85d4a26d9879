// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
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
    ops::smb::{self, SmbCredentials},
};

const DEFAULT_PORT: u16 = 445;

#[derive(Debug, Deserialize)]
struct SmbParams {
    #[serde(flatten)]
    base: BaseParams,
    #[serde(default)]
    share: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    content: Option<String>,
    /// Base64 payloads for binary writes.
    #[serde(default, rename = "contentBase64")]
    content_base64: Option<String>,
}

impl SmbParams {
    fn credentials(&self) -> SmbCredentials {
        SmbCredentials {
            username: self.username.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
            domain: self.domain.clone().unwrap_or_default(),
        }
    }

    fn require_share(&self) -> Result<&str, ApiResponse> {
        self.share
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiResponse::bad_request("share is required"))
    }

    fn path_or_root(&self) -> &str {
        self.path.as_deref().unwrap_or("")
    }
}

macro_rules! parse_or_return {
    ($req:expr, $gate:expr, $cfg:expr, $name:literal) => {{
        if let Err(r) = require_post(&$req) {
            return r;
        }
        let params: SmbParams = match parse_params(&$req, $name) {
            Ok(p) => p,
            Err(r) => return r,
        };
        let target =
            match make_target($cfg, $gate, &params.base, DEFAULT_PORT, None, false) {
                Ok(t) => t,
                Err(r) => return r,
            };
        (params, target)
    }};
}

pub async fn probe(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    let (_params, target) = parse_or_return!(req, gate, cfg, "smb/probe");
    match smb::probe(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn session(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (params, target) = parse_or_return!(req, gate, cfg, "smb/session");
    match smb::session(cfg, &target, &params.credentials(), params.share.as_deref()).await
    {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn list(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    let (params, target) = parse_or_return!(req, gate, cfg, "smb/list");
    let share = match params.require_share() {
        Ok(s) => s,
        Err(r) => return r,
    };
    match smb::list(cfg, &target, &params.credentials(), share, params.path_or_root())
        .await
    {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn read(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    let (params, target) = parse_or_return!(req, gate, cfg, "smb/read");
    let share = match params.require_share() {
        Ok(s) => s,
        Err(r) => return r,
    };
    let Some(path) = params.path.as_deref().filter(|p| !p.is_empty()) else {
        return ApiResponse::bad_request("path is required");
    };
    match smb::read(cfg, &target, &params.credentials(), share, path).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn write(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    let (params, target) = parse_or_return!(req, gate, cfg, "smb/write");
    let share = match params.require_share() {
        Ok(s) => s,
        Err(r) => return r,
    };
    let Some(path) = params.path.as_deref().filter(|p| !p.is_empty()) else {
        return ApiResponse::bad_request("path is required");
    };
    let content = if let Some(b64) = &params.content_base64 {
        match BASE64.decode(b64) {
            Ok(bytes) => bytes,
            Err(_) => return ApiResponse::bad_request("contentBase64 is not base64"),
        }
    } else {
        params.content.clone().unwrap_or_default().into_bytes()
    };
    match smb::write(cfg, &target, &params.credentials(), share, path, content).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn stat(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    let (params, target) = parse_or_return!(req, gate, cfg, "smb/stat");
    let share = match params.require_share() {
        Ok(s) => s,
        Err(r) => return r,
    };
    let Some(path) = params.path.as_deref().filter(|p| !p.is_empty()) else {
        return ApiResponse::bad_request("path is required");
    };
    match smb::stat(cfg, &target, &params.credentials(), share, path).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}
