// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Binary RPC handlers: Thrift, Ignite, PCEP.

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
    ops::{ignite, pcep, thrift},
};

#[derive(Debug, Deserialize)]
struct RpcParams {
    #[serde(flatten)]
    base: BaseParams,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    args: Option<Vec<serde_json::Value>>,
    #[serde(default, rename = "cacheName")]
    cache_name: Option<String>,
    #[serde(default, rename = "srcAddr")]
    src_addr: Option<String>,
    #[serde(default, rename = "dstAddr")]
    dst_addr: Option<String>,
    #[serde(default)]
    bandwidth: Option<f32>,
}

macro_rules! prepare {
    ($req:expr, $gate:expr, $cfg:expr, $name:literal, $port:expr) => {{
        if let Err(r) = require_post(&$req) {
            return r;
        }
        let params: RpcParams = match parse_params(&$req, $name) {
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

pub async fn thrift_probe(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (_params, target) = prepare!(req, gate, cfg, "thrift/probe", 9090);
    match thrift::probe(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn thrift_call(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (params, target) = prepare!(req, gate, cfg, "thrift/call", 9090);
    let Some(method) = params.method.as_deref().filter(|m| !m.is_empty()) else {
        return ApiResponse::bad_request("method is required");
    };
    let args = params.args.clone().unwrap_or_default();
    match thrift::call(cfg, &target, method, &args).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn ignite_probe(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (_params, target) = prepare!(req, gate, cfg, "ignite/probe", 10800);
    match ignite::probe(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn ignite_cache(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (params, target) = prepare!(req, gate, cfg, "ignite/cache", 10800);
    let Some(cache_name) = params.cache_name.as_deref().filter(|c| !c.is_empty()) else {
        return ApiResponse::bad_request("cacheName is required");
    };
    match ignite::cache_size(cfg, &target, cache_name).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn pcep_probe(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (_params, target) = prepare!(req, gate, cfg, "pcep/probe", 4189);
    match pcep::probe(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn pcep_compute(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    req: ApiRequest,
) -> ApiResponse {
    let (params, target) = prepare!(req, gate, cfg, "pcep/compute", 4189);
    let (Some(src), Some(dst)) = (params.src_addr.as_deref(), params.dst_addr.as_deref())
    else {
        return ApiResponse::bad_request("srcAddr and dstAddr are required");
    };
    match pcep::compute(cfg, &target, src, dst, params.bandwidth).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}
