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
    ops::dns,
    transport::conn::TlsParams,
};

#[derive(Debug, Deserialize)]
struct DnsParams {
    #[serde(flatten)]
    base: BaseParams,
    name: String,
    #[serde(default, rename = "recordType")]
    record_type: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

pub async fn dot(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: DnsParams = match parse_params(&req, "dns/dot") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let qtype = match dns::parse_record_type(params.record_type.as_deref().unwrap_or("A"))
    {
        Ok(t) => t,
        Err(e) => return error_response(&e, TimeoutStyle::ServerError),
    };
    let target = match make_target(
        cfg,
        gate,
        &params.base,
        853,
        Some(TlsParams::default()),
        false,
    ) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match dns::dot(cfg, &target, &params.name, qtype).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}

pub async fn doh(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: DnsParams = match parse_params(&req, "dns/doh") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let qtype = match dns::parse_record_type(params.record_type.as_deref().unwrap_or("A"))
    {
        Ok(t) => t,
        Err(e) => return error_response(&e, TimeoutStyle::ServerError),
    };
    let target = match make_target(
        cfg,
        gate,
        &params.base,
        443,
        Some(TlsParams {
            sni: None,
            alpn: Some("http/1.1".to_string()),
        }),
        false,
    ) {
        Ok(t) => t,
        Err(r) => return r,
    };
    let path = params.path.as_deref().unwrap_or("/dns-query");
    match dns::doh(cfg, &target, path, &params.name, qtype).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::ServerError),
    }
}
