// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The thin layer every endpoint wraps around: method check, parameter
//! parsing, host/port/timeout validation, the target gate, and the mapping
//! from `ErrorKind` to each endpoint's status-code convention.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::{
    api::gate::TargetGate,
    cfg::config::GatewayConfig,
    error::{ErrorKind, ProbeError},
};

/// What the out-of-scope HTTP router hands an endpoint.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: String,
    pub body: Value,
}

impl ApiRequest {
    pub fn post(body: Value) -> Self {
        Self {
            method: "POST".to_string(),
            body,
        }
    }
}

/// What an endpoint hands back to the router.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// Success envelope: `{"success": true, …fields}`.
    pub fn success(result: impl serde::Serialize) -> Self {
        let mut body = serde_json::to_value(result).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut body {
            map.insert("success".to_string(), json!(true));
        }
        Self { status: 200, body }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn method_not_allowed() -> Self {
        Self {
            status: 405,
            body: json!({ "error": "method not allowed" }),
        }
    }

    pub fn blocked() -> Self {
        Self {
            status: 403,
            body: json!({ "success": false, "isCloudflare": true }),
        }
    }
}

/// How an endpoint surfaces a fired deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStyle {
    /// 500 with the error message (most endpoints).
    ServerError,
    /// 504 Gateway Timeout (the HL7 endpoints).
    GatewayTimeout,
    /// 200 `{success:false, error:"Connection timeout"}`.
    SoftFail,
}

/// Map a typed engine failure to this endpoint's HTTP convention.
/// Protocol-level failures travel as 200 `{success:false}` so consumers
/// can read the wire outcome; transport failures are 500s.
pub fn error_response(e: &ProbeError, timeout_style: TimeoutStyle) -> ApiResponse {
    let kind_tag = serde_json::to_value(e.kind).unwrap_or(Value::Null);
    let mut body = json!({
        "success": false,
        "error": e.message,
        "errorKind": kind_tag,
    });
    if let (Some(code), Value::Object(map)) = (&e.code, &mut body) {
        map.insert(
            "wireCode".to_string(),
            serde_json::to_value(code).unwrap_or(Value::Null),
        );
    }

    let status = match e.kind {
        ErrorKind::Validation => return ApiResponse::bad_request(e.message.clone()),
        ErrorKind::Blocked => return ApiResponse::blocked(),
        ErrorKind::Timeout => match timeout_style {
            TimeoutStyle::ServerError => 500,
            TimeoutStyle::GatewayTimeout => 504,
            TimeoutStyle::SoftFail => {
                return ApiResponse::ok(json!({
                    "success": false,
                    "error": "Connection timeout",
                }));
            },
        },
        ErrorKind::ProtocolError | ErrorKind::AuthFail | ErrorKind::AuthFailVerify => 200,
        _ => 500,
    };
    ApiResponse { status, body }
}

/// Parse the JSON body into the endpoint's typed parameter record.
pub fn parse_params<T: DeserializeOwned>(
    req: &ApiRequest,
    endpoint: &str,
) -> Result<T, ApiResponse> {
    serde_json::from_value(req.body.clone()).map_err(|e| {
        ApiResponse::bad_request(format!("{endpoint}: invalid request body: {e}"))
    })
}

pub fn require_post(req: &ApiRequest) -> Result<(), ApiResponse> {
    if req.method.eq_ignore_ascii_case("POST") {
        Ok(())
    } else {
        Err(ApiResponse::method_not_allowed())
    }
}

/// Hostname validation: trimmed, non-empty, `[A-Za-z0-9._:-]` only.
pub fn validate_host(host: &str) -> Result<String, ApiResponse> {
    let trimmed = host.trim();
    if trimmed.is_empty() {
        return Err(ApiResponse::bad_request("host is required"));
    }
    let valid = trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-'));
    if !valid {
        return Err(ApiResponse::bad_request(format!(
            "host contains invalid characters: {trimmed:?}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Port validation with an endpoint default. JSON numbers outside 1–65535
/// are rejected.
pub fn validate_port(port: Option<i64>, default: u16) -> Result<u16, ApiResponse> {
    match port {
        None => Ok(default),
        Some(p) if (1..=65535).contains(&p) => Ok(p as u16),
        Some(p) => Err(ApiResponse::bad_request(format!(
            "port {p} is outside 1-65535"
        ))),
    }
}

/// Clamp the requested timeout into the endpoint's bound.
pub fn clamp_timeout(cfg: &GatewayConfig, requested_ms: Option<u64>, sip: bool) -> Duration {
    let max = if sip {
        cfg.limits.max_timeout_sip
    } else {
        cfg.limits.max_timeout
    };
    cfg.limits.clamp(requested_ms, max)
}

/// The gate check every transport-opening endpoint performs first.
pub fn check_gate(gate: &dyn TargetGate, host: &str) -> Result<(), ApiResponse> {
    if gate.is_blocked(host) {
        Err(ApiResponse::blocked())
    } else {
        Ok(())
    }
}
