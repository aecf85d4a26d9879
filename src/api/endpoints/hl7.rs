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
    ops::hl7::{self, Hl7SendParams},
};

const DEFAULT_PORT: u16 = 2575;

fn default_string(v: &Option<String>, fallback: &str) -> String {
    v.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| fallback.to_string())
}

#[derive(Debug, Deserialize)]
struct Hl7Params {
    #[serde(flatten)]
    base: BaseParams,
    #[serde(default, rename = "messageType")]
    message_type: Option<String>,
    #[serde(default, rename = "sendingApp")]
    sending_app: Option<String>,
    #[serde(default, rename = "sendingFacility")]
    sending_facility: Option<String>,
    #[serde(default, rename = "receivingApp")]
    receiving_app: Option<String>,
    #[serde(default, rename = "receivingFacility")]
    receiving_facility: Option<String>,
    #[serde(default, rename = "patientId")]
    patient_id: Option<String>,
    #[serde(default, rename = "patientName")]
    patient_name: Option<String>,
}

/// HL7 endpoints surface a fired deadline as 504 Gateway Timeout.
pub async fn send(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    if let Err(r) = require_post(&req) {
        return r;
    }
    let params: Hl7Params = match parse_params(&req, "hl7/send") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let target = match make_target(cfg, gate, &params.base, DEFAULT_PORT, None, false) {
        Ok(t) => t,
        Err(r) => return r,
    };
    let send_params = Hl7SendParams {
        message_type: default_string(&params.message_type, "ADT^A01"),
        sending_app: default_string(&params.sending_app, "PORTOFCALL"),
        sending_facility: default_string(&params.sending_facility, "GATEWAY"),
        receiving_app: default_string(&params.receiving_app, "HIS"),
        receiving_facility: default_string(&params.receiving_facility, "HOSPITAL"),
        patient_id: default_string(&params.patient_id, "12345"),
        patient_name: default_string(&params.patient_name, "DOE^JOHN"),
    };
    match hl7::send(cfg, &target, &send_params).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::GatewayTimeout),
    }
}

/// Reachability probe; accepts any HTTP method.
pub async fn probe(cfg: &GatewayConfig, gate: &dyn TargetGate, req: ApiRequest) -> ApiResponse {
    let params: Hl7Params = match parse_params(&req, "hl7/probe") {
        Ok(p) => p,
        Err(r) => return r,
    };
    let target = match make_target(cfg, gate, &params.base, DEFAULT_PORT, None, false) {
        Ok(t) => t,
        Err(r) => return r,
    };
    match hl7::probe(cfg, &target).await {
        Ok(result) => ApiResponse::success(result),
        Err(e) => error_response(&e, TimeoutStyle::GatewayTimeout),
    }
}
