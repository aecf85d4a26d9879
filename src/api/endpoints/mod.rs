// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod dns;
pub mod hl7;
pub mod httpapi;
pub mod iscsi;
pub mod radius;
pub mod rpc;
pub mod sip;
pub mod smb;
pub mod textline;

use serde::Deserialize;

use crate::{
    api::{
        adaptor::{ApiResponse, check_gate, clamp_timeout, validate_host, validate_port},
        gate::TargetGate,
    },
    cfg::config::GatewayConfig,
    transport::conn::{Target, TlsParams},
};

/// The fields every endpoint shares; endpoint structs flatten this in.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseParams {
    pub host: String,
    #[serde(default)]
    pub port: Option<i64>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Validate host/port/timeout, consult the gate, build the `Target`.
pub(crate) fn make_target(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    base: &BaseParams,
    default_port: u16,
    tls: Option<TlsParams>,
    sip_timeout: bool,
) -> Result<Target, ApiResponse> {
    let host = validate_host(&base.host)?;
    let port = validate_port(base.port, default_port)?;
    check_gate(gate, &host)?;
    let timeout = clamp_timeout(cfg, base.timeout, sip_timeout);
    Ok(Target {
        host,
        port,
        timeout,
        tls,
    })
}
