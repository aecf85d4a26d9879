// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod adaptor;
pub mod endpoints;
pub mod gate;

use crate::{
    api::{
        adaptor::{ApiRequest, ApiResponse},
        gate::TargetGate,
    },
    cfg::config::GatewayConfig,
};

/// Route one `<proto>/<op>` endpoint to its handler adaptor. The HTTP
/// router maps `POST /api/<proto>/<op>` onto this table; `None` means an
/// unknown endpoint (the router's 404).
pub async fn dispatch(
    cfg: &GatewayConfig,
    gate: &dyn TargetGate,
    route: &str,
    req: ApiRequest,
) -> Option<ApiResponse> {
    use endpoints::*;

    Some(match route {
        "smb/probe" => smb::probe(cfg, gate, req).await,
        "smb/session" => smb::session(cfg, gate, req).await,
        "smb/list" => smb::list(cfg, gate, req).await,
        "smb/read" => smb::read(cfg, gate, req).await,
        "smb/write" => smb::write(cfg, gate, req).await,
        "smb/stat" => smb::stat(cfg, gate, req).await,
        "iscsi/discover" => iscsi::discover(cfg, gate, req).await,
        "iscsi/login" => iscsi::login(cfg, gate, req).await,
        "hl7/send" => hl7::send(cfg, gate, req).await,
        "hl7/probe" => hl7::probe(cfg, gate, req).await,
        "radius/auth" => radius::auth(cfg, gate, req).await,
        "radius/acct" => radius::acct(cfg, gate, req).await,
        "radsec/auth" => radius::radsec_auth(cfg, gate, req).await,
        "sip/options" => sip::options(cfg, gate, req).await,
        "sip/register" => sip::register(cfg, gate, req).await,
        "smtp/probe" => textline::smtp_probe(cfg, gate, req).await,
        "pop3/probe" => textline::pop3_probe(cfg, gate, req).await,
        "ftp/probe" => textline::ftp_probe(cfg, gate, req).await,
        "icecast/probe" => textline::icecast_probe(cfg, gate, req).await,
        "icecast/source" => textline::icecast_source(cfg, gate, req).await,
        "epmd/names" => textline::epmd_names(cfg, gate, req).await,
        "epmd/port" => textline::epmd_port(cfg, gate, req).await,
        "thrift/probe" => rpc::thrift_probe(cfg, gate, req).await,
        "thrift/call" => rpc::thrift_call(cfg, gate, req).await,
        "ignite/probe" => rpc::ignite_probe(cfg, gate, req).await,
        "ignite/cache" => rpc::ignite_cache(cfg, gate, req).await,
        "pcep/probe" => rpc::pcep_probe(cfg, gate, req).await,
        "pcep/compute" => rpc::pcep_compute(cfg, gate, req).await,
        "dns/dot" => dns::dot(cfg, gate, req).await,
        "dns/doh" => dns::doh(cfg, gate, req).await,
        "rabbitmq/overview" => httpapi::rabbitmq_overview(cfg, gate, req).await,
        "vault/health" => httpapi::vault_health(cfg, gate, req).await,
        "jsonrpc/call" => httpapi::jsonrpc_call(cfg, gate, req).await,
        "jsonrpc/batch" => httpapi::jsonrpc_batch(cfg, gate, req).await,
        "graphite/send" => httpapi::graphite_send(cfg, gate, req).await,
        _ => return None,
    })
}

