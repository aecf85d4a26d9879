// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SIP transactions over TCP: OPTIONS capability probe and REGISTER with
//! Digest authentication. Provisional 1xx responses are consumed until a
//! final status arrives or the deadline fires.

use serde::Serialize;
use tracing::debug;

use crate::{
    cfg::config::GatewayConfig,
    crypto::digest::{
        DigestChallenge, authorization_value, compute_response, generate_cnonce,
    },
    error::{ProbeError, Result, WireCode},
    models::sip::{
        SipRequestParams, SipResponseInfo, build_request, generate_branch,
        generate_call_id, generate_tag, interpret_response, is_final_status,
        request_uri,
    },
    transport::{
        conn::{Target, Transport},
        framing::{FrameReader, RawHttpResponse},
        session::with_session,
    },
};

/// Raw response text included in results is capped here.
const RAW_CAP: usize = 4096;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SipOptionsResult {
    pub status: u16,
    pub reason: String,
    pub allowed_methods: Vec<String>,
    pub supported_extensions: Vec<String>,
    pub server_agent: Option<String>,
    pub raw: String,
}

async fn read_final_response(
    t: &mut Transport,
    fr: &mut FrameReader,
) -> Result<RawHttpResponse> {
    loop {
        let resp = fr.read_http_response(t).await?;
        if is_final_status(resp.status) {
            return Ok(resp);
        }
        debug!(status = resp.status, "provisional response, waiting for final");
    }
}

fn raw_text(resp: &RawHttpResponse) -> String {
    let mut out = resp.status_line.clone();
    for (k, v) in &resp.headers {
        out.push_str("\r\n");
        out.push_str(k);
        out.push_str(": ");
        out.push_str(v);
    }
    if out.len() > RAW_CAP {
        let mut end = RAW_CAP;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
    }
    out
}

fn base_params(cfg: &GatewayConfig, target: &Target, method: &str, user: &str) -> SipRequestParams {
    SipRequestParams {
        method: method.to_string(),
        target_host: target.host.clone(),
        target_port: target.port,
        local_host: "portofcall.invalid".to_string(),
        from_user: user.to_string(),
        to_user: user.to_string(),
        user_agent: cfg.identity.sip_user_agent.clone(),
        branch: generate_branch(),
        from_tag: generate_tag(),
        call_id: generate_call_id("portofcall.invalid"),
        cseq: 1,
    }
}

pub async fn options(cfg: &GatewayConfig, target: &Target) -> Result<SipOptionsResult> {
    let cap = cfg.caps.text_response;
    let params = base_params(cfg, target, "OPTIONS", "portofcall");
    with_session(target, async |t| {
        t.write_all(&build_request(&params, None)).await?;

        let mut fr = FrameReader::new(cap);
        let resp = read_final_response(t, &mut fr).await?;
        let info: SipResponseInfo = interpret_response(&resp);

        Ok(SipOptionsResult {
            status: info.status,
            reason: info.reason,
            allowed_methods: info.allowed_methods,
            supported_extensions: info.supported_extensions,
            server_agent: info.server_agent,
            raw: raw_text(&resp),
        })
    })
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SipRegisterResult {
    pub status: u16,
    pub reason: String,
    pub registered: bool,
    pub challenged: bool,
    pub realm: Option<String>,
    pub server_agent: Option<String>,
    pub raw: String,
}

/// REGISTER: on 401/407 the request is retried once with Digest
/// credentials derived from the challenge.
pub async fn register(
    cfg: &GatewayConfig,
    target: &Target,
    username: &str,
    password: &str,
) -> Result<SipRegisterResult> {
    let cap = cfg.caps.text_response;
    let mut params = base_params(cfg, target, "REGISTER", username);
    let username = username.to_string();
    let password = password.to_string();
    with_session(target, async |t| {
        t.write_all(&build_request(&params, None)).await?;

        let mut fr = FrameReader::new(cap);
        let first = read_final_response(t, &mut fr).await?;

        let (challenge_header, auth_header_name) = match first.status {
            401 => (first.header("WWW-Authenticate"), "Authorization"),
            407 => (first.header("Proxy-Authenticate"), "Proxy-Authorization"),
            _ => {
                let info = interpret_response(&first);
                return Ok(SipRegisterResult {
                    status: info.status,
                    reason: info.reason,
                    registered: (200..300).contains(&first.status),
                    challenged: false,
                    realm: None,
                    server_agent: info.server_agent,
                    raw: raw_text(&first),
                });
            },
        };

        let challenge_value = challenge_header.ok_or_else(|| {
            ProbeError::malformed("SIP challenge without an authenticate header")
        })?;
        let challenge = DigestChallenge::parse(challenge_value)?;
        let uri = request_uri(&params);
        let cnonce = generate_cnonce();
        let creds =
            compute_response(&challenge, &username, &password, "REGISTER", &uri, &cnonce);
        let authorization = authorization_value(&challenge, &creds, &username, &uri);

        // Same transaction identity except for a fresh branch and CSeq.
        params.branch = generate_branch();
        params.cseq += 1;
        t.write_all(&build_request(&params, Some((auth_header_name, &authorization))))
            .await?;

        let second = read_final_response(t, &mut fr).await?;
        let info = interpret_response(&second);
        if matches!(second.status, 401 | 407) {
            return Err(ProbeError::auth_fail(format!(
                "registrar rejected credentials for {username}"
            ))
            .with_code(WireCode::Sip(second.status)));
        }

        Ok(SipRegisterResult {
            status: info.status,
            reason: info.reason,
            registered: (200..300).contains(&second.status),
            challenged: true,
            realm: Some(challenge.realm),
            server_agent: info.server_agent,
            raw: raw_text(&second),
        })
    })
    .await
}
