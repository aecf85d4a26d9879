// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RADIUS/RADSEC probes over a stream transport: one Access-Request or
//! Accounting-Request, one verified response. RADSEC differs only in the
//! TLS transport and the fixed `"radsec"` secret.

use serde::Serialize;

use crate::{
    cfg::config::GatewayConfig,
    error::{ProbeError, Result, WireCode},
    models::radius::{
        CODE_ACCESS_ACCEPT, CODE_ACCESS_CHALLENGE, CODE_ACCESS_REJECT,
        CODE_ACCOUNTING_RESPONSE, RadiusPacket, build_access_request,
        build_accounting_request, code_text, fresh_request_identity,
        verify_response_authenticator,
    },
    transport::{conn::Target, framing::FrameReader, session::with_session},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiusAuthResult {
    pub code: u8,
    pub code_text: String,
    pub identifier: u8,
    pub accepted: bool,
    pub challenged: bool,
    pub reply_messages: Vec<String>,
}

/// A RADIUS packet is its own frame on TCP/TLS: 4-byte header first (the
/// length field sits at offset 2), then the remainder.
async fn read_radius_packet(
    t: &mut crate::transport::conn::Transport,
    fr: &mut FrameReader,
) -> Result<Vec<u8>> {
    let head = fr.read_exact_n(t, 4).await?;
    let total = u16::from_be_bytes([head[2], head[3]]) as usize;
    if total < 20 {
        return Err(ProbeError::malformed("RADIUS length below minimum"));
    }
    let rest = fr.read_exact_n(t, total - 4).await?;
    let mut wire = Vec::with_capacity(total);
    wire.extend_from_slice(&head);
    wire.extend_from_slice(&rest);
    Ok(wire)
}

/// One authentication round-trip. The response authenticator is verified
/// before the packet is believed; Access-Reject is reported as a result,
/// not an error, so callers see the wire outcome.
pub async fn auth(
    cfg: &GatewayConfig,
    target: &Target,
    username: &str,
    password: &str,
    secret: &[u8],
) -> Result<RadiusAuthResult> {
    let cap = cfg.caps.text_response;
    let (identifier, request_auth) = fresh_request_identity();
    let request = build_access_request(username, password, secret, identifier, request_auth);
    let wire = request.encode();
    let secret = secret.to_vec();
    with_session(target, async |t| {
        t.write_all(&wire).await?;

        let mut fr = FrameReader::new(cap);
        let resp_wire = read_radius_packet(t, &mut fr).await?;
        verify_response_authenticator(&resp_wire, &request_auth, &secret)?;

        let resp = RadiusPacket::decode(&resp_wire)?;
        if resp.identifier != identifier {
            return Err(ProbeError::unexpected(format!(
                "RADIUS identifier {} does not echo request {}",
                resp.identifier, identifier
            )));
        }
        match resp.code {
            CODE_ACCESS_ACCEPT | CODE_ACCESS_REJECT | CODE_ACCESS_CHALLENGE => {},
            other => {
                return Err(ProbeError::protocol(format!(
                    "RADIUS: unexpected response code {other}"
                ))
                .with_code(WireCode::Radius(other)));
            },
        }

        Ok(RadiusAuthResult {
            code: resp.code,
            code_text: code_text(resp.code).to_string(),
            identifier: resp.identifier,
            accepted: resp.code == CODE_ACCESS_ACCEPT,
            challenged: resp.code == CODE_ACCESS_CHALLENGE,
            reply_messages: resp.reply_messages(),
        })
    })
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiusAcctResult {
    pub code: u8,
    pub code_text: String,
    pub identifier: u8,
    pub acknowledged: bool,
}

/// Accounting-Request (Start) round-trip.
pub async fn acct(
    cfg: &GatewayConfig,
    target: &Target,
    username: &str,
    session_id: &str,
    secret: &[u8],
) -> Result<RadiusAcctResult> {
    let cap = cfg.caps.text_response;
    let (identifier, _) = fresh_request_identity();
    let request = build_accounting_request(username, session_id, 1, secret, identifier);
    let request_auth = request.authenticator;
    let wire = request.encode();
    let secret = secret.to_vec();
    with_session(target, async |t| {
        t.write_all(&wire).await?;

        let mut fr = FrameReader::new(cap);
        let resp_wire = read_radius_packet(t, &mut fr).await?;
        verify_response_authenticator(&resp_wire, &request_auth, &secret)?;

        let resp = RadiusPacket::decode(&resp_wire)?;
        Ok(RadiusAcctResult {
            code: resp.code,
            code_text: code_text(resp.code).to_string(),
            identifier: resp.identifier,
            acknowledged: resp.code == CODE_ACCOUNTING_RESPONSE,
        })
    })
    .await
}
