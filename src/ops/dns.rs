// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! DNS-over-TLS and DNS-over-HTTPS, both riding the shared DNS codec.

use rand::RngExt;
use serde::Serialize;

use crate::{
    cfg::config::GatewayConfig,
    codec::dns::{DnsRecord, build_query, parse_response, type_from_name, type_name},
    error::{ProbeError, Result, WireCode},
    models::http::HttpRequest,
    transport::{conn::Target, framing::FrameReader, session::with_session},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsAnswer {
    pub name: String,
    pub record_type: String,
    pub ttl: u32,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsResult {
    pub txid: u16,
    pub rcode: u8,
    pub answers: Vec<DnsAnswer>,
    pub authority_count: u16,
    pub additional_count: u16,
    /// Full response message, hex-encoded.
    pub raw_response: String,
}

fn to_answers(records: Vec<DnsRecord>) -> Vec<DnsAnswer> {
    records
        .into_iter()
        .map(|r| DnsAnswer {
            name: r.name,
            record_type: type_name(r.rtype),
            ttl: r.ttl,
            data: r.data,
        })
        .collect()
}

pub fn parse_record_type(s: &str) -> Result<u16> {
    type_from_name(s)
        .ok_or_else(|| ProbeError::validation(format!("unsupported record type {s:?}")))
}

/// DoT: the query is 2-byte big-endian length framed over TLS (port 853 by
/// convention). The response transaction id is reported, not verified.
pub async fn dot(
    cfg: &GatewayConfig,
    target: &Target,
    name: &str,
    qtype: u16,
) -> Result<DnsResult> {
    let cap = cfg.caps.text_response;
    let txid: u16 = rand::rng().random();
    let query = build_query(txid, name, qtype)?;
    with_session(target, async |t| {
        let mut framed = Vec::with_capacity(query.len() + 2);
        framed.extend_from_slice(&(query.len() as u16).to_be_bytes());
        framed.extend_from_slice(&query);
        t.write_all(&framed).await?;

        let mut fr = FrameReader::new(cap);
        let msg = fr.read_u16_be_frame(t).await?;
        let parsed = parse_response(&msg)?;

        Ok(DnsResult {
            txid: parsed.txid,
            rcode: parsed.rcode,
            answers: to_answers(parsed.answers),
            authority_count: parsed.authority_count,
            additional_count: parsed.additional_count,
            raw_response: hex::encode(&msg),
        })
    })
    .await
}

/// DoH: POST `application/dns-message` to the resolver path.
pub async fn doh(
    cfg: &GatewayConfig,
    target: &Target,
    path: &str,
    name: &str,
    qtype: u16,
) -> Result<DnsResult> {
    let cap = cfg.caps.http_response;
    let txid: u16 = rand::rng().random();
    let query = build_query(txid, name, qtype)?;
    let ua = cfg.identity.http_user_agent.clone();
    let host = target.host.clone();
    let port = target.port;
    let path = path.to_string();
    with_session(target, async |t| {
        let req = HttpRequest::new("POST", &path, &host, port, &ua)
            .header("Accept", "application/dns-message")
            .body("application/dns-message", query);
        t.write_all(&req.render()).await?;

        let mut fr = FrameReader::new(cap);
        let resp = fr.read_http_response(t).await?;
        if resp.status != 200 {
            return Err(ProbeError::protocol(format!(
                "DoH resolver returned HTTP {}",
                resp.status
            ))
            .with_code(WireCode::Http(resp.status)));
        }
        let parsed = parse_response(&resp.body)?;

        Ok(DnsResult {
            txid: parsed.txid,
            rcode: parsed.rcode,
            answers: to_answers(parsed.answers),
            authority_count: parsed.authority_count,
            additional_count: parsed.additional_count,
            raw_response: hex::encode(&resp.body),
        })
    })
    .await
}
