// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Serialize;

use crate::{
    cfg::config::GatewayConfig,
    codec::buf::{ByteReader, ByteWriter},
    error::{ProbeError, Result},
    models::ignite::{
        OP_CACHE_GET_SIZE, build_handshake, build_operation, java_string_hash_code,
        parse_handshake_response, parse_operation_response,
    },
    transport::{
        conn::{Target, Transport},
        framing::FrameReader,
        session::with_session,
    },
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IgniteProbeResult {
    pub accepted: bool,
    pub node_uuid: Option<String>,
    pub server_version: Option<String>,
    pub error: Option<String>,
}

async fn handshake(
    t: &mut Transport,
    fr: &mut FrameReader,
) -> Result<crate::models::ignite::HandshakeResponse> {
    t.write_all(&build_handshake()).await?;
    let payload = fr.read_u32_le_frame(t).await?;
    parse_handshake_response(&payload)
}

/// Thin-client handshake at protocol 1.7.0.
pub async fn probe(cfg: &GatewayConfig, target: &Target) -> Result<IgniteProbeResult> {
    let cap = cfg.caps.frame_response;
    with_session(target, async |t| {
        let mut fr = FrameReader::new(cap);
        let resp = handshake(t, &mut fr).await?;
        Ok(IgniteProbeResult {
            accepted: resp.success,
            node_uuid: resp.node_uuid,
            server_version: resp
                .server_version
                .map(|(maj, min, pat)| format!("{maj}.{min}.{pat}")),
            error: resp.error,
        })
    })
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IgniteCacheResult {
    pub cache_name: String,
    pub cache_id: i32,
    pub size: i64,
}

/// Handshake, then OP_CACHE_GET_SIZE on `String.hashCode(cache_name)`.
pub async fn cache_size(
    cfg: &GatewayConfig,
    target: &Target,
    cache_name: &str,
) -> Result<IgniteCacheResult> {
    let cap = cfg.caps.frame_response;
    let cache_name = cache_name.to_string();
    with_session(target, async |t| {
        let mut fr = FrameReader::new(cap);
        let hs = handshake(t, &mut fr).await?;
        if !hs.success {
            return Err(ProbeError::protocol(format!(
                "ignite handshake rejected: {}",
                hs.error.unwrap_or_else(|| "no error text".to_string())
            )));
        }

        let cache_id = java_string_hash_code(&cache_name);
        let mut body = ByteWriter::with_capacity(9);
        body.u32_le(cache_id as u32);
        body.u8(0); // flags
        body.u32_le(0); // no peek modes
        t.write_all(&build_operation(OP_CACHE_GET_SIZE, 1, body.as_slice()))
            .await?;

        let payload = fr.read_u32_le_frame(t).await?;
        let resp = parse_operation_response(&payload)?;
        if resp.status != 0 {
            return Err(ProbeError::protocol(format!(
                "ignite operation status {}",
                resp.status
            )));
        }
        let mut r = ByteReader::new(&resp.body);
        let size = r.u64_le()? as i64;

        Ok(IgniteCacheResult {
            cache_name: cache_name.clone(),
            cache_id,
            size,
        })
    })
    .await
}
