// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Erlang Port Mapper Daemon probes: NAMES (read until close) and
//! PORT_PLEASE2 (fixed-layout PORT2_RESP).

use serde::Serialize;

use crate::{
    cfg::config::GatewayConfig,
    codec::buf::ByteReader,
    error::{ProbeError, Result},
    transport::{conn::Target, framing::FrameReader, session::with_session},
};

const REQ_NAMES: u8 = 110; // 'n'
const REQ_PORT_PLEASE2: u8 = 122; // 'z'
const RESP_PORT2: u8 = 119; // 'w'

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpmdNodeInfo {
    pub name: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpmdNamesResult {
    pub epmd_port: u32,
    pub nodes: Vec<EpmdNodeInfo>,
}

/// NAMES request: 2-byte BE length + opcode; the reply is a 4-byte port
/// number followed by `name <node> at port <port>` lines until close.
pub async fn names(cfg: &GatewayConfig, target: &Target) -> Result<EpmdNamesResult> {
    let cap = cfg.caps.text_response;
    with_session(target, async |t| {
        t.write_all(&[0, 1, REQ_NAMES]).await?;

        let mut fr = FrameReader::new(cap);
        let raw = fr.read_to_eof(t).await?;
        if raw.len() < 4 {
            return Err(ProbeError::short_read("EPMD NAMES response"));
        }
        let epmd_port = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);

        let text = String::from_utf8_lossy(&raw[4..]);
        let nodes = text
            .lines()
            .filter_map(|line| {
                let rest = line.strip_prefix("name ")?;
                let (name, port_part) = rest.split_once(" at port ")?;
                Some(EpmdNodeInfo {
                    name: name.to_string(),
                    port: port_part.trim().parse().ok()?,
                })
            })
            .collect();

        Ok(EpmdNamesResult { epmd_port, nodes })
    })
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpmdPortResult {
    pub found: bool,
    pub node_name: Option<String>,
    pub port: Option<u16>,
    pub node_type: Option<u8>,
    pub protocol: Option<u8>,
    pub highest_version: Option<u16>,
    pub lowest_version: Option<u16>,
}

/// PORT_PLEASE2: look up one node's distribution port.
pub async fn port_please(
    cfg: &GatewayConfig,
    target: &Target,
    node: &str,
) -> Result<EpmdPortResult> {
    let cap = cfg.caps.text_response;
    let node = node.to_string();
    with_session(target, async |t| {
        let mut req = Vec::with_capacity(3 + node.len());
        req.extend_from_slice(&((1 + node.len()) as u16).to_be_bytes());
        req.push(REQ_PORT_PLEASE2);
        req.extend_from_slice(node.as_bytes());
        t.write_all(&req).await?;

        let mut fr = FrameReader::new(cap);
        let head = fr.read_exact_n(t, 2).await?;
        if head[0] != RESP_PORT2 {
            return Err(ProbeError::unexpected(format!(
                "EPMD: expected PORT2_RESP, got 0x{:02x}",
                head[0]
            )));
        }
        if head[1] != 0 {
            // Non-zero result: node unknown; the reply ends here.
            return Ok(EpmdPortResult {
                found: false,
                node_name: None,
                port: None,
                node_type: None,
                protocol: None,
                highest_version: None,
                lowest_version: None,
            });
        }

        let fixed = fr.read_exact_n(t, 10).await?;
        let mut r = ByteReader::new(&fixed);
        let port = r.u16_be()?;
        let node_type = r.u8()?;
        let protocol = r.u8()?;
        let highest = r.u16_be()?;
        let lowest = r.u16_be()?;
        let name_len = r.u16_be()? as usize;
        let name_bytes = fr.read_exact_n(t, name_len).await?;

        Ok(EpmdPortResult {
            found: true,
            node_name: Some(String::from_utf8_lossy(&name_bytes).into_owned()),
            port: Some(port),
            node_type: Some(node_type),
            protocol: Some(protocol),
            highest_version: Some(highest),
            lowest_version: Some(lowest),
        })
    })
    .await
}
