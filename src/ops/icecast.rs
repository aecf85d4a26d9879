// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Serialize;

use crate::{
    cfg::config::GatewayConfig,
    error::Result,
    models::http::HttpRequest,
    transport::{conn::Target, framing::FrameReader, session::with_session},
};

/// Admin stats bodies above this are truncated in the JSON response.
const ADMIN_STATS_CAP: usize = 16 * 1024;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IcecastProbeResult {
    pub status: u16,
    pub server: Option<String>,
    /// Raw stats payload (status JSON or admin XML), truncated.
    pub admin_stats: String,
    pub stats_truncated: bool,
}

/// GET the public status page (or admin stats when credentials are given).
pub async fn probe(
    cfg: &GatewayConfig,
    target: &Target,
    credentials: Option<(String, String)>,
) -> Result<IcecastProbeResult> {
    let cap = cfg.caps.http_response;
    let ua = cfg.identity.http_user_agent.clone();
    let host = target.host.clone();
    let port = target.port;
    with_session(target, async |t| {
        let path = if credentials.is_some() {
            "/admin/stats"
        } else {
            "/status-json.xsl"
        };
        let mut req = HttpRequest::new("GET", path, &host, port, &ua);
        if let Some((user, pass)) = &credentials {
            req = req.basic_auth(user, pass);
        }
        t.write_all(&req.render()).await?;

        let mut fr = FrameReader::new(cap);
        let resp = fr.read_http_response(t).await?;
        let body = resp.body_text();
        let truncated = body.len() > ADMIN_STATS_CAP || !resp.body_complete;
        let admin_stats = body.chars().take(ADMIN_STATS_CAP).collect();

        Ok(IcecastProbeResult {
            status: resp.status,
            server: resp.header("Server").map(str::to_string),
            admin_stats,
            stats_truncated: truncated,
        })
    })
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IcecastSourceResult {
    pub accepted: bool,
    pub status_line: String,
    /// Bare `OK2` replies from SHOUTcast-compatible servers.
    pub shoutcast_compatible: bool,
}

/// SOURCE handshake: verifies the mountpoint accepts a source connection.
/// The connection closes immediately after the status line; no audio is sent.
pub async fn source(
    cfg: &GatewayConfig,
    target: &Target,
    mount: &str,
    password: &str,
) -> Result<IcecastSourceResult> {
    let cap = cfg.caps.text_response;
    let ua = cfg.identity.http_user_agent.clone();
    let mount = mount.to_string();
    let password = password.to_string();
    with_session(target, async |t| {
        use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
        let token = BASE64.encode(format!("source:{password}"));
        let req = format!(
            "SOURCE {mount} HTTP/1.0\r\nAuthorization: Basic {token}\r\nUser-Agent: \
             {ua}\r\nContent-Type: audio/mpeg\r\n\r\n"
        );
        t.write_all(req.as_bytes()).await?;

        let mut fr = FrameReader::new(cap);
        let line = fr.read_line(t).await?;
        if line.trim() == "OK2" {
            return Ok(IcecastSourceResult {
                accepted: true,
                status_line: line,
                shoutcast_compatible: true,
            });
        }
        let status: u16 = line
            .split_whitespace()
            .nth(1)
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        Ok(IcecastSourceResult {
            accepted: (200..300).contains(&status),
            status_line: line,
            shoutcast_compatible: false,
        })
    })
    .await
}
