// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Serialize;
use tracing::debug;

use crate::{
    cfg::config::GatewayConfig,
    error::{ProbeError, Result, WireCode},
    transport::{conn::Target, framing::FrameReader, session::with_session_cleanup},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpProbeResult {
    pub greeting: String,
    pub banner_code: u16,
    pub ehlo_code: u16,
    /// EHLO keyword lines after the hostname line.
    pub capabilities: Vec<String>,
    pub supports_starttls: bool,
}

/// Greeting → EHLO → capability listing; QUIT on the way out.
pub async fn probe(cfg: &GatewayConfig, target: &Target) -> Result<SmtpProbeResult> {
    let cap = cfg.caps.text_response;
    with_session_cleanup(
        target,
        async |t| {
            let mut fr = FrameReader::new(1024);
            let _ = t.write_all(b"QUIT\r\n").await;
            let _ = fr.read_line(t).await;
            Ok(())
        },
        async |t| {
            let mut fr = FrameReader::new(cap);
            let banner = super::textline::read_coded_reply(t, &mut fr).await?;
            if banner.code != 220 {
                return Err(ProbeError::protocol(format!(
                    "SMTP greeting was {}",
                    banner.code
                ))
                .with_code(WireCode::Http(banner.code)));
            }

            t.write_all(b"EHLO portofcall.probe\r\n").await?;
            let ehlo = super::textline::read_coded_reply(t, &mut fr).await?;
            debug!(code = ehlo.code, "EHLO reply");

            let capabilities: Vec<String> = ehlo
                .lines
                .iter()
                .skip(1)
                .map(|l| l.get(4..).unwrap_or_default().trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            let supports_starttls = capabilities
                .iter()
                .any(|c| c.eq_ignore_ascii_case("STARTTLS"));

            Ok(SmtpProbeResult {
                greeting: banner.text(),
                banner_code: banner.code,
                ehlo_code: ehlo.code,
                capabilities,
                supports_starttls,
            })
        },
    )
    .await
}
