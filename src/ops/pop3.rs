// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Serialize;

use crate::{
    cfg::config::GatewayConfig,
    error::{ProbeError, Result},
    transport::{conn::Target, framing::FrameReader, session::with_session_cleanup},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pop3ProbeResult {
    pub greeting: String,
    /// The server advertised an APOP timestamp in its banner.
    pub apop_supported: bool,
    /// CAPA keywords, when the server implements the extension.
    pub capabilities: Vec<String>,
}

pub async fn probe(cfg: &GatewayConfig, target: &Target) -> Result<Pop3ProbeResult> {
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
            let (ok, greeting) = super::textline::read_pop3_status(t, &mut fr).await?;
            if !ok {
                return Err(ProbeError::protocol(format!(
                    "POP3 greeting was -ERR {greeting}"
                )));
            }
            let apop_supported = greeting.contains('<') && greeting.contains('>');

            t.write_all(b"CAPA\r\n").await?;
            let (capa_ok, _) = super::textline::read_pop3_status(t, &mut fr).await?;
            let capabilities = if capa_ok {
                super::textline::read_pop3_multiline(t, &mut fr).await?
            } else {
                Vec::new()
            };

            Ok(Pop3ProbeResult {
                greeting,
                apop_supported,
                capabilities,
            })
        },
    )
    .await
}
