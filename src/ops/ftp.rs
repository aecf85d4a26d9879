// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Serialize;

use crate::{
    cfg::config::GatewayConfig,
    error::{ProbeError, Result, WireCode},
    transport::{conn::Target, framing::FrameReader, session::with_session_cleanup},
};

#[derive(Debug, Clone)]
pub struct FtpParams {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpProbeResult {
    pub greeting: String,
    pub greeting_code: u16,
    /// SYST reply, when offered.
    pub system: Option<String>,
    /// Present only when credentials were supplied.
    pub login_ok: Option<bool>,
    pub login_reply: Option<String>,
}

/// Control-connection probe: banner, optional USER/PASS, SYST, QUIT.
pub async fn probe(
    cfg: &GatewayConfig,
    target: &Target,
    params: &FtpParams,
) -> Result<FtpProbeResult> {
    let cap = cfg.caps.text_response;
    let params = params.clone();
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
                    "FTP greeting was {}",
                    banner.code
                ))
                .with_code(WireCode::Http(banner.code)));
            }

            let mut login_ok = None;
            let mut login_reply = None;
            if let Some(user) = &params.username {
                t.write_all(format!("USER {user}\r\n").as_bytes()).await?;
                let user_reply = super::textline::read_coded_reply(t, &mut fr).await?;
                let final_reply = if user_reply.code == 331 {
                    let pass = params.password.as_deref().unwrap_or("");
                    t.write_all(format!("PASS {pass}\r\n").as_bytes()).await?;
                    super::textline::read_coded_reply(t, &mut fr).await?
                } else {
                    user_reply
                };
                login_ok = Some(final_reply.code == 230);
                login_reply = Some(final_reply.text());
            }

            t.write_all(b"SYST\r\n").await?;
            let syst = super::textline::read_coded_reply(t, &mut fr).await?;
            let system = (syst.code == 215)
                .then(|| syst.text().get(4..).unwrap_or_default().to_string());

            Ok(FtpProbeResult {
                greeting: banner.text(),
                greeting_code: banner.code,
                system,
                login_ok,
                login_reply,
            })
        },
    )
    .await
}
