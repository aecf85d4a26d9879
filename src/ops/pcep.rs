// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PCEP session bring-up (OPEN/KEEPALIVE) and a single path computation
//! request. The session closes with a CLOSE message, best effort.

use serde::Serialize;
use tracing::debug;

use crate::{
    cfg::config::GatewayConfig,
    codec::buf::parse_ipv4,
    error::{ProbeError, Result, WireCode},
    models::pcep::{
        CLASS_ERO, CLASS_METRIC, CLASS_NOPATH, CLASS_OPEN, MSG_ERROR, MSG_KEEPALIVE,
        MSG_OPEN, MSG_PCREP, METRIC_IGP, OpenInfo, PcepMessage, build_close_message,
        build_keepalive_message, build_open_message, build_pcreq_message,
        parse_error_body, parse_ero_body, parse_message, parse_metric_body,
        parse_nopath_nature, parse_open_body, peek_message_length,
    },
    transport::{
        conn::{Target, Transport},
        framing::FrameReader,
        session::with_session_cleanup,
    },
};

async fn read_pcep_message(
    t: &mut Transport,
    fr: &mut FrameReader,
) -> Result<PcepMessage> {
    let head = fr.read_exact_n(t, 4).await?;
    let mut hdr = [0u8; 4];
    hdr.copy_from_slice(&head);
    let total = peek_message_length(&hdr)?;
    let rest = fr.read_exact_n(t, total - 4).await?;
    let mut whole = Vec::with_capacity(total);
    whole.extend_from_slice(&hdr);
    whole.extend_from_slice(&rest);
    parse_message(&whole)
}

/// OPEN exchange + KEEPALIVE ack; returns the peer's OPEN parameters.
async fn open_session(t: &mut Transport, fr: &mut FrameReader) -> Result<OpenInfo> {
    t.write_all(&build_open_message(30, 120, 1)).await?;

    let mut peer_open: Option<OpenInfo> = None;
    loop {
        let msg = read_pcep_message(t, fr).await?;
        match msg.msg_type {
            MSG_OPEN => {
                let open = msg
                    .object(CLASS_OPEN)
                    .ok_or_else(|| ProbeError::malformed("OPEN message without OPEN object"))?;
                peer_open = Some(parse_open_body(&open.body)?);
                t.write_all(&build_keepalive_message()).await?;
            },
            MSG_KEEPALIVE => {
                if let Some(open) = peer_open.take() {
                    return Ok(open);
                }
                debug!("keepalive before peer OPEN, waiting");
            },
            MSG_ERROR => {
                let (etype, evalue) = msg
                    .object(crate::models::pcep::CLASS_ERROR)
                    .map(|o| parse_error_body(&o.body))
                    .transpose()?
                    .unwrap_or((0, 0));
                return Err(ProbeError::protocol(format!(
                    "PCEP error type {etype} value {evalue} during open"
                ))
                .with_code(WireCode::Pcep {
                    error_type: etype,
                    error_value: evalue,
                }));
            },
            other => {
                return Err(ProbeError::unexpected(format!(
                    "PCEP: unexpected message type {other} during open"
                )));
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcepProbeResult {
    pub session_established: bool,
    pub peer_keepalive: u8,
    pub peer_deadtimer: u8,
    pub peer_session_id: u8,
}

pub async fn probe(cfg: &GatewayConfig, target: &Target) -> Result<PcepProbeResult> {
    let cap = cfg.caps.text_response;
    with_session_cleanup(
        target,
        async |t| {
            t.write_all(&build_close_message(1)).await?;
            Ok(())
        },
        async |t| {
            let mut fr = FrameReader::new(cap);
            let peer = open_session(t, &mut fr).await?;
            Ok(PcepProbeResult {
                session_established: true,
                peer_keepalive: peer.keepalive,
                peer_deadtimer: peer.deadtimer,
                peer_session_id: peer.session_id,
            })
        },
    )
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PcepComputeResult {
    pub path_found: bool,
    pub hops: Vec<String>,
    pub loose_hops: Vec<bool>,
    pub igp_cost: Option<f32>,
    pub te_cost: Option<f32>,
    pub no_path_nature: Option<u8>,
}

/// PCReq → PCRep: ERO hops in order, METRIC values, or NO-PATH.
pub async fn compute(
    cfg: &GatewayConfig,
    target: &Target,
    src: &str,
    dst: &str,
    bandwidth: Option<f32>,
) -> Result<PcepComputeResult> {
    let cap = cfg.caps.text_response;
    let src = parse_ipv4(src)?;
    let dst = parse_ipv4(dst)?;
    with_session_cleanup(
        target,
        async |t| {
            t.write_all(&build_close_message(1)).await?;
            Ok(())
        },
        async |t| {
            let mut fr = FrameReader::new(cap);
            open_session(t, &mut fr).await?;

            t.write_all(&build_pcreq_message(1, src, dst, bandwidth)).await?;

            let reply = loop {
                let msg = read_pcep_message(t, &mut fr).await?;
                match msg.msg_type {
                    MSG_PCREP => break msg,
                    MSG_KEEPALIVE => continue,
                    MSG_ERROR => {
                        let (etype, evalue) = msg
                            .object(crate::models::pcep::CLASS_ERROR)
                            .map(|o| parse_error_body(&o.body))
                            .transpose()?
                            .unwrap_or((0, 0));
                        return Err(ProbeError::protocol(format!(
                            "PCEP error type {etype} value {evalue}"
                        ))
                        .with_code(WireCode::Pcep {
                            error_type: etype,
                            error_value: evalue,
                        }));
                    },
                    other => {
                        return Err(ProbeError::unexpected(format!(
                            "PCEP: unexpected message type {other} awaiting PCRep"
                        )));
                    },
                }
            };

            let no_path_nature = reply
                .object(CLASS_NOPATH)
                .map(|o| parse_nopath_nature(&o.body))
                .transpose()?;

            let (hops, loose_hops) = match reply.object(CLASS_ERO) {
                Some(ero) => {
                    let parsed = parse_ero_body(&ero.body)?;
                    (
                        parsed.iter().map(|h| h.address.clone()).collect(),
                        parsed.iter().map(|h| h.loose).collect(),
                    )
                },
                None => (Vec::new(), Vec::new()),
            };

            let mut igp_cost = None;
            let mut te_cost = None;
            for obj in reply.objects.iter().filter(|o| o.class == CLASS_METRIC) {
                let metric = parse_metric_body(&obj.body)?;
                match metric.metric_type {
                    METRIC_IGP => igp_cost = Some(metric.value),
                    crate::models::pcep::METRIC_TE => te_cost = Some(metric.value),
                    _ => {},
                }
            }

            Ok(PcepComputeResult {
                path_found: no_path_nature.is_none() && !hops.is_empty(),
                hops,
                loose_hops,
                igp_cost,
                te_cost,
                no_path_nature,
            })
        },
    )
    .await
}
