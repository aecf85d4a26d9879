// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use rand::RngExt;
use serde::Serialize;
use tracing::warn;

use crate::{
    cfg::config::GatewayConfig,
    error::Result,
    models::hl7::{
        Hl7Message, Msa, Msh, MshParams, build_adt_a01, build_oru_r01, unwrap_mllp,
        wrap_mllp,
    },
    transport::{
        conn::Target,
        framing::{FrameReader, MLLP_EB},
        session::with_session,
    },
};

#[derive(Debug, Clone)]
pub struct Hl7SendParams {
    pub message_type: String,
    pub sending_app: String,
    pub sending_facility: String,
    pub receiving_app: String,
    pub receiving_facility: String,
    pub patient_id: String,
    pub patient_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentSummary {
    pub message_type: String,
    pub trigger_event: String,
    pub control_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckSummary {
    pub ack_code: Option<String>,
    pub ack_text: Option<String>,
    pub msh: Option<Msh>,
    /// The response was not MLLP-framed and was accepted as-is.
    pub unframed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hl7SendResult {
    pub sent: SentSummary,
    pub response: AckSummary,
    /// Set when the requested messageType was silently sent as ADT^A01.
    pub warning: Option<String>,
}

/// Send one message and read the acknowledgement. Any `messageType` other
/// than `ORU^R01` falls through to ADT^A01; the fall-through is reported in
/// `warning` but still sent (consumers depend on the behaviour).
pub async fn send(
    cfg: &GatewayConfig,
    target: &Target,
    params: &Hl7SendParams,
) -> Result<Hl7SendResult> {
    let control_id = format!("POC{:08}", rand::rng().random_range(0..100_000_000u32));

    let is_oru = params.message_type == "ORU^R01";
    let (message_type, trigger_event) = if is_oru {
        ("ORU".to_string(), "R01".to_string())
    } else {
        ("ADT".to_string(), "A01".to_string())
    };
    let warning = if !is_oru && params.message_type != "ADT^A01" {
        warn!(requested = %params.message_type, "unrecognised messageType, sending ADT^A01");
        Some(format!(
            "unrecognised messageType {:?}, sent ADT^A01",
            params.message_type
        ))
    } else {
        None
    };

    let msh = MshParams {
        sending_app: params.sending_app.clone(),
        sending_facility: params.sending_facility.clone(),
        receiving_app: params.receiving_app.clone(),
        receiving_facility: params.receiving_facility.clone(),
        control_id: control_id.clone(),
        message_type: message_type.clone(),
        trigger_event: trigger_event.clone(),
        version: "2.5".to_string(),
    };
    let message = if is_oru {
        build_oru_r01(&msh, &params.patient_id, &params.patient_name)
    } else {
        build_adt_a01(&msh, &params.patient_id, &params.patient_name)
    };

    let cap = cfg.caps.text_response;
    let wire = wrap_mllp(&message);
    with_session(target, async |t| {
        t.write_all(&wire).await?;

        let mut fr = FrameReader::new(cap);
        let (raw, framed) = fr.read_until_or_eof(t, &[MLLP_EB]).await?;
        let payload = unwrap_mllp(&raw);

        let response = match Hl7Message::parse(&String::from_utf8_lossy(payload)) {
            Ok(msg) => AckSummary {
                ack_code: msg.msa().map(|m: Msa| m.ack_code),
                ack_text: msg.msa().map(|m| m.ack_text),
                msh: msg.msh().ok(),
                unframed: !framed,
            },
            Err(_) => AckSummary {
                ack_code: None,
                ack_text: None,
                msh: None,
                unframed: !framed,
            },
        };

        Ok(Hl7SendResult {
            sent: SentSummary {
                message_type,
                trigger_event,
                control_id,
            },
            response,
            warning,
        })
    })
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hl7ProbeResult {
    pub reachable: bool,
    pub peer: Option<String>,
}

/// Reachability check: open the listener port and report the peer address.
pub async fn probe(_cfg: &GatewayConfig, target: &Target) -> Result<Hl7ProbeResult> {
    with_session(target, async |t| {
        Ok(Hl7ProbeResult {
            reachable: true,
            peer: t.peer_addr().map(|a| a.to_string()),
        })
    })
    .await
}
