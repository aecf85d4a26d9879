// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! HL7 v2.x message building and parsing over MLLP. A message is one text
//! blob: segments split by `\r`, fields by `|`, components by `^`. The MSH
//! segment needs care: the field separator doubles as MSH-1, so after
//! splitting on `|` the element at index 1 is already MSH-2.

use chrono::Utc;
use serde::Serialize;

use crate::error::{ProbeError, Result};

/// Wrap one application message in the MLLP envelope
/// `0x0B <payload> 0x1C 0x0D`.
pub fn wrap_mllp(message: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 3);
    out.push(0x0B);
    out.extend_from_slice(message.as_bytes());
    out.push(0x1C);
    out.push(0x0D);
    out
}

/// Strip the MLLP envelope from a received frame. Tolerates a missing
/// start byte and treats the whole buffer as payload when no `0x1C`
/// terminator exists (silent acceptance of non-MLLP peers).
pub fn unwrap_mllp(raw: &[u8]) -> &[u8] {
    let start = if raw.first() == Some(&0x0B) { 1 } else { 0 };
    let end = raw
        .iter()
        .position(|&b| b == 0x1C)
        .unwrap_or(raw.len());
    &raw[start..end.max(start)]
}

/// HL7 timestamp for MSH-7: `YYYYMMDDHHMMSS` UTC.
pub fn hl7_timestamp() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Fields for the outbound MSH segment.
#[derive(Debug, Clone)]
pub struct MshParams {
    pub sending_app: String,
    pub sending_facility: String,
    pub receiving_app: String,
    pub receiving_facility: String,
    pub control_id: String,
    pub message_type: String,
    pub trigger_event: String,
    pub version: String,
}

fn msh_line(p: &MshParams, timestamp: &str) -> String {
    format!(
        "MSH|^~\\&|{}|{}|{}|{}|{}||{}^{}|{}|P|{}",
        p.sending_app,
        p.sending_facility,
        p.receiving_app,
        p.receiving_facility,
        timestamp,
        p.message_type,
        p.trigger_event,
        p.control_id,
        p.version
    )
}

/// ADT^A01 admit message: MSH + EVN + PID + PV1.
pub fn build_adt_a01(p: &MshParams, patient_id: &str, patient_name: &str) -> String {
    let ts = hl7_timestamp();
    [
        msh_line(p, &ts),
        format!("EVN|A01|{ts}"),
        format!("PID|1||{patient_id}^^^MRN||{patient_name}||19700101|U"),
        "PV1|1|I|ER^1^1".to_string(),
    ]
    .join("\r")
}

/// ORU^R01 observation result: MSH + PID + OBR + OBX.
pub fn build_oru_r01(p: &MshParams, patient_id: &str, patient_name: &str) -> String {
    let ts = hl7_timestamp();
    [
        msh_line(p, &ts),
        format!("PID|1||{patient_id}^^^MRN||{patient_name}||19700101|U"),
        format!("OBR|1|||CBC^COMPLETE BLOOD COUNT|||{ts}"),
        "OBX|1|NM|WBC^WHITE BLOOD CELL COUNT||7.2|10*3/uL|4.0-11.0|N|||F".to_string(),
    ]
    .join("\r")
}

/// Parsed MSH header fields (spec naming, MSH-3 onward).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Msh {
    pub sending_app: String,
    pub sending_facility: String,
    pub receiving_app: String,
    pub receiving_facility: String,
    pub timestamp: String,
    pub message_type: String,
    pub trigger_event: String,
    pub control_id: String,
    pub processing_id: String,
    pub version: String,
}

/// Parsed MSA acknowledgement. `ack_text` is MSA-3, not MSA-2 (the control
/// id sits between them and is routinely confused with the text).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Msa {
    pub ack_code: String,
    pub control_id: String,
    pub ack_text: String,
}

/// A whole received message, segment-indexed.
#[derive(Debug, Clone)]
pub struct Hl7Message {
    pub segments: Vec<Vec<String>>,
}

impl Hl7Message {
    pub fn parse(text: &str) -> Result<Self> {
        let segments: Vec<Vec<String>> = text
            .split('\r')
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .map(|l| l.split('|').map(str::to_string).collect())
            .collect();
        if segments.is_empty() {
            return Err(ProbeError::malformed("empty HL7 message"));
        }
        Ok(Self { segments })
    }

    fn segment(&self, id: &str) -> Option<&[String]> {
        self.segments
            .iter()
            .find(|s| s.first().map(String::as_str) == Some(id))
            .map(Vec::as_slice)
    }

    /// MSH semantics: after the `|` split, index 1 holds the encoding
    /// characters (MSH-2), so MSH-3 starts at index 2.
    pub fn msh(&self) -> Result<Msh> {
        let seg = self
            .segment("MSH")
            .ok_or_else(|| ProbeError::malformed("response has no MSH segment"))?;
        let field = |i: usize| seg.get(i).cloned().unwrap_or_default();
        let (message_type, trigger_event) = {
            let mt = field(8);
            let mut it = mt.split('^');
            (
                it.next().unwrap_or_default().to_string(),
                it.next().unwrap_or_default().to_string(),
            )
        };
        Ok(Msh {
            sending_app: field(2),
            sending_facility: field(3),
            receiving_app: field(4),
            receiving_facility: field(5),
            timestamp: field(6),
            message_type,
            trigger_event,
            control_id: field(9),
            processing_id: field(10),
            version: field(11),
        })
    }

    pub fn msa(&self) -> Option<Msa> {
        let seg = self.segment("MSA")?;
        let field = |i: usize| seg.get(i).cloned().unwrap_or_default();
        Some(Msa {
            ack_code: field(1),
            control_id: field(2),
            ack_text: field(3),
        })
    }
}
