// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PCEP (RFC 5440) message and object codec: OPEN/KEEPALIVE session setup
//! and the PCReq/PCRep pair with ERO, METRIC, and NO-PATH interpretation.

use crate::{
    codec::buf::{ByteReader, ByteWriter, ipv4_to_string},
    error::{ProbeError, Result},
};

pub const PCEP_VERSION: u8 = 1;

pub const MSG_OPEN: u8 = 1;
pub const MSG_KEEPALIVE: u8 = 2;
pub const MSG_PCREQ: u8 = 3;
pub const MSG_PCREP: u8 = 4;
pub const MSG_NOTIFICATION: u8 = 5;
pub const MSG_ERROR: u8 = 6;
pub const MSG_CLOSE: u8 = 7;

pub const CLASS_OPEN: u8 = 1;
pub const CLASS_RP: u8 = 2;
pub const CLASS_NOPATH: u8 = 3;
pub const CLASS_ENDPOINTS: u8 = 4;
pub const CLASS_BANDWIDTH: u8 = 5;
pub const CLASS_METRIC: u8 = 6;
pub const CLASS_ERO: u8 = 7;
pub const CLASS_LSPA: u8 = 9;
pub const CLASS_ERROR: u8 = 13;
pub const CLASS_CLOSE: u8 = 15;

pub const METRIC_IGP: u8 = 1;
pub const METRIC_TE: u8 = 2;

fn common_header(msg_type: u8, body_len: usize) -> ByteWriter {
    let mut w = ByteWriter::with_capacity(4 + body_len);
    w.u8(PCEP_VERSION << 5);
    w.u8(msg_type);
    w.u16_be((4 + body_len) as u16);
    w
}

/// Object header + 4-byte padded body. `P`/`I` flags stay clear on
/// everything we send.
fn push_object(w: &mut ByteWriter, class: u8, otype: u8, body: &[u8]) {
    let padded = body.len().div_ceil(4) * 4;
    w.u8(class);
    w.u8(otype << 4);
    w.u16_be((4 + padded) as u16);
    w.bytes(body);
    for _ in body.len()..padded {
        w.u8(0);
    }
}

pub fn build_open_message(keepalive: u8, deadtimer: u8, session_id: u8) -> Vec<u8> {
    let mut body = ByteWriter::with_capacity(4);
    body.u8(PCEP_VERSION << 5);
    body.u8(keepalive);
    body.u8(deadtimer);
    body.u8(session_id);
    let open_body = body.into_bytes();

    let mut w = common_header(MSG_OPEN, 4 + open_body.len());
    push_object(&mut w, CLASS_OPEN, 1, &open_body);
    w.into_bytes()
}

pub fn build_keepalive_message() -> Vec<u8> {
    common_header(MSG_KEEPALIVE, 0).into_bytes()
}

pub fn build_close_message(reason: u8) -> Vec<u8> {
    let body = [0u8, 0, 0, reason];
    let mut w = common_header(MSG_CLOSE, 8);
    push_object(&mut w, CLASS_CLOSE, 1, &body);
    w.into_bytes()
}

/// PCReq: RP + END-POINTS (IPv4) + optional BANDWIDTH.
pub fn build_pcreq_message(
    request_id: u32,
    src: [u8; 4],
    dst: [u8; 4],
    bandwidth: Option<f32>,
) -> Vec<u8> {
    let mut rp = ByteWriter::with_capacity(8);
    rp.u32_be(0); // flags / priority
    rp.u32_be(request_id);
    let rp = rp.into_bytes();

    let mut ep = ByteWriter::with_capacity(8);
    ep.bytes(&src);
    ep.bytes(&dst);
    let ep = ep.into_bytes();

    let mut body_len = 8 + rp.len() + ep.len();
    if bandwidth.is_some() {
        body_len += 4 + 4;
    }

    let mut w = common_header(MSG_PCREQ, body_len);
    push_object(&mut w, CLASS_RP, 1, &rp);
    push_object(&mut w, CLASS_ENDPOINTS, 1, &ep);
    if let Some(bw) = bandwidth {
        let mut b = ByteWriter::with_capacity(4);
        b.f32_be(bw);
        push_object(&mut w, CLASS_BANDWIDTH, 1, &b.into_bytes());
    }
    w.into_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcepObject {
    pub class: u8,
    pub otype: u8,
    pub p_flag: bool,
    pub i_flag: bool,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PcepMessage {
    pub version: u8,
    pub msg_type: u8,
    pub objects: Vec<PcepObject>,
}

impl PcepMessage {
    pub fn object(&self, class: u8) -> Option<&PcepObject> {
        self.objects.iter().find(|o| o.class == class)
    }
}

/// Parse one message (header + objects). `bytes` must hold exactly the
/// message as announced by its own length field.
pub fn parse_message(bytes: &[u8]) -> Result<PcepMessage> {
    let mut r = ByteReader::new(bytes);
    let ver_flags = r.u8()?;
    let version = ver_flags >> 5;
    if version != PCEP_VERSION {
        return Err(ProbeError::malformed(format!("PCEP version {version}")));
    }
    let msg_type = r.u8()?;
    let length = r.u16_be()? as usize;
    if length != bytes.len() {
        return Err(ProbeError::malformed(format!(
            "PCEP length {length} does not match frame of {}",
            bytes.len()
        )));
    }

    let mut objects = Vec::new();
    while r.remaining() >= 4 {
        let class = r.u8()?;
        let ot_flags = r.u8()?;
        let obj_len = r.u16_be()? as usize;
        if obj_len < 4 {
            return Err(ProbeError::malformed("PCEP object length below 4"));
        }
        let body = r.take(obj_len - 4)?.to_vec();
        objects.push(PcepObject {
            class,
            otype: ot_flags >> 4,
            p_flag: ot_flags & 0x02 != 0,
            i_flag: ot_flags & 0x01 != 0,
            body,
        });
    }

    Ok(PcepMessage {
        version,
        msg_type,
        objects,
    })
}

/// The common-header length field, for framing the read.
pub fn peek_message_length(header: &[u8; 4]) -> Result<usize> {
    if header[0] >> 5 != PCEP_VERSION {
        return Err(ProbeError::malformed("PCEP: bad version in header"));
    }
    let len = u16::from_be_bytes([header[2], header[3]]) as usize;
    if len < 4 {
        return Err(ProbeError::malformed("PCEP: header length below 4"));
    }
    Ok(len)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInfo {
    pub version: u8,
    pub keepalive: u8,
    pub deadtimer: u8,
    pub session_id: u8,
    pub tlvs: Vec<(u16, Vec<u8>)>,
}

pub fn parse_open_body(body: &[u8]) -> Result<OpenInfo> {
    let mut r = ByteReader::new(body);
    let version = r.u8()? >> 5;
    let keepalive = r.u8()?;
    let deadtimer = r.u8()?;
    let session_id = r.u8()?;

    let mut tlvs = Vec::new();
    while r.remaining() >= 4 {
        let t = r.u16_be()?;
        let l = r.u16_be()? as usize;
        let v = r.take(l.min(r.remaining()))?.to_vec();
        let padded = l.div_ceil(4) * 4;
        let _ = r.skip((padded - l).min(r.remaining()));
        tlvs.push((t, v));
    }

    Ok(OpenInfo {
        version,
        keepalive,
        deadtimer,
        session_id,
        tlvs,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EroHop {
    pub address: String,
    pub prefix_len: u8,
    pub loose: bool,
}

/// ERO subobjects; only type 1 (IPv4 prefix) is interpreted, others are
/// skipped by their length.
pub fn parse_ero_body(body: &[u8]) -> Result<Vec<EroHop>> {
    let mut r = ByteReader::new(body);
    let mut hops = Vec::new();
    while r.remaining() >= 2 {
        let t = r.u8()?;
        let len = r.u8()? as usize;
        if len < 2 || len - 2 > r.remaining() {
            return Err(ProbeError::malformed("ERO subobject length"));
        }
        let sub_body = r.take(len - 2)?;
        if t & 0x7F == 1 {
            if sub_body.len() < 5 {
                return Err(ProbeError::malformed("ERO IPv4 subobject too short"));
            }
            let mut addr = [0u8; 4];
            addr.copy_from_slice(&sub_body[..4]);
            hops.push(EroHop {
                address: ipv4_to_string(&addr),
                prefix_len: sub_body[4],
                loose: t & 0x80 != 0,
            });
        }
    }
    Ok(hops)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub metric_type: u8,
    pub value: f32,
}

pub fn parse_metric_body(body: &[u8]) -> Result<Metric> {
    let mut r = ByteReader::new(body);
    r.skip(2)?; // reserved
    let _flags = r.u8()?;
    let metric_type = r.u8()?;
    let value = r.f32_be()?;
    Ok(Metric { metric_type, value })
}

/// NO-PATH nature-of-issue (0 = no path satisfying constraints).
pub fn parse_nopath_nature(body: &[u8]) -> Result<u8> {
    let mut r = ByteReader::new(body);
    r.u8()
}

/// PCEP-ERROR object body: reserved, flags, error-type, error-value.
pub fn parse_error_body(body: &[u8]) -> Result<(u8, u8)> {
    let mut r = ByteReader::new(body);
    r.skip(2)?;
    Ok((r.u8()?, r.u8()?))
}
