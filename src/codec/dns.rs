// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The one DNS wire codec, shared by DoT and DoH. Query construction is
//! minimal (RD set, one question, no EDNS0); response parsing handles name
//! compression with a bounded pointer chase.

use crate::{
    codec::buf::{ByteReader, ByteWriter, ipv4_to_string, ipv6_to_string},
    error::{ProbeError, Result},
};

pub const TYPE_A: u16 = 1;
pub const TYPE_NS: u16 = 2;
pub const TYPE_CNAME: u16 = 5;
pub const TYPE_SOA: u16 = 6;
pub const TYPE_PTR: u16 = 12;
pub const TYPE_MX: u16 = 15;
pub const TYPE_TXT: u16 = 16;
pub const TYPE_AAAA: u16 = 28;
pub const TYPE_SRV: u16 = 33;

/// Compression pointer chases beyond this are treated as hostile loops.
const MAX_POINTER_JUMPS: usize = 128;

pub fn type_from_name(s: &str) -> Option<u16> {
    match s.to_ascii_uppercase().as_str() {
        "A" => Some(TYPE_A),
        "NS" => Some(TYPE_NS),
        "CNAME" => Some(TYPE_CNAME),
        "SOA" => Some(TYPE_SOA),
        "PTR" => Some(TYPE_PTR),
        "MX" => Some(TYPE_MX),
        "TXT" => Some(TYPE_TXT),
        "AAAA" => Some(TYPE_AAAA),
        "SRV" => Some(TYPE_SRV),
        _ => None,
    }
}

pub fn type_name(t: u16) -> String {
    match t {
        TYPE_A => "A".to_string(),
        TYPE_NS => "NS".to_string(),
        TYPE_CNAME => "CNAME".to_string(),
        TYPE_SOA => "SOA".to_string(),
        TYPE_PTR => "PTR".to_string(),
        TYPE_MX => "MX".to_string(),
        TYPE_TXT => "TXT".to_string(),
        TYPE_AAAA => "AAAA".to_string(),
        TYPE_SRV => "SRV".to_string(),
        other => format!("TYPE{other}"),
    }
}

/// Standard recursive query: header + one question, counts otherwise zero.
pub fn build_query(txid: u16, name: &str, qtype: u16) -> Result<Vec<u8>> {
    let mut w = ByteWriter::with_capacity(16 + name.len() + 2);
    w.u16_be(txid);
    w.u16_be(0x0100); // RD
    w.u16_be(1); // QDCOUNT
    w.u16_be(0);
    w.u16_be(0);
    w.u16_be(0);
    write_name(&mut w, name)?;
    w.u16_be(qtype);
    w.u16_be(1); // IN
    Ok(w.into_bytes())
}

fn write_name(w: &mut ByteWriter, name: &str) -> Result<()> {
    let trimmed = name.trim_end_matches('.');
    if !trimmed.is_empty() {
        for label in trimmed.split('.') {
            if label.is_empty() {
                return Err(ProbeError::validation(format!("empty label in {name:?}")));
            }
            if label.len() > 63 {
                return Err(ProbeError::validation(format!(
                    "label longer than 63 bytes in {name:?}"
                )));
            }
            w.u8(label.len() as u8);
            w.bytes(label.as_bytes());
        }
    }
    w.u8(0);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub name: String,
    pub rtype: u16,
    pub ttl: u32,
    /// Human rendering of the RDATA (dotted quad, name, "prio target", …).
    pub data: String,
}

#[derive(Debug, Clone)]
pub struct DnsResponse {
    pub txid: u16,
    pub flags: u16,
    pub rcode: u8,
    pub question: Option<(String, u16)>,
    pub answers: Vec<DnsRecord>,
    pub authority_count: u16,
    pub additional_count: u16,
}

/// Parse a full DNS message (the 2-byte TCP length prefix already removed).
/// The transaction id is reported but deliberately not matched against the
/// query.
pub fn parse_response(msg: &[u8]) -> Result<DnsResponse> {
    let mut r = ByteReader::new(msg);
    let txid = r.u16_be()?;
    let flags = r.u16_be()?;
    let qdcount = r.u16_be()?;
    let ancount = r.u16_be()?;
    let nscount = r.u16_be()?;
    let arcount = r.u16_be()?;

    let mut question = None;
    let mut pos = r.pos();
    for _ in 0..qdcount {
        let (name, next) = decode_name(msg, pos)?;
        let mut qr = ByteReader::new(msg);
        qr.seek(next)?;
        let qtype = qr.u16_be()?;
        let _qclass = qr.u16_be()?;
        pos = qr.pos();
        question.get_or_insert((name, qtype));
    }

    let mut answers = Vec::with_capacity(ancount as usize);
    for _ in 0..ancount {
        let (name, next) = decode_name(msg, pos)?;
        let mut ar = ByteReader::new(msg);
        ar.seek(next)?;
        let rtype = ar.u16_be()?;
        let _class = ar.u16_be()?;
        let ttl = ar.u32_be()?;
        let rdlen = ar.u16_be()? as usize;
        let rdata_start = ar.pos();
        let rdata = ar.take(rdlen)?;
        pos = ar.pos();

        let data = render_rdata(msg, rtype, rdata, rdata_start)?;
        answers.push(DnsRecord {
            name,
            rtype,
            ttl,
            data,
        });
    }

    Ok(DnsResponse {
        txid,
        flags,
        rcode: (flags & 0x000F) as u8,
        question,
        answers,
        authority_count: nscount,
        additional_count: arcount,
    })
}

fn render_rdata(msg: &[u8], rtype: u16, rdata: &[u8], rdata_start: usize) -> Result<String> {
    Ok(match rtype {
        TYPE_A => {
            if rdata.len() != 4 {
                return Err(ProbeError::malformed("A record RDATA is not 4 bytes"));
            }
            let mut b = [0u8; 4];
            b.copy_from_slice(rdata);
            ipv4_to_string(&b)
        },
        TYPE_AAAA => {
            if rdata.len() != 16 {
                return Err(ProbeError::malformed("AAAA record RDATA is not 16 bytes"));
            }
            let mut b = [0u8; 16];
            b.copy_from_slice(rdata);
            ipv6_to_string(&b)
        },
        TYPE_NS | TYPE_CNAME | TYPE_PTR => decode_name(msg, rdata_start)?.0,
        TYPE_MX => {
            let mut r = ByteReader::new(rdata);
            let priority = r.u16_be()?;
            let (name, _) = decode_name(msg, rdata_start + 2)?;
            format!("{priority} {name}")
        },
        TYPE_SOA => {
            let (mname, next) = decode_name(msg, rdata_start)?;
            let (rname, next) = decode_name(msg, next)?;
            let mut r = ByteReader::new(msg);
            r.seek(next)?;
            let serial = r.u32_be()?;
            format!("{mname} {rname} {serial}")
        },
        TYPE_SRV => {
            let mut r = ByteReader::new(rdata);
            let priority = r.u16_be()?;
            let weight = r.u16_be()?;
            let port = r.u16_be()?;
            let (tgt, _) = decode_name(msg, rdata_start + 6)?;
            format!("{priority} {weight} {port} {tgt}")
        },
        TYPE_TXT => {
            // Concatenate every character-string with no separator.
            let mut out = String::new();
            let mut r = ByteReader::new(rdata);
            while !r.is_empty() {
                let len = r.u8()? as usize;
                let s = r.take(len)?;
                out.push_str(&String::from_utf8_lossy(s));
            }
            out
        },
        _ => hex::encode(rdata),
    })
}

/// Decode a possibly-compressed name starting at `offset`. Returns the name
/// and the offset just past it in the original (uncompressed) position.
pub fn decode_name(msg: &[u8], offset: usize) -> Result<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut pos = offset;
    let mut end_after: Option<usize> = None;
    let mut jumps = 0usize;

    loop {
        let len = *msg
            .get(pos)
            .ok_or_else(|| ProbeError::malformed("name runs past message end"))?;
        if len & 0xC0 == 0xC0 {
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return Err(ProbeError::malformed(
                    "compression pointer chain exceeds 128 jumps",
                ));
            }
            let lo = *msg
                .get(pos + 1)
                .ok_or_else(|| ProbeError::malformed("truncated compression pointer"))?;
            end_after.get_or_insert(pos + 2);
            pos = (((len & 0x3F) as usize) << 8) | lo as usize;
            continue;
        }
        if len == 0 {
            end_after.get_or_insert(pos + 1);
            break;
        }
        if len > 63 {
            return Err(ProbeError::malformed("label length above 63"));
        }
        let start = pos + 1;
        let label = msg
            .get(start..start + len as usize)
            .ok_or_else(|| ProbeError::malformed("label runs past message end"))?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos = start + len as usize;
    }

    let name = labels.join(".");
    Ok((name, end_after.unwrap_or(pos)))
}
