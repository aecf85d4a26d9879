// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Apache Ignite thin-client binary protocol: the 1.7.0 handshake and the
//! little-endian operation envelope. Cache ids are Java `String.hashCode`
//! over the cache name.

use crate::{
    codec::buf::{ByteReader, ByteWriter},
    error::{ProbeError, Result},
};

pub const CLIENT_VERSION: (i16, i16, i16) = (1, 7, 0);

pub const OP_CACHE_GET_NAMES: i16 = 1050;
pub const OP_CACHE_GET_SIZE: i16 = 1020;

pub const VAL_BYTE: u8 = 1;
pub const VAL_SHORT: u8 = 2;
pub const VAL_INT: u8 = 3;
pub const VAL_LONG: u8 = 4;
pub const VAL_FLOAT: u8 = 5;
pub const VAL_DOUBLE: u8 = 6;
pub const VAL_CHAR: u8 = 7;
pub const VAL_BOOL: u8 = 8;
pub const VAL_STRING: u8 = 9;
pub const VAL_NULL: u8 = 101;

/// 11-byte handshake request: 4-byte LE length, then opcode 1 and the
/// protocol version triple.
pub fn build_handshake() -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(11);
    w.u32_le(7);
    w.u8(1);
    w.u16_le(CLIENT_VERSION.0 as u16);
    w.u16_le(CLIENT_VERSION.1 as u16);
    w.u16_le(CLIENT_VERSION.2 as u16);
    w.into_bytes()
}

#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    pub success: bool,
    /// Node UUID serialised as two little-endian 64-bit halves.
    pub node_uuid: Option<String>,
    /// Server version reported on rejection.
    pub server_version: Option<(i16, i16, i16)>,
    pub error: Option<String>,
}

/// Parse the handshake response payload (length prefix already stripped).
pub fn parse_handshake_response(payload: &[u8]) -> Result<HandshakeResponse> {
    let mut r = ByteReader::new(payload);
    let success = r.u8()? == 1;

    if success {
        let node_uuid = if r.remaining() >= 16 {
            let most = r.u64_le()?;
            let least = r.u64_le()?;
            Some(format_uuid(most, least))
        } else {
            None
        };
        // Whatever follows is feature flags; reported length only.
        return Ok(HandshakeResponse {
            success,
            node_uuid,
            server_version: None,
            error: None,
        });
    }

    let server_version = if r.remaining() >= 6 {
        Some((
            r.u16_le()? as i16,
            r.u16_le()? as i16,
            r.u16_le()? as i16,
        ))
    } else {
        None
    };
    let error = read_tagged_string(&mut r).ok().flatten();
    Ok(HandshakeResponse {
        success,
        node_uuid: None,
        server_version,
        error,
    })
}

fn format_uuid(most: u64, least: u64) -> String {
    format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
        (most >> 32) as u32,
        (most >> 16) as u16,
        most as u16,
        (least >> 48) as u16,
        least & 0x0000_FFFF_FFFF_FFFF
    )
}

/// Regular operation: `len(i32 LE) | opCode(i16 LE) | requestId(i64 LE) |
/// body`.
pub fn build_operation(op_code: i16, request_id: i64, body: &[u8]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(14 + body.len());
    w.u32_le((2 + 8 + body.len()) as u32);
    w.u16_le(op_code as u16);
    w.u64_le(request_id as u64);
    w.bytes(body);
    w.into_bytes()
}

#[derive(Debug, Clone)]
pub struct OperationResponse {
    pub request_id: i64,
    pub status: i32,
    pub body: Vec<u8>,
}

/// Parse a response payload (length prefix already stripped):
/// `requestId(i64 LE) | status(i32 LE) | body`.
pub fn parse_operation_response(payload: &[u8]) -> Result<OperationResponse> {
    let mut r = ByteReader::new(payload);
    let request_id = r.u64_le()? as i64;
    let status = r.u32_le()? as i32;
    let body = r.take(r.remaining())?.to_vec();
    Ok(OperationResponse {
        request_id,
        status,
        body,
    })
}

/// Java `String.hashCode`: 32-bit signed `h = 31*h + codeUnit` over UTF-16
/// code units.
pub fn java_string_hash_code(s: &str) -> i32 {
    let mut h: i32 = 0;
    for unit in s.encode_utf16() {
        h = h.wrapping_mul(31).wrapping_add(unit as i32);
    }
    h
}

/// Tagged string value: type byte 9, i32 LE length, UTF-8 bytes.
pub fn write_tagged_string(w: &mut ByteWriter, s: &str) {
    w.u8(VAL_STRING);
    w.u32_le(s.len() as u32);
    w.bytes(s.as_bytes());
}

pub fn write_tagged_int(w: &mut ByteWriter, v: i32) {
    w.u8(VAL_INT);
    w.u32_le(v as u32);
}

pub fn write_tagged_null(w: &mut ByteWriter) {
    w.u8(VAL_NULL);
}

/// Read an optional tagged string (`None` for the null tag).
pub fn read_tagged_string(r: &mut ByteReader<'_>) -> Result<Option<String>> {
    if r.is_empty() {
        return Ok(None);
    }
    match r.u8()? {
        VAL_NULL => Ok(None),
        VAL_STRING => {
            let len = r.u32_le()? as usize;
            if len > r.remaining() {
                return Err(ProbeError::malformed("ignite: string length past end"));
            }
            Ok(Some(String::from_utf8_lossy(r.take(len)?).into_owned()))
        },
        other => Err(ProbeError::malformed(format!(
            "ignite: expected string tag, got {other}"
        ))),
    }
}
