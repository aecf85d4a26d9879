// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bitflags::bitflags;

use crate::{
    codec::buf::{ByteReader, ByteWriter},
    error::{ProbeError, Result},
    models::smb2::{filetime::filetime_to_iso8601, header::HEADER_LEN},
};

/// Dialects offered, oldest first.
pub const OFFERED_DIALECTS: [u16; 5] = [0x0202, 0x0210, 0x0300, 0x0302, 0x0311];

pub const SECURITY_MODE_SIGNING_ENABLED: u16 = 0x0001;
pub const NEGOTIATE_CAPABILITIES: u32 = 0x7F;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ServerCapabilities: u32 {
        const DFS                = 0x01;
        const LEASING            = 0x02;
        const LARGE_MTU          = 0x04;
        const MULTI_CHANNEL      = 0x08;
        const PERSISTENT_HANDLES = 0x10;
        const DIRECTORY_LEASING  = 0x20;
        const ENCRYPTION         = 0x40;
    }
}

pub fn dialect_name(dialect: u16) -> String {
    match dialect {
        0x0202 => "SMB 2.0.2".to_string(),
        0x0210 => "SMB 2.1".to_string(),
        0x0300 => "SMB 3.0".to_string(),
        0x0302 => "SMB 3.0.2".to_string(),
        0x0311 => "SMB 3.1.1".to_string(),
        0x02FF => "SMB2 wildcard".to_string(),
        other => format!("0x{other:04x}"),
    }
}

/// NEGOTIATE request body (StructureSize 36 + dialect array).
pub fn build_negotiate(client_guid: [u8; 16]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(36 + OFFERED_DIALECTS.len() * 2);
    w.u16_le(36);
    w.u16_le(OFFERED_DIALECTS.len() as u16);
    w.u16_le(SECURITY_MODE_SIGNING_ENABLED);
    w.u16_le(0); // reserved
    w.u32_le(NEGOTIATE_CAPABILITIES);
    w.bytes(&client_guid);
    w.u64_le(0); // ClientStartTime (no 3.1.1 contexts offered)
    for d in OFFERED_DIALECTS {
        w.u16_le(d);
    }
    w.into_bytes()
}

#[derive(Debug, Clone)]
pub struct NegotiateInfo {
    pub dialect: u16,
    pub dialect_name: String,
    pub security_mode: u16,
    pub signing_required: bool,
    pub server_guid: [u8; 16],
    pub capabilities: ServerCapabilities,
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    /// Server clock, ISO 8601 UTC.
    pub system_time: Option<String>,
    pub server_start_time: Option<String>,
    /// SPNEGO hint blob from the security buffer, if any.
    pub security_buffer: Vec<u8>,
}

/// Parse a NEGOTIATE response out of the full message (header + body).
pub fn parse_negotiate_response(message: &[u8]) -> Result<NegotiateInfo> {
    let body = message
        .get(HEADER_LEN..)
        .ok_or_else(|| ProbeError::malformed("NEGOTIATE response missing body"))?;
    let mut r = ByteReader::new(body);
    let structure_size = r.u16_le()?;
    if structure_size != 65 {
        return Err(ProbeError::malformed(format!(
            "NEGOTIATE response StructureSize {structure_size}, expected 65"
        )));
    }
    let security_mode = r.u16_le()?;
    let dialect = r.u16_le()?;
    let _context_count = r.u16_le()?;
    let mut server_guid = [0u8; 16];
    server_guid.copy_from_slice(r.take(16)?);
    let capabilities = ServerCapabilities::from_bits_retain(r.u32_le()?);
    let max_transact_size = r.u32_le()?;
    let max_read_size = r.u32_le()?;
    let max_write_size = r.u32_le()?;
    let system_time = filetime_to_iso8601(r.u64_le()?);
    let server_start_time = filetime_to_iso8601(r.u64_le()?);
    let sec_offset = r.u16_le()? as usize;
    let sec_length = r.u16_le()? as usize;

    let security_buffer = if sec_length > 0 {
        message
            .get(sec_offset..sec_offset + sec_length)
            .unwrap_or_default()
            .to_vec()
    } else {
        Vec::new()
    };

    Ok(NegotiateInfo {
        dialect,
        dialect_name: dialect_name(dialect),
        security_mode,
        signing_required: security_mode & 0x0002 != 0,
        server_guid,
        capabilities,
        max_transact_size,
        max_read_size,
        max_write_size,
        system_time,
        server_start_time,
        security_buffer,
    })
}

/// Capability names for the JSON response, in bit order.
pub fn capability_names(caps: ServerCapabilities) -> Vec<&'static str> {
    let table = [
        (ServerCapabilities::DFS, "DFS"),
        (ServerCapabilities::LEASING, "LEASING"),
        (ServerCapabilities::LARGE_MTU, "LARGE_MTU"),
        (ServerCapabilities::MULTI_CHANNEL, "MULTI_CHANNEL"),
        (ServerCapabilities::PERSISTENT_HANDLES, "PERSISTENT_HANDLES"),
        (ServerCapabilities::DIRECTORY_LEASING, "DIRECTORY_LEASING"),
        (ServerCapabilities::ENCRYPTION, "ENCRYPTION"),
    ];
    table
        .into_iter()
        .filter(|(bit, _)| caps.contains(*bit))
        .map(|(_, name)| name)
        .collect()
}
