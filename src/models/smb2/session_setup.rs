// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    codec::buf::{ByteReader, ByteWriter},
    error::{ProbeError, Result},
    models::smb2::header::HEADER_LEN,
};

pub const SESSION_FLAG_IS_GUEST: u16 = 0x0001;
pub const SESSION_FLAG_IS_NULL: u16 = 0x0002;

/// SESSION_SETUP request body (StructureSize 25) carrying a SPNEGO blob.
pub fn build_session_setup(security_blob: &[u8]) -> Vec<u8> {
    let blob_offset = HEADER_LEN + 24;
    let mut w = ByteWriter::with_capacity(24 + security_blob.len());
    w.u16_le(25);
    w.u8(0); // flags
    w.u8(0x01); // security mode: signing enabled
    w.u32_le(0); // capabilities
    w.u32_le(0); // channel
    w.u16_le(blob_offset as u16);
    w.u16_le(security_blob.len() as u16);
    w.u64_le(0); // previous session id
    w.bytes(security_blob);
    w.into_bytes()
}

#[derive(Debug, Clone)]
pub struct SessionSetupInfo {
    pub session_flags: u16,
    pub security_buffer: Vec<u8>,
}

impl SessionSetupInfo {
    pub fn is_guest(&self) -> bool {
        self.session_flags & SESSION_FLAG_IS_GUEST != 0
    }

    pub fn is_null(&self) -> bool {
        self.session_flags & SESSION_FLAG_IS_NULL != 0
    }

    pub fn flags_text(&self) -> &'static str {
        if self.is_guest() {
            "GUEST"
        } else if self.is_null() {
            "NULL"
        } else {
            "USER"
        }
    }
}

/// Parse a SESSION_SETUP response from the full message; the security
/// buffer offset is relative to the SMB2 header start.
pub fn parse_session_setup_response(message: &[u8]) -> Result<SessionSetupInfo> {
    let body = message
        .get(HEADER_LEN..)
        .ok_or_else(|| ProbeError::malformed("SESSION_SETUP response missing body"))?;
    let mut r = ByteReader::new(body);
    let structure_size = r.u16_le()?;
    if structure_size != 9 {
        return Err(ProbeError::malformed(format!(
            "SESSION_SETUP response StructureSize {structure_size}, expected 9"
        )));
    }
    let session_flags = r.u16_le()?;
    let sec_offset = r.u16_le()? as usize;
    let sec_length = r.u16_le()? as usize;

    let security_buffer = if sec_length > 0 {
        message
            .get(sec_offset..sec_offset + sec_length)
            .ok_or_else(|| ProbeError::malformed("security buffer outside message"))?
            .to_vec()
    } else {
        Vec::new()
    };

    Ok(SessionSetupInfo {
        session_flags,
        security_buffer,
    })
}
