// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    codec::buf::{ByteReader, ByteWriter},
    error::{ProbeError, Result},
    models::smb2::header::HEADER_LEN,
};

/// One READ's worth of file content; larger files are reported truncated.
pub const READ_CAP: u32 = 64 * 1024;

/// READ request body (StructureSize 49, one trailing buffer byte).
pub fn build_read(file_id: [u8; 16], offset: u64, length: u32) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(49);
    w.u16_le(49);
    w.u8(0x50); // padding hint
    w.u8(0); // flags
    w.u32_le(length);
    w.u64_le(offset);
    w.bytes(&file_id);
    w.u32_le(0); // minimum count
    w.u32_le(0); // channel
    w.u32_le(0); // remaining bytes
    w.u16_le(0); // read channel info offset
    w.u16_le(0); // read channel info length
    w.u8(0); // buffer placeholder
    w.into_bytes()
}

#[derive(Debug, Clone)]
pub struct ReadInfo {
    pub data: Vec<u8>,
    pub remaining: u32,
}

pub fn parse_read_response(message: &[u8]) -> Result<ReadInfo> {
    let body = message
        .get(HEADER_LEN..)
        .ok_or_else(|| ProbeError::malformed("READ response missing body"))?;
    let mut r = ByteReader::new(body);
    let structure_size = r.u16_le()?;
    if structure_size != 17 {
        return Err(ProbeError::malformed(format!(
            "READ response StructureSize {structure_size}, expected 17"
        )));
    }
    let data_offset = r.u8()? as usize;
    let _reserved = r.u8()?;
    let data_length = r.u32_le()? as usize;
    let remaining = r.u32_le()?;
    let _reserved2 = r.u32_le()?;

    let data = if data_length > 0 {
        message
            .get(data_offset..data_offset + data_length)
            .ok_or_else(|| ProbeError::malformed("READ data outside message"))?
            .to_vec()
    } else {
        Vec::new()
    };

    Ok(ReadInfo { data, remaining })
}

/// WRITE request body (StructureSize 49) with the data appended.
pub fn build_write(file_id: [u8; 16], offset: u64, data: &[u8]) -> Vec<u8> {
    let data_offset = HEADER_LEN + 48;
    let mut w = ByteWriter::with_capacity(48 + data.len());
    w.u16_le(49);
    w.u16_le(data_offset as u16);
    w.u32_le(data.len() as u32);
    w.u64_le(offset);
    w.bytes(&file_id);
    w.u32_le(0); // channel
    w.u32_le(0); // remaining bytes
    w.u16_le(0); // write channel info offset
    w.u16_le(0); // write channel info length
    w.u32_le(0); // flags
    w.bytes(data);
    w.into_bytes()
}

pub fn parse_write_response(message: &[u8]) -> Result<u32> {
    let body = message
        .get(HEADER_LEN..)
        .ok_or_else(|| ProbeError::malformed("WRITE response missing body"))?;
    let mut r = ByteReader::new(body);
    let structure_size = r.u16_le()?;
    if structure_size != 17 {
        return Err(ProbeError::malformed(format!(
            "WRITE response StructureSize {structure_size}, expected 17"
        )));
    }
    let _reserved = r.u16_le()?;
    let count = r.u32_le()?;
    Ok(count)
}
