// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    codec::buf::{ByteReader, ByteWriter, utf16le},
    error::{ProbeError, Result},
    models::smb2::header::HEADER_LEN,
};

pub const SHARE_TYPE_DISK: u8 = 0x01;
pub const SHARE_TYPE_PIPE: u8 = 0x02;
pub const SHARE_TYPE_PRINT: u8 = 0x03;

pub fn share_type_text(t: u8) -> &'static str {
    match t {
        SHARE_TYPE_DISK => "DISK",
        SHARE_TYPE_PIPE => "PIPE",
        SHARE_TYPE_PRINT => "PRINT",
        _ => "UNKNOWN",
    }
}

/// UNC path for a share: `\\host\share`.
pub fn unc_path(host: &str, share: &str) -> String {
    format!("\\\\{host}\\{share}")
}

/// TREE_CONNECT request body (StructureSize 9 + UTF-16LE path).
pub fn build_tree_connect(host: &str, share: &str) -> Vec<u8> {
    let path = utf16le(&unc_path(host, share));
    let mut w = ByteWriter::with_capacity(8 + path.len());
    w.u16_le(9);
    w.u16_le(0); // reserved
    w.u16_le((HEADER_LEN + 8) as u16);
    w.u16_le(path.len() as u16);
    w.bytes(&path);
    w.into_bytes()
}

#[derive(Debug, Clone)]
pub struct TreeConnectInfo {
    pub share_type: u8,
    pub share_flags: u32,
    pub capabilities: u32,
    pub maximal_access: u32,
}

pub fn parse_tree_connect_response(message: &[u8]) -> Result<TreeConnectInfo> {
    let body = message
        .get(HEADER_LEN..)
        .ok_or_else(|| ProbeError::malformed("TREE_CONNECT response missing body"))?;
    let mut r = ByteReader::new(body);
    let structure_size = r.u16_le()?;
    if structure_size != 16 {
        return Err(ProbeError::malformed(format!(
            "TREE_CONNECT response StructureSize {structure_size}, expected 16"
        )));
    }
    let share_type = r.u8()?;
    let _reserved = r.u8()?;
    let share_flags = r.u32_le()?;
    let capabilities = r.u32_le()?;
    let maximal_access = r.u32_le()?;
    Ok(TreeConnectInfo {
        share_type,
        share_flags,
        capabilities,
        maximal_access,
    })
}
