// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The 64-byte SMB2 packet header (little-endian body fields) and the
//! NetBIOS session wrapper. MessageIds are assigned per session, starting
//! at 0 for NEGOTIATE; signing is never negotiated so the signature field
//! stays zero.

use zerocopy::{
    FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, U16, U32,
    U64,
};

use crate::error::{ProbeError, Result};

pub const HEADER_LEN: usize = 64;
pub const SMB2_MAGIC: [u8; 4] = [0xFE, b'S', b'M', b'B'];

pub const CMD_NEGOTIATE: u16 = 0;
pub const CMD_SESSION_SETUP: u16 = 1;
pub const CMD_LOGOFF: u16 = 2;
pub const CMD_TREE_CONNECT: u16 = 3;
pub const CMD_TREE_DISCONNECT: u16 = 4;
pub const CMD_CREATE: u16 = 5;
pub const CMD_CLOSE: u16 = 6;
pub const CMD_READ: u16 = 8;
pub const CMD_WRITE: u16 = 9;
pub const CMD_QUERY_DIRECTORY: u16 = 14;

pub const STATUS_SUCCESS: u32 = 0x0000_0000;
pub const STATUS_PENDING: u32 = 0x0000_0103;
pub const STATUS_MORE_PROCESSING_REQUIRED: u32 = 0xC000_0016;
pub const STATUS_ACCESS_DENIED: u32 = 0xC000_0022;
pub const STATUS_OBJECT_NAME_NOT_FOUND: u32 = 0xC000_0034;
pub const STATUS_LOGON_FAILURE: u32 = 0xC000_006D;
pub const STATUS_BAD_NETWORK_NAME: u32 = 0xC000_00CC;
pub const STATUS_USER_SESSION_DELETED: u32 = 0xC000_0203;
pub const STATUS_FILE_IS_A_DIRECTORY: u32 = 0xC000_00BA;
pub const STATUS_NOT_A_DIRECTORY: u32 = 0xC000_0103;

pub fn nt_status_text(status: u32) -> String {
    match status {
        STATUS_SUCCESS => "STATUS_SUCCESS".to_string(),
        STATUS_PENDING => "STATUS_PENDING".to_string(),
        STATUS_MORE_PROCESSING_REQUIRED => "STATUS_MORE_PROCESSING_REQUIRED".to_string(),
        STATUS_ACCESS_DENIED => "STATUS_ACCESS_DENIED".to_string(),
        STATUS_OBJECT_NAME_NOT_FOUND => "STATUS_OBJECT_NAME_NOT_FOUND".to_string(),
        STATUS_LOGON_FAILURE => "STATUS_LOGON_FAILURE".to_string(),
        STATUS_BAD_NETWORK_NAME => "STATUS_BAD_NETWORK_NAME".to_string(),
        STATUS_USER_SESSION_DELETED => "STATUS_USER_SESSION_DELETED".to_string(),
        STATUS_FILE_IS_A_DIRECTORY => "STATUS_FILE_IS_A_DIRECTORY".to_string(),
        STATUS_NOT_A_DIRECTORY => "STATUS_NOT_A_DIRECTORY".to_string(),
        other => format!("NT_STATUS_0x{other:08X}"),
    }
}

/// SMB2 sync packet header.
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Smb2Header {
    pub protocol_id: [u8; 4],
    pub structure_size: U16<LittleEndian>,
    pub credit_charge: U16<LittleEndian>,
    pub status: U32<LittleEndian>,
    pub command: U16<LittleEndian>,
    pub credit_request: U16<LittleEndian>,
    pub flags: U32<LittleEndian>,
    pub next_command: U32<LittleEndian>,
    pub message_id: U64<LittleEndian>,
    pub reserved: U32<LittleEndian>,
    pub tree_id: U32<LittleEndian>,
    pub session_id: U64<LittleEndian>,
    pub signature: [u8; 16],
}

impl Smb2Header {
    pub fn request(command: u16, message_id: u64, tree_id: u32, session_id: u64) -> Self {
        let mut h = Self {
            protocol_id: SMB2_MAGIC,
            ..Default::default()
        };
        h.structure_size.set(64);
        h.credit_charge.set(1);
        h.command.set(command);
        h.credit_request.set(1);
        h.message_id.set(message_id);
        h.tree_id.set(tree_id);
        h.session_id.set(session_id);
        h
    }

    pub fn parse(message: &[u8]) -> Result<Self> {
        let bytes = message
            .get(..HEADER_LEN)
            .ok_or_else(|| ProbeError::malformed("SMB2 message shorter than header"))?;
        let hdr = Self::read_from_bytes(bytes)
            .map_err(|_| ProbeError::malformed("SMB2 header conversion failed"))?;
        if hdr.protocol_id != SMB2_MAGIC {
            return Err(ProbeError::malformed("SMB2: bad protocol magic"));
        }
        Ok(hdr)
    }
}

/// Prefix a message with the NetBIOS session header: one zero byte plus a
/// 24-bit big-endian length.
pub fn netbios_wrap(message: &[u8]) -> Vec<u8> {
    let len = message.len() as u32;
    let be = len.to_be_bytes();
    let mut out = Vec::with_capacity(message.len() + 4);
    out.push(0);
    out.extend_from_slice(&be[1..4]);
    out.extend_from_slice(message);
    out
}

/// Assemble header + body into one wire message (no NetBIOS prefix).
pub fn assemble(header: &Smb2Header, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(body);
    out
}
