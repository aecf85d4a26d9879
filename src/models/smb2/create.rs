// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bitflags::bitflags;

use crate::{
    codec::buf::{ByteReader, ByteWriter, utf16le},
    error::{ProbeError, Result},
    models::smb2::{filetime::filetime_to_ymd_hms, header::HEADER_LEN},
};

/// Desired access for file reads (GENERIC read set).
pub const ACCESS_READ: u32 = 0x0012_0089;
/// Desired access for file writes.
pub const ACCESS_WRITE: u32 = 0x4012_0116;
/// Directory listing access.
pub const ACCESS_DIR_LIST: u32 = 0x0000_0001; // FILE_LIST_DIRECTORY

pub const DISPOSITION_OPEN: u32 = 1;
pub const DISPOSITION_OVERWRITE_IF: u32 = 5;

pub const OPT_DIRECTORY_FILE: u32 = 0x0000_0001;
pub const OPT_NON_DIRECTORY_FILE: u32 = 0x0000_0040;

pub const SHARE_READ: u32 = 0x01;
pub const SHARE_WRITE: u32 = 0x02;
pub const SHARE_DELETE: u32 = 0x04;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileAttributes: u32 {
        const READ_ONLY = 0x01;
        const HIDDEN    = 0x02;
        const SYSTEM    = 0x04;
        const DIRECTORY = 0x10;
        const ARCHIVE   = 0x20;
        const NORMAL    = 0x80;
    }
}

pub fn attribute_names(attrs: FileAttributes) -> Vec<&'static str> {
    let table = [
        (FileAttributes::READ_ONLY, "READ_ONLY"),
        (FileAttributes::HIDDEN, "HIDDEN"),
        (FileAttributes::SYSTEM, "SYSTEM"),
        (FileAttributes::DIRECTORY, "DIRECTORY"),
        (FileAttributes::ARCHIVE, "ARCHIVE"),
    ];
    table
        .into_iter()
        .filter(|(bit, _)| attrs.contains(*bit))
        .map(|(_, name)| name)
        .collect()
}

#[derive(Debug, Clone)]
pub struct CreateParams<'a> {
    pub name: &'a str,
    pub desired_access: u32,
    pub file_attributes: u32,
    pub share_access: u32,
    pub disposition: u32,
    pub options: u32,
}

impl<'a> CreateParams<'a> {
    pub fn read_file(name: &'a str) -> Self {
        Self {
            name,
            desired_access: ACCESS_READ,
            file_attributes: 0,
            share_access: SHARE_READ,
            disposition: DISPOSITION_OPEN,
            options: OPT_NON_DIRECTORY_FILE,
        }
    }

    pub fn write_file(name: &'a str) -> Self {
        Self {
            name,
            desired_access: ACCESS_WRITE,
            file_attributes: 0,
            share_access: SHARE_READ,
            disposition: DISPOSITION_OVERWRITE_IF,
            options: OPT_NON_DIRECTORY_FILE,
        }
    }

    pub fn open_directory(name: &'a str) -> Self {
        Self {
            name,
            desired_access: ACCESS_DIR_LIST,
            file_attributes: 0,
            share_access: SHARE_READ | SHARE_WRITE | SHARE_DELETE,
            disposition: DISPOSITION_OPEN,
            options: OPT_DIRECTORY_FILE,
        }
    }
}

/// CREATE request body (StructureSize 57, no create contexts). The name is
/// the share-relative path without a leading backslash.
pub fn build_create(p: &CreateParams<'_>) -> Vec<u8> {
    let name = utf16le(p.name);
    let name_offset = HEADER_LEN + 56;
    let mut w = ByteWriter::with_capacity(56 + name.len().max(1));
    w.u16_le(57);
    w.u8(0); // security flags
    w.u8(0); // oplock level
    w.u32_le(2); // impersonation: Impersonation
    w.u64_le(0); // create flags
    w.u64_le(0); // reserved
    w.u32_le(p.desired_access);
    w.u32_le(p.file_attributes);
    w.u32_le(p.share_access);
    w.u32_le(p.disposition);
    w.u32_le(p.options);
    w.u16_le(name_offset as u16);
    w.u16_le(name.len() as u16);
    w.u32_le(0); // create contexts offset
    w.u32_le(0); // create contexts length
    if name.is_empty() {
        // The buffer must hold at least one byte even for the share root.
        w.u8(0);
    } else {
        w.bytes(&name);
    }
    w.into_bytes()
}

#[derive(Debug, Clone)]
pub struct CreateInfo {
    pub file_id: [u8; 16],
    pub create_action: u32,
    pub end_of_file: u64,
    pub allocation_size: u64,
    pub attributes: FileAttributes,
    pub created: Option<String>,
    pub last_accessed: Option<String>,
    pub last_written: Option<String>,
    pub changed: Option<String>,
}

impl CreateInfo {
    pub fn is_directory(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }
}

pub fn parse_create_response(message: &[u8]) -> Result<CreateInfo> {
    let body = message
        .get(HEADER_LEN..)
        .ok_or_else(|| ProbeError::malformed("CREATE response missing body"))?;
    let mut r = ByteReader::new(body);
    let structure_size = r.u16_le()?;
    if structure_size != 89 {
        return Err(ProbeError::malformed(format!(
            "CREATE response StructureSize {structure_size}, expected 89"
        )));
    }
    let _oplock = r.u8()?;
    let _flags = r.u8()?;
    let create_action = r.u32_le()?;
    let created = filetime_to_ymd_hms(r.u64_le()?);
    let last_accessed = filetime_to_ymd_hms(r.u64_le()?);
    let last_written = filetime_to_ymd_hms(r.u64_le()?);
    let changed = filetime_to_ymd_hms(r.u64_le()?);
    let allocation_size = r.u64_le()?;
    let end_of_file = r.u64_le()?;
    let attributes = FileAttributes::from_bits_retain(r.u32_le()?);
    let _reserved = r.u32_le()?;
    let mut file_id = [0u8; 16];
    file_id.copy_from_slice(r.take(16)?);

    Ok(CreateInfo {
        file_id,
        create_action,
        end_of_file,
        allocation_size,
        attributes,
        created,
        last_accessed,
        last_written,
        changed,
    })
}

/// CLOSE request body (StructureSize 24).
pub fn build_close(file_id: [u8; 16]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(24);
    w.u16_le(24);
    w.u16_le(0); // flags
    w.u32_le(0); // reserved
    w.bytes(&file_id);
    w.into_bytes()
}
