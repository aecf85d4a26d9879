// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    codec::buf::{ByteReader, ByteWriter, from_utf16le, utf16le},
    error::{ProbeError, Result},
    models::smb2::{
        create::FileAttributes,
        filetime::filetime_to_ymd_hms,
        header::HEADER_LEN,
    },
};

pub const FILE_DIRECTORY_INFORMATION: u8 = 1;
pub const LIST_OUTPUT_BUFFER_LEN: u32 = 65_536;

/// QUERY_DIRECTORY request body (StructureSize 33) with pattern `*` unless
/// told otherwise.
pub fn build_query_directory(file_id: [u8; 16], pattern: &str) -> Vec<u8> {
    let name = utf16le(pattern);
    let mut w = ByteWriter::with_capacity(32 + name.len());
    w.u16_le(33);
    w.u8(FILE_DIRECTORY_INFORMATION);
    w.u8(0); // flags
    w.u32_le(0); // file index
    w.bytes(&file_id);
    w.u16_le((HEADER_LEN + 32) as u16);
    w.u16_le(name.len() as u16);
    w.u32_le(LIST_OUTPUT_BUFFER_LEN);
    w.bytes(&name);
    w.into_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    /// `YYYY-MM-DD HH:MM:SS` UTC.
    pub created: Option<String>,
    pub modified: Option<String>,
}

/// Parse a QUERY_DIRECTORY response into entries (`.`/`..` included; the
/// operation filters them).
pub fn parse_query_directory_response(message: &[u8]) -> Result<Vec<DirEntry>> {
    let body = message
        .get(HEADER_LEN..)
        .ok_or_else(|| ProbeError::malformed("QUERY_DIRECTORY response missing body"))?;
    let mut r = ByteReader::new(body);
    let structure_size = r.u16_le()?;
    if structure_size != 9 {
        return Err(ProbeError::malformed(format!(
            "QUERY_DIRECTORY response StructureSize {structure_size}, expected 9"
        )));
    }
    let offset = r.u16_le()? as usize;
    let length = r.u32_le()? as usize;
    if length == 0 {
        return Ok(Vec::new());
    }
    let buffer = message
        .get(offset..offset + length)
        .ok_or_else(|| ProbeError::malformed("directory buffer outside message"))?;

    parse_file_directory_information(buffer)
}

/// Walk a FileDirectoryInformation buffer.
pub fn parse_file_directory_information(buffer: &[u8]) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    let mut pos = 0usize;
    loop {
        let mut r = ByteReader::new(buffer);
        r.seek(pos)?;
        let next_offset = r.u32_le()? as usize;
        let _file_index = r.u32_le()?;
        let created = filetime_to_ymd_hms(r.u64_le()?);
        let _last_access = r.u64_le()?;
        let modified = filetime_to_ymd_hms(r.u64_le()?);
        let _change = r.u64_le()?;
        let end_of_file = r.u64_le()?;
        let _allocation = r.u64_le()?;
        let attrs = FileAttributes::from_bits_retain(r.u32_le()?);
        let name_len = r.u32_le()? as usize;
        let name = from_utf16le(r.take(name_len)?)?;

        entries.push(DirEntry {
            name,
            is_dir: attrs.contains(FileAttributes::DIRECTORY),
            size: end_of_file,
            created,
            modified,
        });

        if next_offset == 0 {
            return Ok(entries);
        }
        pos += next_offset;
        if pos >= buffer.len() {
            return Err(ProbeError::malformed(
                "directory entry chain runs past buffer",
            ));
        }
    }
}
