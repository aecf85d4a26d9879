// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! NTLMSSP Type 1/2/3 message construction and the NTLMv2 challenge
//! response. Only the connectionless subset needed for a single
//! SESSION_SETUP round-trip is implemented; signing and key exchange are
//! deliberately absent (the Type 3 session key is 16 zero bytes).

use bitflags::bitflags;
use chrono::Utc;
use rand::RngExt;

use crate::{
    codec::buf::{ByteReader, ByteWriter, from_utf16le, utf16le},
    crypto::hashes::{hmac_md5, md4},
    error::{ProbeError, Result},
};

pub const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NtlmFlags: u32 {
        const UNICODE                    = 0x0000_0001;
        const REQUEST_TARGET             = 0x0000_0004;
        const NTLM                       = 0x0000_0200;
        const EXTENDED_SESSION_SECURITY  = 0x0008_0000;
        const TARGET_INFO                = 0x0080_0000;
        const NEG_128                    = 0x2000_0000;
        const NEG_56                     = 0x8000_0000;
    }
}

/// The fixed negotiate flag set offered in Type 1 and echoed in Type 3.
pub fn negotiate_flags() -> NtlmFlags {
    NtlmFlags::UNICODE
        | NtlmFlags::REQUEST_TARGET
        | NtlmFlags::NTLM
        | NtlmFlags::EXTENDED_SESSION_SECURITY
        | NtlmFlags::TARGET_INFO
        | NtlmFlags::NEG_128
        | NtlmFlags::NEG_56
}

/// Security buffer: `Len | MaxLen | Offset` referencing the payload area.
fn put_sec_buf(w: &mut ByteWriter, len: usize, offset: usize) {
    w.u16_le(len as u16);
    w.u16_le(len as u16);
    w.u32_le(offset as u32);
}

/// NTLM Type 1 (Negotiate). Domain and workstation travel as OEM strings in
/// the payload area.
pub fn build_type1(domain: &str, workstation: &str) -> Vec<u8> {
    let domain_b = domain.as_bytes();
    let ws_b = workstation.as_bytes();
    let header_len = 8 + 4 + 4 + 8 + 8;
    let domain_off = header_len;
    let ws_off = domain_off + domain_b.len();

    let mut w = ByteWriter::with_capacity(header_len + domain_b.len() + ws_b.len());
    w.bytes(SIGNATURE);
    w.u32_le(1);
    w.u32_le(negotiate_flags().bits());
    put_sec_buf(&mut w, domain_b.len(), domain_off);
    put_sec_buf(&mut w, ws_b.len(), ws_off);
    w.bytes(domain_b);
    w.bytes(ws_b);
    w.into_bytes()
}

/// Parsed NTLM Type 2 (Challenge).
#[derive(Debug, Clone)]
pub struct Type2 {
    pub flags: NtlmFlags,
    pub server_challenge: [u8; 8],
    pub target_name: String,
    /// Raw AV_PAIR block, echoed verbatim into the NTLMv2 blob.
    pub target_info: Vec<u8>,
}

pub fn parse_type2(bytes: &[u8]) -> Result<Type2> {
    let mut r = ByteReader::new(bytes);
    let sig = r.take(8)?;
    if sig != SIGNATURE {
        return Err(ProbeError::malformed("NTLM: bad signature"));
    }
    let msg_type = r.u32_le()?;
    if msg_type != 2 {
        return Err(ProbeError::unexpected(format!(
            "NTLM: expected Type 2, got Type {msg_type}"
        )));
    }
    let name_len = r.u16_le()? as usize;
    let _name_max = r.u16_le()?;
    let name_off = r.u32_le()? as usize;
    let flags = NtlmFlags::from_bits_retain(r.u32_le()?);
    let mut server_challenge = [0u8; 8];
    server_challenge.copy_from_slice(r.take(8)?);
    r.skip(8)?; // reserved

    // TargetInfo fields follow only when the server set the flag; absent on
    // ancient servers.
    let (info_len, info_off) = if flags.contains(NtlmFlags::TARGET_INFO) {
        let l = r.u16_le()? as usize;
        let _m = r.u16_le()?;
        let o = r.u32_le()? as usize;
        (l, o)
    } else {
        (0, 0)
    };

    let slice = |off: usize, len: usize| -> Result<&[u8]> {
        bytes
            .get(off..off + len)
            .ok_or_else(|| ProbeError::malformed("NTLM: buffer outside message"))
    };

    let target_name = if name_len > 0 {
        let raw = slice(name_off, name_len)?;
        if flags.contains(NtlmFlags::UNICODE) {
            from_utf16le(raw)?
        } else {
            String::from_utf8_lossy(raw).into_owned()
        }
    } else {
        String::new()
    };

    let target_info = if info_len > 0 {
        slice(info_off, info_len)?.to_vec()
    } else {
        Vec::new()
    };

    Ok(Type2 {
        flags,
        server_challenge,
        target_name,
        target_info,
    })
}

/// Windows FILETIME for "now": 100-ns intervals since 1601-01-01 UTC.
pub fn filetime_now() -> u64 {
    let now = Utc::now();
    let secs = now.timestamp() as u64;
    let sub = now.timestamp_subsec_nanos() as u64 / 100;
    (secs + 11_644_473_600) * 10_000_000 + sub
}

/// Fresh 8-byte client challenge from the process CSPRNG.
pub fn client_challenge() -> [u8; 8] {
    let mut out = [0u8; 8];
    rand::rng().fill(&mut out);
    out
}

/// The computed NTLMv2 pieces placed into Type 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtlmV2Response {
    /// NTProofStr || blob.
    pub nt_response: Vec<u8>,
    /// Always 24 zero bytes here.
    pub lm_response: [u8; 24],
}

/// Deterministic NTLMv2 computation (all entropy passed in, so fixed-vector
/// tests can pin the output).
pub fn compute_ntlmv2(
    username: &str,
    password: &str,
    domain: &str,
    target_name: &str,
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
    filetime: u64,
    target_info: &[u8],
) -> NtlmV2Response {
    let nt_hash = md4(&utf16le(password));

    let auth_target = if domain.is_empty() { target_name } else { domain };
    let identity = format!("{}{}", username.to_uppercase(), auth_target.to_uppercase());
    let ntlmv2_key = hmac_md5(&nt_hash, &utf16le(&identity));

    let mut blob = ByteWriter::with_capacity(32 + target_info.len());
    blob.bytes(&[0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    blob.u64_le(filetime);
    blob.bytes(client_challenge);
    blob.u32_le(0);
    blob.bytes(target_info);
    blob.u32_le(0);
    let blob = blob.into_bytes();

    let mut challenge_and_blob = Vec::with_capacity(8 + blob.len());
    challenge_and_blob.extend_from_slice(server_challenge);
    challenge_and_blob.extend_from_slice(&blob);
    let proof = hmac_md5(&ntlmv2_key, &challenge_and_blob);

    let mut nt_response = Vec::with_capacity(16 + blob.len());
    nt_response.extend_from_slice(&proof);
    nt_response.extend_from_slice(&blob);

    NtlmV2Response {
        nt_response,
        lm_response: [0u8; 24],
    }
}

/// NTLM Type 3 (Authenticate). Payload order: domain, user, workstation,
/// LM response, NT response, session key.
pub fn build_type3(
    username: &str,
    domain: &str,
    workstation: &str,
    v2: &NtlmV2Response,
) -> Vec<u8> {
    let domain_b = utf16le(domain);
    let user_b = utf16le(username);
    let ws_b = utf16le(workstation);
    let session_key = [0u8; 16];

    let header_len = 8 + 4 + 8 * 6 + 4;
    let domain_off = header_len;
    let user_off = domain_off + domain_b.len();
    let ws_off = user_off + user_b.len();
    let lm_off = ws_off + ws_b.len();
    let nt_off = lm_off + v2.lm_response.len();
    let key_off = nt_off + v2.nt_response.len();

    let mut w = ByteWriter::with_capacity(key_off + session_key.len());
    w.bytes(SIGNATURE);
    w.u32_le(3);
    put_sec_buf(&mut w, v2.lm_response.len(), lm_off);
    put_sec_buf(&mut w, v2.nt_response.len(), nt_off);
    put_sec_buf(&mut w, domain_b.len(), domain_off);
    put_sec_buf(&mut w, user_b.len(), user_off);
    put_sec_buf(&mut w, ws_b.len(), ws_off);
    put_sec_buf(&mut w, session_key.len(), key_off);
    w.u32_le(negotiate_flags().bits());
    w.bytes(&domain_b);
    w.bytes(&user_b);
    w.bytes(&ws_b);
    w.bytes(&v2.lm_response);
    w.bytes(&v2.nt_response);
    w.bytes(&session_key);
    w.into_bytes()
}
