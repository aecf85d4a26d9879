// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Minimal SPNEGO (RFC 4178) wrapping for NTLMSSP tokens in SMB2
//! SESSION_SETUP. Only the three shapes the handshake needs: a
//! `NegTokenInit` carrying Type 1, a server `NegTokenResp` carrying Type 2,
//! and a client `NegTokenResp` carrying Type 3.

use crate::error::{ProbeError, Result};

/// OID 1.3.6.1.5.5.2 (SPNEGO), pre-encoded.
const SPNEGO_OID: &[u8] = &[0x06, 0x06, 0x2b, 0x06, 0x01, 0x05, 0x05, 0x02];
/// OID 1.3.6.1.4.1.311.2.2.10 (NTLMSSP), pre-encoded.
const NTLMSSP_OID: &[u8] = &[
    0x06, 0x0a, 0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x02, 0x02, 0x0a,
];

/// DER TLV with the given tag around `content`.
fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.push(0x81);
        out.push(len as u8);
    } else {
        out.push(0x82);
        out.push((len >> 8) as u8);
        out.push(len as u8);
    }
    out.extend_from_slice(content);
    out
}

/// GSS-API `NegTokenInit` carrying an NTLM Type 1 token:
/// `0x60 { SPNEGO-OID, [0] { SEQ { mechTypes [0], mechToken [2] } } }`.
pub fn wrap_neg_token_init(ntlm_token: &[u8]) -> Vec<u8> {
    let mech_types = der(0xa0, &der(0x30, NTLMSSP_OID));
    let mech_token = der(0xa2, &der(0x04, ntlm_token));

    let mut inner = Vec::with_capacity(mech_types.len() + mech_token.len());
    inner.extend_from_slice(&mech_types);
    inner.extend_from_slice(&mech_token);

    let neg_token_init = der(0xa0, &der(0x30, &inner));

    let mut gss = Vec::with_capacity(SPNEGO_OID.len() + neg_token_init.len());
    gss.extend_from_slice(SPNEGO_OID);
    gss.extend_from_slice(&neg_token_init);
    der(0x60, &gss)
}

/// Client `NegTokenResp` carrying an NTLM Type 3 token:
/// `[1] { SEQ { responseToken [2] OCTET STRING } }`.
pub fn wrap_neg_token_resp(ntlm_token: &[u8]) -> Vec<u8> {
    let response_token = der(0xa2, &der(0x04, ntlm_token));
    der(0xa1, &der(0x30, &response_token))
}

/// Read one DER TLV, returning `(tag, content, rest)`.
fn read_tlv(input: &[u8]) -> Result<(u8, &[u8], &[u8])> {
    if input.len() < 2 {
        return Err(ProbeError::malformed("SPNEGO: truncated DER"));
    }
    let tag = input[0];
    let (len, hdr) = match input[1] {
        n if n < 0x80 => (n as usize, 2),
        0x81 => {
            if input.len() < 3 {
                return Err(ProbeError::malformed("SPNEGO: truncated DER length"));
            }
            (input[2] as usize, 3)
        },
        0x82 => {
            if input.len() < 4 {
                return Err(ProbeError::malformed("SPNEGO: truncated DER length"));
            }
            (((input[2] as usize) << 8) | input[3] as usize, 4)
        },
        _ => return Err(ProbeError::malformed("SPNEGO: unsupported DER length form")),
    };
    if input.len() < hdr + len {
        return Err(ProbeError::malformed("SPNEGO: DER content past end"));
    }
    Ok((tag, &input[hdr..hdr + len], &input[hdr + len..]))
}

/// Extract the NTLMSSP response token out of a server `NegTokenResp`.
/// Falls back to scanning for the NTLMSSP signature when the DER walk finds
/// no `[2]` element (some servers emit slightly off-spec wrapping).
pub fn unwrap_response_token(security_buffer: &[u8]) -> Result<Vec<u8>> {
    if let Ok(token) = walk_neg_token_resp(security_buffer) {
        return Ok(token);
    }
    if let Some(pos) = security_buffer
        .windows(8)
        .position(|w| w == b"NTLMSSP\0")
    {
        return Ok(security_buffer[pos..].to_vec());
    }
    Err(ProbeError::malformed(
        "SPNEGO: no NTLMSSP token in security buffer",
    ))
}

fn walk_neg_token_resp(input: &[u8]) -> Result<Vec<u8>> {
    let (tag, content, _) = read_tlv(input)?;
    if tag != 0xa1 {
        return Err(ProbeError::malformed("SPNEGO: expected NegTokenResp [1]"));
    }
    let (seq_tag, seq, _) = read_tlv(content)?;
    if seq_tag != 0x30 {
        return Err(ProbeError::malformed("SPNEGO: expected SEQUENCE"));
    }
    let mut rest = seq;
    while !rest.is_empty() {
        let (tag, content, tail) = read_tlv(rest)?;
        if tag == 0xa2 {
            let (os_tag, token, _) = read_tlv(content)?;
            if os_tag != 0x04 {
                return Err(ProbeError::malformed(
                    "SPNEGO: responseToken is not an OCTET STRING",
                ));
            }
            return Ok(token.to_vec());
        }
        rest = tail;
    }
    Err(ProbeError::malformed("SPNEGO: missing responseToken"))
}
