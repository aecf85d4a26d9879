// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! RADIUS packet codec (RFC 2865/2866) plus the shared-secret derivations:
//! User-Password obfuscation, Message-Authenticator, and request/response
//! authenticators. RADSEC reuses all of it verbatim over TLS with the fixed
//! secret `"radsec"`.

use rand::RngExt;

use crate::{
    codec::buf::{ByteReader, ByteWriter},
    crypto::hashes::{ct_eq, hmac_md5, md5_concat},
    error::{ProbeError, Result},
};

pub const CODE_ACCESS_REQUEST: u8 = 1;
pub const CODE_ACCESS_ACCEPT: u8 = 2;
pub const CODE_ACCESS_REJECT: u8 = 3;
pub const CODE_ACCOUNTING_REQUEST: u8 = 4;
pub const CODE_ACCOUNTING_RESPONSE: u8 = 5;
pub const CODE_ACCESS_CHALLENGE: u8 = 11;

pub const ATTR_USER_NAME: u8 = 1;
pub const ATTR_USER_PASSWORD: u8 = 2;
pub const ATTR_NAS_PORT: u8 = 5;
pub const ATTR_REPLY_MESSAGE: u8 = 18;
pub const ATTR_STATE: u8 = 24;
pub const ATTR_ACCT_STATUS_TYPE: u8 = 40;
pub const ATTR_ACCT_SESSION_ID: u8 = 44;
pub const ATTR_MESSAGE_AUTHENTICATOR: u8 = 80;

pub const RADSEC_SECRET: &[u8] = b"radsec";

pub fn code_text(code: u8) -> &'static str {
    match code {
        CODE_ACCESS_REQUEST => "Access-Request",
        CODE_ACCESS_ACCEPT => "Access-Accept",
        CODE_ACCESS_REJECT => "Access-Reject",
        CODE_ACCOUNTING_REQUEST => "Accounting-Request",
        CODE_ACCOUNTING_RESPONSE => "Accounting-Response",
        CODE_ACCESS_CHALLENGE => "Access-Challenge",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub attr_type: u8,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusPacket {
    pub code: u8,
    pub identifier: u8,
    pub authenticator: [u8; 16],
    pub attributes: Vec<Attribute>,
}

impl RadiusPacket {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = ByteWriter::with_capacity(64);
        w.u8(self.code);
        w.u8(self.identifier);
        w.u16_be(0); // patched below
        w.bytes(&self.authenticator);
        for a in &self.attributes {
            w.u8(a.attr_type);
            w.u8((a.value.len() + 2) as u8);
            w.bytes(&a.value);
        }
        let len = w.len() as u16;
        w.patch_u16_be(2, len);
        w.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes);
        let code = r.u8()?;
        let identifier = r.u8()?;
        let length = r.u16_be()? as usize;
        if length < 20 || length > bytes.len() {
            return Err(ProbeError::malformed(format!(
                "RADIUS length field {length} outside packet of {} bytes",
                bytes.len()
            )));
        }
        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(r.take(16)?);

        let mut attributes = Vec::new();
        while r.pos() < length {
            let attr_type = r.u8()?;
            let attr_len = r.u8()? as usize;
            if attr_len < 2 {
                return Err(ProbeError::malformed("RADIUS attribute length below 2"));
            }
            let value = r.take(attr_len - 2)?.to_vec();
            attributes.push(Attribute { attr_type, value });
        }

        Ok(Self {
            code,
            identifier,
            authenticator,
            attributes,
        })
    }

    pub fn attr(&self, attr_type: u8) -> Option<&[u8]> {
        self.attributes
            .iter()
            .find(|a| a.attr_type == attr_type)
            .map(|a| a.value.as_slice())
    }

    /// Reply-Message attributes joined, for human display.
    pub fn reply_messages(&self) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|a| a.attr_type == ATTR_REPLY_MESSAGE)
            .map(|a| String::from_utf8_lossy(&a.value).into_owned())
            .collect()
    }
}

/// Fresh random identifier + 16-byte request authenticator.
pub fn fresh_request_identity() -> (u8, [u8; 16]) {
    let mut rng = rand::rng();
    let id: u8 = rng.random();
    let mut auth = [0u8; 16];
    rng.fill(&mut auth);
    (id, auth)
}

/// RFC 2865 §5.2 User-Password obfuscation: pad to a 16-byte multiple, then
/// chain `c_i = p_i XOR MD5(secret || c_{i-1})` with the request
/// authenticator seeding the chain.
pub fn encrypt_user_password(
    password: &[u8],
    secret: &[u8],
    request_authenticator: &[u8; 16],
) -> Vec<u8> {
    let blocks = password.len().div_ceil(16).max(1);
    let mut padded = vec![0u8; blocks * 16];
    padded[..password.len()].copy_from_slice(password);

    let mut out = Vec::with_capacity(padded.len());
    let mut prev: Vec<u8> = request_authenticator.to_vec();
    for block in padded.chunks_exact(16) {
        let key = md5_concat([secret, prev.as_slice()]);
        let cipher: Vec<u8> = block.iter().zip(key.iter()).map(|(p, k)| p ^ k).collect();
        out.extend_from_slice(&cipher);
        prev = cipher;
    }
    out
}

/// Build an Access-Request with User-Name, User-Password, and a
/// Message-Authenticator computed over the packet with the attribute zeroed.
pub fn build_access_request(
    username: &str,
    password: &str,
    secret: &[u8],
    identifier: u8,
    request_authenticator: [u8; 16],
) -> RadiusPacket {
    let mut packet = RadiusPacket {
        code: CODE_ACCESS_REQUEST,
        identifier,
        authenticator: request_authenticator,
        attributes: vec![
            Attribute {
                attr_type: ATTR_USER_NAME,
                value: username.as_bytes().to_vec(),
            },
            Attribute {
                attr_type: ATTR_USER_PASSWORD,
                value: encrypt_user_password(
                    password.as_bytes(),
                    secret,
                    &request_authenticator,
                ),
            },
            Attribute {
                attr_type: ATTR_MESSAGE_AUTHENTICATOR,
                value: vec![0u8; 16],
            },
        ],
    };

    let wire = packet.encode();
    let mac = hmac_md5(secret, &wire);
    if let Some(a) = packet
        .attributes
        .iter_mut()
        .find(|a| a.attr_type == ATTR_MESSAGE_AUTHENTICATOR)
    {
        a.value = mac.to_vec();
    }
    packet
}

/// Accounting-Request: the authenticator is `MD5(packet-with-zero-auth ||
/// secret)` instead of random bytes.
pub fn build_accounting_request(
    username: &str,
    session_id: &str,
    status_type: u32,
    secret: &[u8],
    identifier: u8,
) -> RadiusPacket {
    let mut packet = RadiusPacket {
        code: CODE_ACCOUNTING_REQUEST,
        identifier,
        authenticator: [0u8; 16],
        attributes: vec![
            Attribute {
                attr_type: ATTR_USER_NAME,
                value: username.as_bytes().to_vec(),
            },
            Attribute {
                attr_type: ATTR_ACCT_STATUS_TYPE,
                value: status_type.to_be_bytes().to_vec(),
            },
            Attribute {
                attr_type: ATTR_ACCT_SESSION_ID,
                value: session_id.as_bytes().to_vec(),
            },
        ],
    };
    let wire = packet.encode();
    packet.authenticator = md5_concat([wire.as_slice(), secret]);
    packet
}

/// Verify a Response-Authenticator: replace it with the request's, append
/// the secret, MD5, constant-time compare with the received value.
pub fn verify_response_authenticator(
    response_wire: &[u8],
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> Result<()> {
    if response_wire.len() < 20 {
        return Err(ProbeError::malformed("RADIUS response shorter than header"));
    }
    let received = &response_wire[4..20];
    let expected = md5_concat([
        &response_wire[..4],
        request_authenticator.as_slice(),
        &response_wire[20..],
        secret,
    ]);
    if !ct_eq(received, &expected) {
        return Err(ProbeError::auth_verify(
            "RADIUS response authenticator mismatch",
        ));
    }
    Ok(())
}
