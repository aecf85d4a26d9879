// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! HTTP Digest authentication (RFC 2617): challenge parsing and response
//! computation for MD5 and MD5-sess, `qop=auth` or legacy.

use rand::RngExt;

use crate::{
    crypto::hashes::md5_hex,
    error::{ProbeError, Result},
};

/// A parsed `WWW-Authenticate` / `Proxy-Authenticate` Digest challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub algorithm: Algorithm,
    /// Set when the server offered `auth`; `auth-int` is ignored.
    pub qop_auth: bool,
    pub opaque: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Md5,
    Md5Sess,
}

impl DigestChallenge {
    /// Parse the value of a `*-Authenticate` header. Expects the `Digest`
    /// scheme; anything else is `UNEXPECTED_MSG` so callers can fall back.
    pub fn parse(header_value: &str) -> Result<Self> {
        let rest = header_value
            .trim()
            .strip_prefix("Digest")
            .ok_or_else(|| ProbeError::unexpected("challenge is not Digest"))?;

        let mut realm = None;
        let mut nonce = None;
        let mut algorithm = Algorithm::Md5;
        let mut qop_auth = false;
        let mut opaque = None;

        for (k, v) in split_auth_params(rest) {
            match k.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(v),
                "nonce" => nonce = Some(v),
                "opaque" => opaque = Some(v),
                "algorithm" => {
                    algorithm = match v.to_ascii_uppercase().as_str() {
                        "MD5" => Algorithm::Md5,
                        "MD5-SESS" => Algorithm::Md5Sess,
                        other => {
                            return Err(ProbeError::malformed(format!(
                                "unsupported digest algorithm {other}"
                            )));
                        },
                    }
                },
                "qop" => {
                    qop_auth = v
                        .split(',')
                        .map(str::trim)
                        .any(|q| q.eq_ignore_ascii_case("auth"));
                },
                _ => {},
            }
        }

        Ok(Self {
            realm: realm.ok_or_else(|| ProbeError::malformed("digest: missing realm"))?,
            nonce: nonce.ok_or_else(|| ProbeError::malformed("digest: missing nonce"))?,
            algorithm,
            qop_auth,
            opaque,
        })
    }
}

/// Split `key="quoted", key2=token, …` into pairs, unquoting values.
fn split_auth_params(s: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = s.trim();
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_string();
        rest = &rest[eq + 1..];
        let value;
        if let Some(tail) = rest.strip_prefix('"') {
            let end = tail.find('"').unwrap_or(tail.len());
            value = tail[..end].to_string();
            rest = tail.get(end + 1..).unwrap_or("");
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            value = rest[..end].trim().to_string();
            rest = rest.get(end..).unwrap_or("");
        }
        rest = rest.trim_start_matches(',').trim_start();
        if !key.is_empty() {
            out.push((key, value));
        }
    }
    out
}

/// 8-char random alphanumeric client nonce.
pub fn generate_cnonce() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::rng();
    (0..8)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// The computed credentials to place in `Authorization` /
/// `Proxy-Authorization`.
#[derive(Debug, Clone)]
pub struct DigestCredentials {
    pub response: String,
    pub cnonce: Option<String>,
    pub nc: Option<String>,
    pub qop: Option<String>,
}

/// RFC 2617 response computation. `nc` is fixed at `00000001` since every
/// probe uses a fresh connection.
pub fn compute_response(
    ch: &DigestChallenge,
    username: &str,
    password: &str,
    method: &str,
    uri: &str,
    cnonce: &str,
) -> DigestCredentials {
    let ha1_base = md5_hex(format!("{username}:{}:{password}", ch.realm).as_bytes());
    let ha1 = match ch.algorithm {
        Algorithm::Md5 => ha1_base,
        Algorithm::Md5Sess => {
            md5_hex(format!("{ha1_base}:{}:{cnonce}", ch.nonce).as_bytes())
        },
    };
    let ha2 = md5_hex(format!("{method}:{uri}").as_bytes());

    if ch.qop_auth {
        let nc = "00000001";
        let response = md5_hex(
            format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", ch.nonce).as_bytes(),
        );
        DigestCredentials {
            response,
            cnonce: Some(cnonce.to_string()),
            nc: Some(nc.to_string()),
            qop: Some("auth".to_string()),
        }
    } else {
        let response = md5_hex(format!("{ha1}:{}:{ha2}", ch.nonce).as_bytes());
        DigestCredentials {
            response,
            cnonce: None,
            nc: None,
            qop: None,
        }
    }
}

/// Render the full `Authorization` header value for the retransmission.
pub fn authorization_value(
    ch: &DigestChallenge,
    creds: &DigestCredentials,
    username: &str,
    uri: &str,
) -> String {
    let mut out = format!(
        "Digest username=\"{username}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", \
         response=\"{}\", algorithm={}",
        ch.realm,
        ch.nonce,
        creds.response,
        match ch.algorithm {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-sess",
        }
    );
    if let (Some(qop), Some(nc), Some(cnonce)) = (&creds.qop, &creds.nc, &creds.cnonce) {
        out.push_str(&format!(", qop={qop}, nc={nc}, cnonce=\"{cnonce}\""));
    }
    if let Some(opaque) = &ch.opaque {
        out.push_str(&format!(", opaque=\"{opaque}\""));
    }
    out
}
