// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt::Write;

use md5::{Digest, Md5};

use crate::error::{ProbeError, Result};

/// CHAP_R = MD5( one-octet CHAP_ID || secret || challenge ), rendered as
/// `0x` + lower-hex the way iSCSI targets expect it on the wire.
pub fn chap_response_hex(id: u8, secret: &[u8], challenge: &[u8]) -> String {
    let mut h = Md5::new();
    h.update([id]);
    h.update(secret);
    h.update(challenge);
    let d = h.finalize();

    let mut s = String::with_capacity(2 + d.len() * 2);
    s.push_str("0x");
    for b in d {
        write!(&mut s, "{b:02x}").expect("writing to String cannot fail");
    }
    s
}

/// Decode a `CHAP_C` value: optional `0x`/`0X` prefix, even-length hex.
pub fn decode_chap_challenge(s: &str) -> Result<Vec<u8>> {
    let s = s.trim();
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if s.len() % 2 != 0 {
        return Err(ProbeError::malformed(format!(
            "CHAP_C hex length must be even, got {}",
            s.len()
        )));
    }
    hex::decode(s).map_err(|e| ProbeError::malformed(format!("bad CHAP_C hex: {e}")))
}
