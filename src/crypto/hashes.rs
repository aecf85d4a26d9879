// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Fixed hash primitives shared by the auth helpers. Thin wrappers around
//! the RustCrypto digests so call sites stay one-liners.

use hmac::{Hmac, Mac};
use md4::Md4;
use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;

pub fn md4(data: &[u8]) -> [u8; 16] {
    let mut h = Md4::new();
    md4::Digest::update(&mut h, data);
    md4::Digest::finalize(h).into()
}

pub fn md5(data: &[u8]) -> [u8; 16] {
    let mut h = Md5::new();
    h.update(data);
    h.finalize().into()
}

/// MD5 over a sequence of segments without an intermediate copy.
pub fn md5_concat<'a, I>(parts: I) -> [u8; 16]
where I: IntoIterator<Item = &'a [u8]> {
    let mut h = Md5::new();
    for p in parts {
        h.update(p);
    }
    h.finalize().into()
}

pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(md5(data))
}

pub fn hmac_md5(key: &[u8], data: &[u8]) -> [u8; 16] {
    // HMAC accepts any key length.
    let mut mac = <Hmac<Md5> as Mac>::new_from_slice(key)
        .expect("HMAC-MD5 accepts keys of any length");
    mac.update(data);
    let out = mac.finalize().into_bytes();
    out.into()
}

pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut h = Sha1::new();
    sha1::Digest::update(&mut h, data);
    sha1::Digest::finalize(h).into()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    sha2::Digest::update(&mut h, data);
    sha2::Digest::finalize(h).into()
}

/// Constant-time equality for peer-supplied authenticators and digests.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}
