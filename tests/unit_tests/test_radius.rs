// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    crypto::hashes::{hmac_md5, md5_concat},
    error::ErrorKind,
    models::radius::{
        ATTR_MESSAGE_AUTHENTICATOR, ATTR_USER_NAME, ATTR_USER_PASSWORD,
        CODE_ACCESS_ACCEPT, CODE_ACCESS_REQUEST, RadiusPacket, build_access_request,
        build_accounting_request, encrypt_user_password, verify_response_authenticator,
    },
};

#[test]
fn access_request_attribute_set() {
    let pkt = build_access_request("nemo", "arctangent", b"xyzzy5461", 7, [0xAB; 16]);
    assert_eq!(pkt.code, CODE_ACCESS_REQUEST);
    assert_eq!(pkt.attr(ATTR_USER_NAME), Some(b"nemo".as_slice()));
    let password = pkt.attr(ATTR_USER_PASSWORD).expect("password attr");
    assert_eq!(password.len(), 16);
    // Obfuscation of the first block: MD5(secret || RA) XOR padded.
    let key = md5_concat([b"xyzzy5461".as_slice(), &[0xAB; 16]]);
    let mut padded = [0u8; 16];
    padded[..10].copy_from_slice(b"arctangent");
    let expected: Vec<u8> = padded.iter().zip(key.iter()).map(|(p, k)| p ^ k).collect();
    assert_eq!(password, expected.as_slice());
    assert_eq!(
        pkt.attr(ATTR_MESSAGE_AUTHENTICATOR).map(<[u8]>::len),
        Some(16)
    );
}

#[test]
fn message_authenticator_verifies_as_hmac() {
    let secret = b"top-secret";
    let pkt = build_access_request("u", "p", secret, 1, [1u8; 16]);
    let mac = pkt
        .attr(ATTR_MESSAGE_AUTHENTICATOR)
        .expect("attr")
        .to_vec();

    let mut zeroed = pkt.clone();
    for a in &mut zeroed.attributes {
        if a.attr_type == ATTR_MESSAGE_AUTHENTICATOR {
            a.value = vec![0u8; 16];
        }
    }
    assert_eq!(mac, hmac_md5(secret, &zeroed.encode()).to_vec());
}

#[test]
fn password_pads_empty_to_one_block() {
    let cipher = encrypt_user_password(b"", b"s", &[0u8; 16]);
    assert_eq!(cipher.len(), 16);
}

#[test]
fn accounting_authenticator_is_md5_of_packet_and_secret() {
    let secret = b"acct-secret";
    let pkt = build_accounting_request("nemo", "sess-1", 1, secret, 9);
    let mut zeroed = pkt.clone();
    zeroed.authenticator = [0u8; 16];
    let expected = md5_concat([zeroed.encode().as_slice(), secret.as_slice()]);
    assert_eq!(pkt.authenticator, expected);
}

#[test]
fn response_verification_rejects_bit_flips_anywhere() {
    let secret = b"radsec";
    let req_auth = [0x42; 16];
    let mut resp = RadiusPacket {
        code: CODE_ACCESS_ACCEPT,
        identifier: 77,
        authenticator: [0u8; 16],
        attributes: vec![],
    };
    let mut for_digest = resp.encode();
    for_digest[4..20].copy_from_slice(&req_auth);
    resp.authenticator = md5_concat([for_digest.as_slice(), secret.as_slice()]);
    let wire = resp.encode();

    verify_response_authenticator(&wire, &req_auth, secret).expect("valid");

    for byte in [0usize, 1, 4, 19, wire.len() - 1] {
        let mut tampered = wire.clone();
        tampered[byte] ^= 0x80;
        let err = verify_response_authenticator(&tampered, &req_auth, secret)
            .expect_err("tampered byte must fail");
        assert_eq!(err.kind, ErrorKind::AuthFailVerify);
    }
}

#[test]
fn decode_rejects_bad_length_field() {
    // Length field says 10, which is under the 20-byte minimum.
    let mut wire = vec![2u8, 1, 0, 10];
    wire.extend_from_slice(&[0u8; 16]);
    let err = RadiusPacket::decode(&wire).expect_err("length");
    assert_eq!(err.kind, ErrorKind::Malformed);
}

#[test]
fn attributes_survive_encode_decode() {
    let pkt = build_access_request("roundtrip", "pw", b"s", 3, [9u8; 16]);
    let back = RadiusPacket::decode(&pkt.encode()).expect("decode");
    assert_eq!(back, pkt);
}
