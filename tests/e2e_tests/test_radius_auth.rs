// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    cfg::config::GatewayConfig,
    crypto::hashes::md5_concat,
    error::ErrorKind,
    models::radius::{
        ATTR_USER_NAME, CODE_ACCESS_ACCEPT, CODE_ACCESS_REQUEST, RadiusPacket,
    },
    ops::radius,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::e2e_tests::{listen, target};

async fn read_packet(s: &mut TcpStream) -> Vec<u8> {
    let mut head = [0u8; 4];
    s.read_exact(&mut head).await.expect("head");
    let total = u16::from_be_bytes([head[2], head[3]]) as usize;
    let mut rest = vec![0u8; total - 4];
    s.read_exact(&mut rest).await.expect("rest");
    let mut wire = head.to_vec();
    wire.append(&mut rest);
    wire
}

fn accept_for(request_wire: &[u8], secret: &[u8]) -> Vec<u8> {
    let request = RadiusPacket::decode(request_wire).expect("request");
    let mut response = RadiusPacket {
        code: CODE_ACCESS_ACCEPT,
        identifier: request.identifier,
        authenticator: [0u8; 16],
        attributes: vec![],
    };
    let mut for_digest = response.encode();
    for_digest[4..20].copy_from_slice(&request.authenticator);
    response.authenticator = md5_concat([for_digest.as_slice(), secret]);
    response.encode()
}

/// Seed scenario: Access-Request with the RADSEC secret, verified
/// Access-Accept echoing the identifier. (The stub speaks the identical
/// packet format over loopback TCP.)
#[tokio::test]
async fn access_accept_with_valid_authenticator() {
    let secret = b"radsec";
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        let wire = read_packet(&mut s).await;
        let request = RadiusPacket::decode(&wire).expect("decode");
        assert_eq!(request.code, CODE_ACCESS_REQUEST);
        assert_eq!(request.attr(ATTR_USER_NAME), Some(b"u".as_slice()));
        s.write_all(&accept_for(&wire, b"radsec")).await.expect("accept");
    });

    let cfg = GatewayConfig::default();
    let result = radius::auth(&cfg, &target(addr), "u", "p", secret)
        .await
        .expect("auth");
    assert_eq!(result.code, 2);
    assert_eq!(result.code_text, "Access-Accept");
    assert!(result.accepted);
}

/// Negative scenario: one flipped bit in the response authenticator.
#[tokio::test]
async fn tampered_authenticator_fails_verification() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        let wire = read_packet(&mut s).await;
        let mut reply = accept_for(&wire, b"radsec");
        reply[4] ^= 0x01;
        s.write_all(&reply).await.expect("reply");
    });

    let cfg = GatewayConfig::default();
    let err = radius::auth(&cfg, &target(addr), "u", "p", b"radsec")
        .await
        .expect_err("must fail");
    assert_eq!(err.kind, ErrorKind::AuthFailVerify);
}

/// Accounting round-trip with the MD5 request authenticator.
#[tokio::test]
async fn accounting_request_acknowledged() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        let wire = read_packet(&mut s).await;
        let request = RadiusPacket::decode(&wire).expect("decode");
        assert_eq!(request.code, 4);

        let mut response = RadiusPacket {
            code: 5,
            identifier: request.identifier,
            authenticator: [0u8; 16],
            attributes: vec![],
        };
        let mut for_digest = response.encode();
        for_digest[4..20].copy_from_slice(&request.authenticator);
        response.authenticator = md5_concat([for_digest.as_slice(), b"acct".as_slice()]);
        s.write_all(&response.encode()).await.expect("reply");
    });

    let cfg = GatewayConfig::default();
    let result = radius::acct(&cfg, &target(addr), "u", "sess-9", b"acct")
        .await
        .expect("acct");
    assert!(result.acknowledged);
    assert_eq!(result.code_text, "Accounting-Response");
}
