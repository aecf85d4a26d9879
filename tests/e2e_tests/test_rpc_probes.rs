// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    cfg::config::GatewayConfig,
    models::{
        ignite::java_string_hash_code,
        thrift::{MSG_EXCEPTION, StructWriter, build_message, frame},
    },
    ops::{ignite, thrift},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::e2e_tests::{listen, target};

async fn read_be_frame(s: &mut TcpStream) -> Vec<u8> {
    let mut len = [0u8; 4];
    s.read_exact(&mut len).await.expect("len");
    let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
    s.read_exact(&mut payload).await.expect("payload");
    payload
}

/// Negative-turned-positive scenario: a Thrift EXCEPTION reply is a valid
/// probe result, not a transport error.
#[tokio::test]
async fn thrift_exception_is_a_successful_result() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        let call = read_be_frame(&mut s).await;
        assert_eq!(&call[4..8], &[0, 0, 0, 4]); // method name length "ping"
        assert_eq!(&call[8..12], b"ping");

        let mut body = StructWriter::new();
        body.string_field(1, "Invalid method name: 'ping'").i32_field(2, 1);
        let reply = build_message("ping", MSG_EXCEPTION, 1, &body.finish());
        s.write_all(&frame(&reply)).await.expect("reply");
    });

    let cfg = GatewayConfig::default();
    let result = thrift::probe(&cfg, &target(addr)).await.expect("probe");
    assert!(result.speaks_thrift);
    assert!(result.is_exception);
    assert_eq!(result.msg_type, "EXCEPTION");
}

#[tokio::test]
async fn ignite_probe_handshake_and_cache_size() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");

        // Handshake: 11-byte request, LE-framed success + node UUID.
        let mut hs = [0u8; 11];
        s.read_exact(&mut hs).await.expect("handshake");
        assert_eq!(&hs[..4], &7u32.to_le_bytes());
        assert_eq!(hs[4], 1);
        let mut resp = Vec::new();
        resp.extend_from_slice(&17u32.to_le_bytes());
        resp.push(1);
        resp.extend_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
        resp.extend_from_slice(&0x99AA_BBCC_DDEE_FF00u64.to_le_bytes());
        s.write_all(&resp).await.expect("hs resp");

        // OP_CACHE_GET_SIZE with the Java hash of the cache name.
        let mut len = [0u8; 4];
        s.read_exact(&mut len).await.expect("op len");
        let mut op = vec![0u8; u32::from_le_bytes(len) as usize];
        s.read_exact(&mut op).await.expect("op");
        assert_eq!(u16::from_le_bytes([op[0], op[1]]), 1020);
        let cache_id = i32::from_le_bytes([op[10], op[11], op[12], op[13]]);
        assert_eq!(cache_id, java_string_hash_code("trades"));
        let request_id = &op[2..10];

        let mut reply = Vec::new();
        reply.extend_from_slice(&20u32.to_le_bytes());
        reply.extend_from_slice(request_id);
        reply.extend_from_slice(&0u32.to_le_bytes());
        reply.extend_from_slice(&314u64.to_le_bytes());
        s.write_all(&reply).await.expect("reply");
    });

    let cfg = GatewayConfig::default();
    let result = ignite::cache_size(&cfg, &target(addr), "trades")
        .await
        .expect("cache size");
    assert_eq!(result.cache_id, java_string_hash_code("trades"));
    assert_eq!(result.size, 314);
}
