// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    cfg::config::GatewayConfig,
    codec::buf::ByteWriter,
    models::pcep::{
        CLASS_ERO, CLASS_METRIC, CLASS_RP, MSG_KEEPALIVE, MSG_OPEN, MSG_PCREP,
        MSG_PCREQ, METRIC_IGP, build_keepalive_message, build_open_message,
    },
    ops::pcep,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::e2e_tests::{listen, target};

async fn read_message(s: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut hdr = [0u8; 4];
    s.read_exact(&mut hdr).await.expect("header");
    let len = u16::from_be_bytes([hdr[2], hdr[3]]) as usize;
    let mut rest = vec![0u8; len - 4];
    s.read_exact(&mut rest).await.expect("body");
    let mut whole = hdr.to_vec();
    whole.append(&mut rest);
    (hdr[1], whole)
}

fn pcrep_with_path() -> Vec<u8> {
    let mut objects = ByteWriter::new();
    objects.u8(CLASS_RP);
    objects.u8(1 << 4);
    objects.u16_be(12);
    objects.u32_be(0);
    objects.u32_be(1);

    let mut ero = ByteWriter::new();
    for addr in [[10u8, 0, 1, 1], [10, 1, 0, 1], [10, 0, 2, 1]] {
        ero.u8(0x01);
        ero.u8(8);
        ero.bytes(&addr);
        ero.u8(32);
        ero.u8(0);
    }
    objects.u8(CLASS_ERO);
    objects.u8(1 << 4);
    objects.u16_be((4 + ero.len()) as u16);
    objects.bytes(ero.as_slice());

    objects.u8(CLASS_METRIC);
    objects.u8(1 << 4);
    objects.u16_be(12);
    objects.u16_be(0);
    objects.u8(0);
    objects.u8(METRIC_IGP);
    objects.f32_be(100.0);

    let mut msg = ByteWriter::new();
    msg.u8(0x20);
    msg.u8(MSG_PCREP);
    msg.u16_be((4 + objects.len()) as u16);
    msg.bytes(objects.as_slice());
    msg.into_bytes()
}

/// Seed scenario: OPEN/KEEPALIVE bring-up, PCReq, PCRep with a 3-hop ERO
/// and an IGP metric.
#[tokio::test]
async fn compute_returns_hops_and_cost() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");

        let (msg_type, _) = read_message(&mut s).await;
        assert_eq!(msg_type, MSG_OPEN);
        s.write_all(&build_open_message(30, 120, 7)).await.expect("open");

        let (msg_type, _) = read_message(&mut s).await;
        assert_eq!(msg_type, MSG_KEEPALIVE);
        s.write_all(&build_keepalive_message()).await.expect("ka");

        let (msg_type, pcreq) = read_message(&mut s).await;
        assert_eq!(msg_type, MSG_PCREQ);
        // END-POINTS src/dst ride in the request.
        assert!(pcreq.windows(4).any(|w| w == [10, 0, 1, 1]));
        assert!(pcreq.windows(4).any(|w| w == [10, 0, 2, 1]));
        s.write_all(&pcrep_with_path()).await.expect("pcrep");

        // CLOSE from cleanup, then EOF.
        let mut scratch = [0u8; 64];
        let _ = s.read(&mut scratch).await;
    });

    let cfg = GatewayConfig::default();
    let result = pcep::compute(&cfg, &target(addr), "10.0.1.1", "10.0.2.1", None)
        .await
        .expect("compute");
    assert!(result.path_found);
    assert_eq!(result.hops, vec!["10.0.1.1", "10.1.0.1", "10.0.2.1"]);
    assert_eq!(result.loose_hops, vec![false, false, false]);
    assert_eq!(result.igp_cost, Some(100.0));
    assert!(result.te_cost.is_none());
    assert!(result.no_path_nature.is_none());
}

#[tokio::test]
async fn probe_reports_peer_open_parameters() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        let _ = read_message(&mut s).await;
        s.write_all(&build_open_message(45, 180, 9)).await.expect("open");
        let _ = read_message(&mut s).await;
        s.write_all(&build_keepalive_message()).await.expect("ka");
        let mut scratch = [0u8; 64];
        let _ = s.read(&mut scratch).await;
    });

    let cfg = GatewayConfig::default();
    let result = pcep::probe(&cfg, &target(addr)).await.expect("probe");
    assert!(result.session_established);
    assert_eq!(result.peer_keepalive, 45);
    assert_eq!(result.peer_deadtimer, 180);
    assert_eq!(result.peer_session_id, 9);
}
