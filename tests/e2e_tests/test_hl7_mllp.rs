// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    api::{self, adaptor::ApiRequest, gate::NoGate},
    cfg::config::GatewayConfig,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::e2e_tests::listen;

/// Seed scenario: ADT^A01 over MLLP, peer ACKs with AA.
#[tokio::test]
async fn hl7_send_receives_ack() {
    let (listener, addr) = listen().await;
    let peer = tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        // Drain the inbound message up to the MLLP trailer.
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            s.read_exact(&mut byte).await.expect("read");
            buf.push(byte[0]);
            if buf.ends_with(&[0x1C, 0x0D]) {
                break;
            }
        }
        let inbound = String::from_utf8_lossy(&buf).into_owned();

        let mut reply = vec![0x0B];
        reply.extend_from_slice(
            b"MSH|^~\\&|X|Y||||||ACK|ACK001|P|2.5\rMSA|AA|MSG1|Message accepted",
        );
        reply.extend_from_slice(&[0x1C, 0x0D]);
        s.write_all(&reply).await.expect("write");
        inbound
    });

    let cfg = GatewayConfig::default();
    let req = ApiRequest::post(json!({
        "host": addr.ip().to_string(),
        "port": addr.port(),
        "messageType": "ADT^A01",
    }));
    let resp = api::dispatch(&cfg, &NoGate, "hl7/send", req)
        .await
        .expect("route");

    assert_eq!(resp.status, 200, "body: {}", resp.body);
    assert_eq!(resp.body["success"], true);
    assert_eq!(resp.body["sent"]["messageType"], "ADT");
    assert_eq!(resp.body["sent"]["triggerEvent"], "A01");
    assert_eq!(resp.body["response"]["ackCode"], "AA");
    assert_eq!(resp.body["response"]["ackText"], "Message accepted");
    assert!(resp.body["warning"].is_null());

    let inbound = peer.await.expect("peer");
    assert!(inbound.starts_with("\x0BMSH|^~\\&|"));
    assert!(inbound.contains("|ADT^A01|"));
}

/// The documented quirk: unknown message types fall through to ADT^A01,
/// with a warning surfaced alongside.
#[tokio::test]
async fn hl7_unknown_type_falls_through_with_warning() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        let mut buf = vec![0u8; 4096];
        let _ = s.read(&mut buf).await.expect("read");
        let mut reply = vec![0x0B];
        reply.extend_from_slice(b"MSH|^~\\&|X|Y||||||ACK|1|P|2.5\rMSA|AA|MSG2|ok");
        reply.extend_from_slice(&[0x1C, 0x0D]);
        s.write_all(&reply).await.expect("write");
    });

    let cfg = GatewayConfig::default();
    let req = ApiRequest::post(json!({
        "host": addr.ip().to_string(),
        "port": addr.port(),
        "messageType": "ADT^A08",
    }));
    let resp = api::dispatch(&cfg, &NoGate, "hl7/send", req)
        .await
        .expect("route");

    assert_eq!(resp.body["success"], true);
    assert_eq!(resp.body["sent"]["messageType"], "ADT");
    assert_eq!(resp.body["sent"]["triggerEvent"], "A01");
    let warning = resp.body["warning"].as_str().expect("warning");
    assert!(warning.contains("ADT^A08"));
}
