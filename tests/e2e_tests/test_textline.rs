// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    cfg::config::GatewayConfig,
    ops::{epmd, pop3, smtp},
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::e2e_tests::{listen, target};

#[tokio::test]
async fn smtp_ehlo_capabilities() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        s.write_all(b"220 mail.lab ESMTP ready\r\n").await.expect("banner");

        let mut buf = vec![0u8; 256];
        let n = s.read(&mut buf).await.expect("ehlo");
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("EHLO "));

        s.write_all(
            b"250-mail.lab greets you\r\n250-PIPELINING\r\n250-STARTTLS\r\n250 SIZE 10240000\r\n",
        )
        .await
        .expect("ehlo reply");

        // QUIT from cleanup.
        let n = s.read(&mut buf).await.unwrap_or(0);
        if n > 0 {
            let _ = s.write_all(b"221 bye\r\n").await;
        }
    });

    let cfg = GatewayConfig::default();
    let result = smtp::probe(&cfg, &target(addr)).await.expect("probe");
    assert_eq!(result.banner_code, 220);
    assert_eq!(result.ehlo_code, 250);
    assert!(result.supports_starttls);
    assert_eq!(
        result.capabilities,
        vec!["PIPELINING", "STARTTLS", "SIZE 10240000"]
    );
}

#[tokio::test]
async fn pop3_capa_listing() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        s.write_all(b"+OK POP3 ready <123.456@lab>\r\n").await.expect("banner");

        let mut buf = vec![0u8; 64];
        let _ = s.read(&mut buf).await.expect("capa");
        s.write_all(b"+OK Capability list follows\r\nTOP\r\nUIDL\r\nSASL PLAIN\r\n.\r\n")
            .await
            .expect("capa reply");

        let n = s.read(&mut buf).await.unwrap_or(0);
        if n > 0 {
            let _ = s.write_all(b"+OK bye\r\n").await;
        }
    });

    let cfg = GatewayConfig::default();
    let result = pop3::probe(&cfg, &target(addr)).await.expect("probe");
    assert!(result.apop_supported);
    assert_eq!(result.capabilities, vec!["TOP", "UIDL", "SASL PLAIN"]);
}

#[tokio::test]
async fn epmd_names_until_close() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        let mut req = [0u8; 3];
        s.read_exact(&mut req).await.expect("req");
        assert_eq!(req, [0, 1, 110]);

        let mut reply = 4369u32.to_be_bytes().to_vec();
        reply.extend_from_slice(b"name rabbit at port 25672\nname couch at port 5984\n");
        s.write_all(&reply).await.expect("reply");
        // Close ends the NAMES response.
    });

    let cfg = GatewayConfig::default();
    let result = epmd::names(&cfg, &target(addr)).await.expect("names");
    assert_eq!(result.epmd_port, 4369);
    assert_eq!(result.nodes.len(), 2);
    assert_eq!(result.nodes[0].name, "rabbit");
    assert_eq!(result.nodes[0].port, 25672);
}

#[tokio::test]
async fn epmd_port_please_lookup() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        let mut head = [0u8; 2];
        s.read_exact(&mut head).await.expect("len");
        let mut name = vec![0u8; u16::from_be_bytes(head) as usize];
        s.read_exact(&mut name).await.expect("name");
        assert_eq!(name[0], 122);
        assert_eq!(&name[1..], b"rabbit");

        let mut reply = vec![119u8, 0];
        reply.extend_from_slice(&25672u16.to_be_bytes());
        reply.push(77); // node type
        reply.push(0); // protocol
        reply.extend_from_slice(&6u16.to_be_bytes());
        reply.extend_from_slice(&5u16.to_be_bytes());
        reply.extend_from_slice(&6u16.to_be_bytes());
        reply.extend_from_slice(b"rabbit");
        reply.extend_from_slice(&0u16.to_be_bytes());
        s.write_all(&reply).await.expect("reply");
    });

    let cfg = GatewayConfig::default();
    let result = epmd::port_please(&cfg, &target(addr), "rabbit")
        .await
        .expect("port");
    assert!(result.found);
    assert_eq!(result.port, Some(25672));
    assert_eq!(result.node_name.as_deref(), Some("rabbit"));
    assert_eq!(result.highest_version, Some(6));
}
