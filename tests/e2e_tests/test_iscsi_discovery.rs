// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    cfg::config::GatewayConfig,
    error::ErrorKind,
    models::iscsi::bhs::{
        HEADER_LEN, LoginResponse, OPCODE_LOGIN_RESP, OPCODE_TEXT_RESP, TextResponse,
        set_data_segment_length,
    },
    ops::iscsi::{self, IscsiLoginParams},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use zerocopy::IntoBytes;

use crate::e2e_tests::{listen, target};

/// Read one initiator PDU (BHS + padded data segment).
async fn read_pdu(s: &mut TcpStream) -> (Vec<u8>, Vec<u8>) {
    let mut bhs = vec![0u8; HEADER_LEN];
    s.read_exact(&mut bhs).await.expect("bhs");
    let dlen = u32::from_be_bytes([0, bhs[5], bhs[6], bhs[7]]) as usize;
    let mut data = vec![0u8; dlen.div_ceil(4) * 4];
    s.read_exact(&mut data).await.expect("data");
    data.truncate(dlen);
    (bhs, data)
}

fn login_response(status_class: u8, status_detail: u8, data: &[u8]) -> Vec<u8> {
    let mut resp = LoginResponse {
        opcode: OPCODE_LOGIN_RESP,
        flags: 0x87, // T=1, CSG=Operational, NSG=FullFeature
        status_class,
        status_detail,
        ..Default::default()
    };
    resp.tsih.set(1);
    resp.initiator_task_tag.set(1);
    resp.stat_sn.set(1);
    resp.exp_cmd_sn.set(2);
    resp.max_cmd_sn.set(10);
    set_data_segment_length(&mut resp.data_segment_length, data.len());

    let mut wire = resp.as_bytes().to_vec();
    wire.extend_from_slice(data);
    wire.resize(HEADER_LEN + data.len().div_ceil(4) * 4, 0);
    wire
}

fn text_response(itt: u32, data: &[u8]) -> Vec<u8> {
    let mut resp = TextResponse {
        opcode: OPCODE_TEXT_RESP,
        flags: 0x80,
        ..Default::default()
    };
    resp.initiator_task_tag.set(itt);
    resp.target_task_tag.set(0xFFFF_FFFF);
    resp.stat_sn.set(2);
    resp.exp_cmd_sn.set(3);
    resp.max_cmd_sn.set(10);
    set_data_segment_length(&mut resp.data_segment_length, data.len());

    let mut wire = resp.as_bytes().to_vec();
    wire.extend_from_slice(data);
    wire.resize(HEADER_LEN + data.len().div_ceil(4) * 4, 0);
    wire
}

/// Seed scenario: discovery login + SendTargets=All.
#[tokio::test]
async fn discovery_lists_targets() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");

        let (login_bhs, login_data) = read_pdu(&mut s).await;
        assert_eq!(login_bhs[0] & 0x3F, 0x03);
        let keys = String::from_utf8_lossy(&login_data).into_owned();
        assert!(keys.contains("SessionType=Discovery"));
        s.write_all(&login_response(0, 0, &[])).await.expect("login resp");

        let (text_bhs, text_data) = read_pdu(&mut s).await;
        assert_eq!(text_bhs[0] & 0x3F, 0x04);
        assert!(String::from_utf8_lossy(&text_data).contains("SendTargets=All"));
        let targets =
            b"TargetName=iqn.2024-01.com.ex:disk1\x00TargetAddress=192.168.1.10:3260,1\x00";
        let itt = u32::from_be_bytes([text_bhs[16], text_bhs[17], text_bhs[18], text_bhs[19]]);
        s.write_all(&text_response(itt, targets)).await.expect("text resp");
    });

    let cfg = GatewayConfig::default();
    let result = iscsi::discover(&cfg, &target(addr)).await.expect("discover");
    assert!(result.is_iscsi);
    assert_eq!(result.login_status, "Success — Login successful");
    assert_eq!(result.targets.len(), 1);
    assert_eq!(result.targets[0].name, "iqn.2024-01.com.ex:disk1");
    assert_eq!(result.targets[0].addresses, vec!["192.168.1.10:3260,1"]);
}

/// Login status class/detail propagate verbatim as a protocol error.
#[tokio::test]
async fn login_failure_carries_status() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        let _ = read_pdu(&mut s).await;
        // Class 2 (initiator error), detail 1 (authentication failure).
        s.write_all(&login_response(2, 1, &[])).await.expect("resp");
    });

    let cfg = GatewayConfig::default();
    let err = iscsi::discover(&cfg, &target(addr)).await.expect_err("must fail");
    assert_eq!(err.kind, ErrorKind::AuthFail);
    assert!(err.message.contains("Authentication failure"));
}

/// CHAP with any algorithm other than 5 is a protocol error.
#[tokio::test]
async fn chap_algorithm_other_than_md5_is_fatal() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");

        // Security-stage login: target picks CHAP.
        let _ = read_pdu(&mut s).await;
        let mut first = login_response(0, 0, b"AuthMethod=CHAP\x00");
        first[1] = 0x01; // no transit, still in Security
        s.write_all(&first).await.expect("resp1");

        // Initiator sends CHAP_A=5; target demands CHAP_A=6.
        let (_bhs, data) = read_pdu(&mut s).await;
        assert!(String::from_utf8_lossy(&data).contains("CHAP_A=5"));
        let mut second = login_response(0, 0, b"CHAP_A=6\x00CHAP_I=1\x00CHAP_C=0xAB\x00");
        second[1] = 0x01;
        s.write_all(&second).await.expect("resp2");
    });

    let cfg = GatewayConfig::default();
    let params = IscsiLoginParams {
        target_name: None,
        username: Some("user".to_string()),
        secret: Some("secret".to_string()),
    };
    let err = iscsi::login(&cfg, &target(addr), &params).await.expect_err("must fail");
    assert_eq!(err.kind, ErrorKind::ProtocolError);
    assert!(err.message.contains("CHAP_A=5"));
}
