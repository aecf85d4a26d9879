// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    cfg::config::GatewayConfig,
    codec::buf::{ByteWriter, utf16le},
    crypto::{ntlm, spnego::wrap_neg_token_resp},
    error::ErrorKind,
    models::smb2::{
        header::{
            CMD_LOGOFF, CMD_NEGOTIATE, CMD_SESSION_SETUP, HEADER_LEN,
            STATUS_MORE_PROCESSING_REQUIRED, Smb2Header, assemble, netbios_wrap,
        },
        session_setup::SESSION_FLAG_IS_GUEST,
    },
    ops::smb::{self, SmbCredentials},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::e2e_tests::{listen, target};

async fn read_smb(s: &mut TcpStream) -> Vec<u8> {
    let mut nb = [0u8; 4];
    s.read_exact(&mut nb).await.expect("netbios");
    let len = u32::from_be_bytes([0, nb[1], nb[2], nb[3]]) as usize;
    let mut msg = vec![0u8; len];
    s.read_exact(&mut msg).await.expect("message");
    msg
}

fn command_of(msg: &[u8]) -> u16 {
    u16::from_le_bytes([msg[12], msg[13]])
}

fn negotiate_response(signing_required: bool) -> Vec<u8> {
    let mut body = ByteWriter::new();
    body.u16_le(65);
    body.u16_le(if signing_required { 0x0003 } else { 0x0001 });
    body.u16_le(0x0302);
    body.u16_le(0);
    body.bytes(&[9u8; 16]);
    body.u32_le(0x07);
    body.u32_le(1 << 20);
    body.u32_le(1 << 20);
    body.u32_le(1 << 20);
    body.u64_le(116_444_736_000_000_000);
    body.u64_le(0);
    body.u16_le(0);
    body.u16_le(0);
    body.u32_le(0);
    let hdr = Smb2Header::request(CMD_NEGOTIATE, 0, 0, 0);
    netbios_wrap(&assemble(&hdr, body.as_slice()))
}

fn type2_token() -> Vec<u8> {
    let target_name = utf16le("LAB");
    let mut t2 = ByteWriter::new();
    t2.bytes(b"NTLMSSP\0");
    t2.u32_le(2);
    let name_off = 48u32;
    t2.u16_le(target_name.len() as u16);
    t2.u16_le(target_name.len() as u16);
    t2.u32_le(name_off);
    t2.u32_le(ntlm::negotiate_flags().bits());
    t2.bytes(&[0x55; 8]);
    t2.bytes(&[0u8; 8]);
    t2.u16_le(0);
    t2.u16_le(0);
    t2.u32_le(name_off + target_name.len() as u32);
    t2.bytes(&target_name);
    t2.into_bytes()
}

fn session_setup_response(status: u32, flags: u16, blob: &[u8]) -> Vec<u8> {
    let mut body = ByteWriter::new();
    body.u16_le(9);
    body.u16_le(flags);
    if blob.is_empty() {
        body.u16_le(0);
        body.u16_le(0);
    } else {
        body.u16_le((HEADER_LEN + 8) as u16);
        body.u16_le(blob.len() as u16);
        body.bytes(blob);
    }
    let mut hdr = Smb2Header::request(CMD_SESSION_SETUP, 1, 0, 0x0011_2233);
    hdr.status.set(status);
    netbios_wrap(&assemble(&hdr, body.as_slice()))
}

fn logoff_response() -> Vec<u8> {
    let hdr = Smb2Header::request(CMD_LOGOFF, 3, 0, 0x0011_2233);
    netbios_wrap(&assemble(&hdr, &[4, 0, 0, 0]))
}

/// Seed scenario: guest authentication with empty credentials.
#[tokio::test]
async fn guest_session_reports_guest_flag() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");

        let m = read_smb(&mut s).await;
        assert_eq!(command_of(&m), CMD_NEGOTIATE);
        s.write_all(&negotiate_response(false)).await.expect("neg");

        let m = read_smb(&mut s).await;
        assert_eq!(command_of(&m), CMD_SESSION_SETUP);
        let blob = wrap_neg_token_resp(&type2_token());
        s.write_all(&session_setup_response(
            STATUS_MORE_PROCESSING_REQUIRED,
            0,
            &blob,
        ))
        .await
        .expect("challenge");

        let m = read_smb(&mut s).await;
        assert_eq!(command_of(&m), CMD_SESSION_SETUP);
        // The Type 3 leg carries an NTLMSSP authenticate token.
        assert!(m.windows(8).any(|w| w == b"NTLMSSP\0"));
        s.write_all(&session_setup_response(0, SESSION_FLAG_IS_GUEST, &[]))
            .await
            .expect("success");

        // Cleanup LOGOFF.
        let m = read_smb(&mut s).await;
        assert_eq!(command_of(&m), CMD_LOGOFF);
        s.write_all(&logoff_response()).await.expect("logoff");
    });

    let cfg = GatewayConfig::default();
    let creds = SmbCredentials {
        username: String::new(),
        password: String::new(),
        domain: String::new(),
    };
    let result = smb::session(&cfg, &target(addr), &creds, None)
        .await
        .expect("session");
    assert_eq!(result.session_flags, "GUEST");
    assert_eq!(result.dialect, "SMB 3.0.2");
    assert!(result.share_type.is_none());
}

/// Negative scenario: a signing-mandatory server is refused up front.
#[tokio::test]
async fn signing_required_server_is_auth_fail() {
    let (listener, addr) = listen().await;
    tokio::spawn(async move {
        let (mut s, _) = listener.accept().await.expect("accept");
        let _ = read_smb(&mut s).await;
        s.write_all(&negotiate_response(true)).await.expect("neg");
        // The client bails before authenticating; just absorb the close.
        let mut scratch = [0u8; 64];
        let _ = s.read(&mut scratch).await;
    });

    let cfg = GatewayConfig::default();
    let creds = SmbCredentials {
        username: "user".to_string(),
        password: "pw".to_string(),
        domain: String::new(),
    };
    let err = smb::session(&cfg, &target(addr), &creds, None)
        .await
        .expect_err("must refuse");
    assert_eq!(err.kind, ErrorKind::AuthFail);
    assert!(err.message.contains("signing"));
}
