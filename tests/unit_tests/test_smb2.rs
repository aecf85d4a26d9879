// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    codec::buf::ByteWriter,
    models::smb2::{
        create::{CreateParams, build_create, parse_create_response},
        header::{
            CMD_CREATE, CMD_NEGOTIATE, CMD_SESSION_SETUP,
            STATUS_MORE_PROCESSING_REQUIRED, Smb2Header, assemble, netbios_wrap,
            nt_status_text,
        },
        negotiate::{OFFERED_DIALECTS, build_negotiate},
        session_setup::{SESSION_FLAG_IS_GUEST, parse_session_setup_response},
        tree_connect::unc_path,
    },
    transport::framing::FrameReader,
};
use zerocopy::IntoBytes;

use crate::unit_tests::ChunkSource;

#[tokio::test]
async fn netbios_wrapped_message_reads_back() {
    let hdr = Smb2Header::request(CMD_NEGOTIATE, 0, 0, 0);
    let msg = assemble(&hdr, &build_negotiate(*b"OrtCallSMB2Clien"));
    let wire = netbios_wrap(&msg);

    // Split the wire across awkward chunk sizes.
    let chunks: Vec<Vec<u8>> = wire.chunks(7).map(<[u8]>::to_vec).collect();
    let mut src = ChunkSource::new(chunks);
    let mut fr = FrameReader::new(70_000);
    let got = fr.read_smb2_message(&mut src).await.expect("read");
    assert_eq!(&got[..], &msg[..]);

    let back = Smb2Header::parse(&got).expect("header");
    assert_eq!(back.command.get(), CMD_NEGOTIATE);
    assert_eq!(back.message_id.get(), 0);
}

#[test]
fn message_ids_increment_from_negotiate() {
    let h0 = Smb2Header::request(CMD_NEGOTIATE, 0, 0, 0);
    let h1 = Smb2Header::request(CMD_SESSION_SETUP, 1, 0, 0);
    assert_eq!(h0.message_id.get(), 0);
    assert_eq!(h1.message_id.get(), 1);
    assert_eq!(h0.signature, [0u8; 16]);
}

#[test]
fn offered_dialects_are_ordered() {
    assert_eq!(OFFERED_DIALECTS, [0x0202, 0x0210, 0x0300, 0x0302, 0x0311]);
}

#[test]
fn status_rendering() {
    assert_eq!(
        nt_status_text(STATUS_MORE_PROCESSING_REQUIRED),
        "STATUS_MORE_PROCESSING_REQUIRED"
    );
    assert_eq!(nt_status_text(0xC000_0999), "NT_STATUS_0xC0000999");
}

#[test]
fn session_setup_guest_flag_from_synthetic_response() {
    let mut body = ByteWriter::new();
    body.u16_le(9);
    body.u16_le(SESSION_FLAG_IS_GUEST);
    body.u16_le(0);
    body.u16_le(0);
    let hdr = Smb2Header::request(CMD_SESSION_SETUP, 2, 0, 0x11);
    let msg = assemble(&hdr, body.as_slice());
    let info = parse_session_setup_response(&msg).expect("parse");
    assert_eq!(info.flags_text(), "GUEST");
}

#[test]
fn create_response_round_trip() {
    // Synthetic CREATE response for a 1234-byte archive file.
    let mut body = ByteWriter::new();
    body.u16_le(89);
    body.u8(0);
    body.u8(0);
    body.u32_le(1); // opened
    body.u64_le(116_444_736_000_000_000);
    body.u64_le(116_444_736_000_000_000);
    body.u64_le(116_444_736_000_000_000);
    body.u64_le(116_444_736_000_000_000);
    body.u64_le(4096);
    body.u64_le(1234);
    body.u32_le(0x20);
    body.u32_le(0);
    body.bytes(&[7u8; 16]);
    body.u32_le(0);
    body.u32_le(0);

    let hdr = Smb2Header::request(CMD_CREATE, 4, 1, 1);
    let msg = assemble(&hdr, body.as_slice());
    let info = parse_create_response(&msg).expect("parse");
    assert_eq!(info.file_id, [7u8; 16]);
    assert_eq!(info.end_of_file, 1234);
    assert!(!info.is_directory());
    assert_eq!(info.created.as_deref(), Some("1970-01-01 00:00:00"));
}

#[test]
fn create_request_carries_spec_access_masks() {
    let read = build_create(&CreateParams::read_file("f"));
    assert_eq!(
        u32::from_le_bytes([read[24], read[25], read[26], read[27]]),
        0x0012_0089
    );
    let write = build_create(&CreateParams::write_file("f"));
    assert_eq!(
        u32::from_le_bytes([write[24], write[25], write[26], write[27]]),
        0x4012_0116
    );
    // Overwrite-if disposition for writes.
    assert_eq!(
        u32::from_le_bytes([write[36], write[37], write[38], write[39]]),
        5
    );
}

#[test]
fn unc_path_shape() {
    assert_eq!(unc_path("srv", "Public"), "\\\\srv\\Public");
}

#[test]
fn header_parse_rejects_short_input() {
    let err = Smb2Header::parse(&[0xFE, b'S']).expect_err("short");
    assert_eq!(err.kind, portofcall::error::ErrorKind::Malformed);
}
