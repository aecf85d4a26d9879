// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{error::ErrorKind, transport::framing::FrameReader};

use crate::unit_tests::ChunkSource;

#[tokio::test]
async fn exact_n_keeps_leftover_bytes() {
    let mut src = ChunkSource::whole(b"abcdefgh".to_vec());
    let mut fr = FrameReader::new(1024);
    let first = fr.read_exact_n(&mut src, 3).await.expect("first");
    assert_eq!(&first[..], b"abc");
    // Framing tightness: exactly the unread bytes remain.
    assert_eq!(fr.leftover(), b"defgh");
    let second = fr.read_exact_n(&mut src, 5).await.expect("second");
    assert_eq!(&second[..], b"defgh");
    assert!(fr.leftover().is_empty());
}

#[tokio::test]
async fn until_spans_chunk_boundaries() {
    // Delimiter split across reads.
    let mut src = ChunkSource::new([b"hello\r".to_vec(), b"\nworld".to_vec()]);
    let mut fr = FrameReader::new(1024);
    let line = fr.read_until(&mut src, b"\r\n").await.expect("line");
    assert_eq!(&line[..], b"hello\r\n");
    assert_eq!(fr.leftover(), b"world");
}

#[tokio::test]
async fn until_eof_returns_everything_unframed() {
    let mut src = ChunkSource::whole(b"no terminator here".to_vec());
    let mut fr = FrameReader::new(1024);
    let (bytes, found) = fr
        .read_until_or_eof(&mut src, &[0x1C])
        .await
        .expect("read");
    assert!(!found);
    assert_eq!(&bytes[..], b"no terminator here");
}

#[tokio::test]
async fn short_read_is_typed() {
    let mut src = ChunkSource::whole(b"abc".to_vec());
    let mut fr = FrameReader::new(1024);
    let err = fr.read_exact_n(&mut src, 10).await.expect_err("short");
    assert_eq!(err.kind, ErrorKind::ShortRead);
}

#[tokio::test]
async fn cap_breach_is_limit_exceeded() {
    let mut src = ChunkSource::whole(vec![0u8; 64]);
    let mut fr = FrameReader::new(16);
    let err = fr.read_exact_n(&mut src, 32).await.expect_err("cap");
    assert_eq!(err.kind, ErrorKind::LimitExceeded);
}

#[tokio::test]
async fn announced_length_over_cap_is_limit_exceeded() {
    // u32 BE frame announcing 1 MiB against a 1 KiB cap.
    let mut wire = 1_048_576u32.to_be_bytes().to_vec();
    wire.extend_from_slice(&[0u8; 8]);
    let mut src = ChunkSource::whole(wire);
    let mut fr = FrameReader::new(1024);
    let err = fr.read_u32_be_frame(&mut src).await.expect_err("cap");
    assert_eq!(err.kind, ErrorKind::LimitExceeded);
}

#[tokio::test]
async fn length_prefixed_frames() {
    let mut wire = Vec::new();
    wire.extend_from_slice(&3u16.to_be_bytes());
    wire.extend_from_slice(b"abc");
    wire.extend_from_slice(&2u32.to_le_bytes());
    wire.extend_from_slice(b"xy");
    let mut src = ChunkSource::whole(wire);
    let mut fr = FrameReader::new(1024);
    assert_eq!(&fr.read_u16_be_frame(&mut src).await.expect("be")[..], b"abc");
    assert_eq!(&fr.read_u32_le_frame(&mut src).await.expect("le")[..], b"xy");
}

#[tokio::test]
async fn smb2_message_magic_checked() {
    let mut good = vec![0x00, 0x00, 0x00, 0x05];
    good.extend_from_slice(&[0xFE, b'S', b'M', b'B', 0x00]);
    let mut src = ChunkSource::whole(good);
    let mut fr = FrameReader::new(1024);
    let msg = fr.read_smb2_message(&mut src).await.expect("read");
    assert_eq!(msg.len(), 5);

    let mut bad = vec![0x00, 0x00, 0x00, 0x04];
    bad.extend_from_slice(b"SMB1");
    let mut src = ChunkSource::whole(bad);
    let mut fr = FrameReader::new(1024);
    let err = fr.read_smb2_message(&mut src).await.expect_err("magic");
    assert_eq!(err.kind, ErrorKind::Malformed);
}

#[tokio::test]
async fn netbios_type_byte_must_be_zero() {
    let mut src = ChunkSource::whole(vec![0x85, 0, 0, 0]);
    let mut fr = FrameReader::new(1024);
    let err = fr.read_smb2_message(&mut src).await.expect_err("type");
    assert_eq!(err.kind, ErrorKind::Malformed);
}

#[tokio::test]
async fn http_content_length_body() {
    let wire = b"HTTP/1.1 200 OK\r\nServer: t\r\nContent-Length: 5\r\n\r\nhelloEXTRA".to_vec();
    let mut src = ChunkSource::whole(wire);
    let mut fr = FrameReader::new(1024);
    let resp = fr.read_http_response(&mut src).await.expect("resp");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.reason, "OK");
    assert_eq!(&resp.body[..], b"hello");
    assert!(resp.body_complete);
    assert_eq!(resp.header("server"), Some("t"));
    // Pipelined leftovers stay buffered.
    assert_eq!(fr.leftover(), b"EXTRA");
}

fn encode_chunked(data: &[u8], sizes: &[usize]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pos = 0;
    for &s in sizes {
        let chunk = &data[pos..(pos + s).min(data.len())];
        if chunk.is_empty() {
            break;
        }
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
        pos += chunk.len();
    }
    if pos < data.len() {
        let chunk = &data[pos..];
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

#[tokio::test]
async fn chunked_decoding_round_trips() {
    let payload = b"The quick brown fox jumps over the lazy dog".to_vec();
    for sizes in [vec![7, 9, 100], vec![1, 1, 1, 100], vec![43]] {
        let mut wire =
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        wire.extend_from_slice(&encode_chunked(&payload, &sizes));
        let mut src = ChunkSource::whole(wire);
        let mut fr = FrameReader::new(4096);
        let resp = fr.read_http_response(&mut src).await.expect("resp");
        assert_eq!(&resp.body[..], &payload[..], "sizes {sizes:?}");
        assert!(resp.body_complete);
    }
}

#[tokio::test]
async fn chunked_bad_size_line_is_malformed() {
    let wire =
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nhello\r\n0\r\n\r\n"
            .to_vec();
    let mut src = ChunkSource::whole(wire);
    let mut fr = FrameReader::new(4096);
    let err = fr.read_http_response(&mut src).await.expect_err("size");
    assert_eq!(err.kind, ErrorKind::Malformed);
}

#[tokio::test]
async fn read_until_close_body() {
    let wire = b"HTTP/1.0 200 OK\r\nServer: old\r\n\r\neverything until close".to_vec();
    let mut src = ChunkSource::whole(wire);
    let mut fr = FrameReader::new(4096);
    let resp = fr.read_http_response(&mut src).await.expect("resp");
    assert_eq!(&resp.body[..], b"everything until close");
    assert!(resp.body_complete);
}

#[tokio::test]
async fn content_length_truncated_by_close_is_flagged() {
    let wire = b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\nshort".to_vec();
    let mut src = ChunkSource::whole(wire);
    let mut fr = FrameReader::new(4096);
    let resp = fr.read_http_response(&mut src).await.expect("resp");
    assert_eq!(&resp.body[..], b"short");
    assert!(!resp.body_complete);
}

#[tokio::test]
async fn mllp_trailer_delimiters() {
    let mut wire = vec![0x0B];
    wire.extend_from_slice(b"MSH|data");
    wire.extend_from_slice(&[0x1C, 0x0D]);
    let mut src = ChunkSource::whole(wire);
    let mut fr = FrameReader::new(1024);
    let frame = fr.read_until(&mut src, &[0x1C]).await.expect("fs");
    assert_eq!(frame.last(), Some(&0x1C));
    assert_eq!(fr.leftover(), &[0x0D]);
}
