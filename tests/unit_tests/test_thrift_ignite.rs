// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::models::{
    ignite::{
        build_handshake, build_operation, java_string_hash_code,
        parse_handshake_response, parse_operation_response,
    },
    thrift::{
        MSG_CALL, MSG_REPLY, StructWriter, ThriftValue, build_message, frame,
        parse_message,
    },
};

#[test]
fn thrift_reply_round_trip_with_doubles_and_i64() {
    let mut body = StructWriter::new();
    body.double_field(1, 2.5)
        .i64_field(2, i64::MAX)
        .i16_field(3, -7)
        .byte_field(4, 0xFF);
    let payload = build_message("stats", MSG_REPLY, 3, &body.finish());
    let msg = parse_message(&payload).expect("parse");
    assert_eq!(msg.method, "stats");
    assert_eq!(msg.fields[0].value, ThriftValue::Double(2.5));
    assert_eq!(msg.fields[1].value, ThriftValue::I64(i64::MAX));
    assert_eq!(msg.fields[2].value, ThriftValue::I16(-7));
    assert_eq!(msg.fields[3].value, ThriftValue::Byte(0xFF));
}

#[test]
fn thrift_frame_layout() {
    let payload = build_message("ping", MSG_CALL, 1, &StructWriter::new().finish());
    let framed = frame(&payload);
    assert_eq!(
        u32::from_be_bytes([framed[0], framed[1], framed[2], framed[3]]) as usize,
        payload.len()
    );
    // Version word: 0x8001 then type in the low byte.
    assert_eq!(&framed[4..6], &[0x80, 0x01]);
    assert_eq!(framed[7], MSG_CALL);
}

#[test]
fn ignite_handshake_shape_and_response() {
    let hs = build_handshake();
    assert_eq!(hs.len(), 11);

    // Rejection response: flag 0, server version, no message.
    let mut payload = vec![0u8];
    payload.extend_from_slice(&1u16.to_le_bytes());
    payload.extend_from_slice(&9u16.to_le_bytes());
    payload.extend_from_slice(&0u16.to_le_bytes());
    let resp = parse_handshake_response(&payload).expect("parse");
    assert!(!resp.success);
    assert_eq!(resp.server_version, Some((1, 9, 0)));
    assert!(resp.node_uuid.is_none());
}

#[test]
fn ignite_envelope_is_little_endian() {
    let op = build_operation(1020, 7, &[1, 2, 3]);
    assert_eq!(u32::from_le_bytes([op[0], op[1], op[2], op[3]]), 13);
    assert_eq!(u16::from_le_bytes([op[4], op[5]]), 1020);
    assert_eq!(
        u64::from_le_bytes([op[6], op[7], op[8], op[9], op[10], op[11], op[12], op[13]]),
        7
    );

    let mut resp = Vec::new();
    resp.extend_from_slice(&7u64.to_le_bytes());
    resp.extend_from_slice(&0u32.to_le_bytes());
    resp.extend_from_slice(&99u64.to_le_bytes());
    let parsed = parse_operation_response(&resp).expect("parse");
    assert_eq!(parsed.request_id, 7);
    assert_eq!(parsed.status, 0);
}

#[test]
fn hash_code_known_values() {
    assert_eq!(java_string_hash_code("SQL_PUBLIC"), {
        // Stepwise 31*h + unit, checked against the closed form.
        let mut h: i32 = 0;
        for u in "SQL_PUBLIC".encode_utf16() {
            h = h.wrapping_mul(31).wrapping_add(u as i32);
        }
        h
    });
    assert_eq!(java_string_hash_code("abc"), 96354);
}
