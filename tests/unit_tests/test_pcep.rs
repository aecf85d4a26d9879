// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    codec::buf::ByteWriter,
    models::pcep::{
        CLASS_ERO, CLASS_METRIC, CLASS_NOPATH, CLASS_RP, MSG_PCREP, METRIC_IGP,
        build_open_message, build_pcreq_message, parse_ero_body, parse_message,
        parse_metric_body, parse_nopath_nature, parse_open_body, peek_message_length,
    },
};

/// Hand-assemble a PCRep the way a PCE would answer the seed scenario:
/// RP, ERO with three strict /32 hops, and an IGP metric of 100.
fn build_pcrep_with_path() -> Vec<u8> {
    let mut objects = ByteWriter::new();

    // RP object echoing request id 1.
    objects.u8(CLASS_RP);
    objects.u8(1 << 4);
    objects.u16_be(12);
    objects.u32_be(0);
    objects.u32_be(1);

    // ERO with three IPv4 prefix subobjects.
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

    // METRIC, IGP = 100.0.
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

#[test]
fn pcrep_scenario_parses_into_three_hops_and_metric() {
    let wire = build_pcrep_with_path();
    let msg = parse_message(&wire).expect("parse");
    assert_eq!(msg.msg_type, MSG_PCREP);

    let ero = msg.object(CLASS_ERO).expect("ero");
    let hops = parse_ero_body(&ero.body).expect("hops");
    assert_eq!(hops.len(), 3);
    assert_eq!(hops[0].address, "10.0.1.1");
    assert_eq!(hops[1].address, "10.1.0.1");
    assert_eq!(hops[2].address, "10.0.2.1");
    assert!(hops.iter().all(|h| !h.loose));

    let metric = msg.object(CLASS_METRIC).expect("metric");
    let m = parse_metric_body(&metric.body).expect("metric body");
    assert_eq!(m.metric_type, METRIC_IGP);
    assert_eq!(m.value, 100.0);

    assert!(msg.object(CLASS_NOPATH).is_none());
}

#[test]
fn nopath_object_read() {
    let mut msg = ByteWriter::new();
    msg.u8(0x20);
    msg.u8(MSG_PCREP);
    msg.u16_be(12);
    msg.u8(CLASS_NOPATH);
    msg.u8(1 << 4);
    msg.u16_be(8);
    msg.u8(0); // nature: no path found
    msg.u8(0);
    msg.u16_be(0);
    let parsed = parse_message(msg.as_slice()).expect("parse");
    let nopath = parsed.object(CLASS_NOPATH).expect("nopath");
    assert_eq!(parse_nopath_nature(&nopath.body).expect("nature"), 0);
}

#[test]
fn open_and_pcreq_survive_their_own_parser() {
    let open = build_open_message(30, 120, 1);
    let msg = parse_message(&open).expect("open");
    let info = parse_open_body(&msg.objects[0].body).expect("body");
    assert_eq!((info.keepalive, info.deadtimer), (30, 120));

    let pcreq = build_pcreq_message(42, [192, 0, 2, 1], [192, 0, 2, 9], None);
    let msg = parse_message(&pcreq).expect("pcreq");
    assert_eq!(msg.objects.len(), 2);
    assert_eq!(msg.objects[0].class, CLASS_RP);
}

#[test]
fn header_peek_validates_version_and_length() {
    let open = build_open_message(30, 120, 1);
    let mut hdr = [0u8; 4];
    hdr.copy_from_slice(&open[..4]);
    assert_eq!(peek_message_length(&hdr).expect("len"), open.len());

    let bad = [0x40, 1, 0, 8]; // version 2
    assert!(peek_message_length(&bad).is_err());
}

#[test]
fn length_mismatch_is_malformed() {
    let mut open = build_open_message(30, 120, 1);
    open.push(0); // trailing junk the length field does not cover
    let err = parse_message(&open).expect_err("length");
    assert_eq!(err.kind, portofcall::error::ErrorKind::Malformed);
}
