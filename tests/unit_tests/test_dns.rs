// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    codec::dns::{TYPE_A, TYPE_CNAME, build_query, decode_name, parse_response},
    error::ErrorKind,
};

use crate::unit_tests::load_fixture;

#[test]
fn fixture_with_compression_decodes() {
    let msg = load_fixture("tests/unit_tests/fixtures/dns/compressed_response.hex")
        .expect("fixture");
    let resp = parse_response(&msg).expect("parse");
    assert_eq!(resp.txid, 0x1234);
    assert_eq!(resp.rcode, 0);
    assert_eq!(
        resp.question,
        Some(("example.com".to_string(), TYPE_A))
    );
    assert_eq!(resp.answers.len(), 2);

    let a = &resp.answers[0];
    assert_eq!(a.name, "example.com");
    assert_eq!(a.rtype, TYPE_A);
    assert_eq!(a.ttl, 60);
    assert_eq!(a.data, "93.184.216.34");

    let cname = &resp.answers[1];
    assert_eq!(cname.rtype, TYPE_CNAME);
    // RDATA name "www" + pointer back to example.com.
    assert_eq!(cname.data, "www.example.com");
}

#[test]
fn query_round_trips_through_parser() {
    let q = build_query(0xBEEF, "probe.example.net", TYPE_A).expect("build");
    let resp = parse_response(&q).expect("parse own query");
    assert_eq!(resp.txid, 0xBEEF);
    assert_eq!(
        resp.question,
        Some(("probe.example.net".to_string(), TYPE_A))
    );
    assert!(resp.answers.is_empty());
    // No EDNS0: ARCOUNT stays zero.
    assert_eq!(resp.additional_count, 0);
}

#[test]
fn pointer_loop_fails_malformed() {
    // Two pointers pointing at each other.
    let mut msg = vec![0u8; 20];
    msg[12] = 0xC0;
    msg[13] = 14;
    msg[14] = 0xC0;
    msg[15] = 12;
    let err = decode_name(&msg, 12).expect_err("loop");
    assert_eq!(err.kind, ErrorKind::Malformed);
    assert!(err.message.contains("128"));
}

#[test]
fn bounded_pointer_chain_decodes() {
    // label "a" at offset 12, then a ladder of pointers each hopping to the
    // previous one; a chain well under the 128-jump cap must decode.
    let mut msg = vec![0u8; 280];
    msg[12] = 1;
    msg[13] = b'a';
    msg[14] = 0;
    let mut prev = 12u16;
    let mut pos = 15usize;
    for _ in 0..100 {
        msg[pos] = 0xC0 | (prev >> 8) as u8;
        msg[pos + 1] = prev as u8;
        prev = pos as u16;
        pos += 2;
    }
    let (name, _) = decode_name(&msg, prev as usize).expect("chain");
    assert_eq!(name, "a");
}

#[test]
fn truncated_name_is_malformed() {
    let msg = vec![0x05, b'a', b'b'];
    let err = decode_name(&msg, 0).expect_err("truncated");
    assert_eq!(err.kind, ErrorKind::Malformed);
}
