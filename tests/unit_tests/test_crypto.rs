// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::{
    codec::buf::utf16le,
    crypto::{
        chap::chap_response_hex,
        digest::{DigestChallenge, authorization_value, compute_response},
        hashes::{hmac_md5, md4, md5},
        ntlm::{self, NtlmV2Response, build_type1, build_type3, parse_type2},
        spnego::{unwrap_response_token, wrap_neg_token_init, wrap_neg_token_resp},
    },
};

/// NTLMv2 with every input pinned: recompute the proof step by step the
/// way MS-NLMP describes it and compare against the module's output.
#[test]
fn ntlmv2_matches_stepwise_reference() {
    let username = "user";
    let password = "SecREt01";
    let domain = "DOMAIN";
    let server_challenge = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
    let client_challenge = [0xaa; 8];
    let filetime = 0x0090_d336_b734_c301u64;
    let target_info = [
        0x02, 0x00, 0x0c, 0x00, b'D', 0, b'O', 0, b'M', 0, b'A', 0, b'I', 0, b'N', 0,
        0x00, 0x00, 0x00, 0x00,
    ];

    let out = ntlm::compute_ntlmv2(
        username,
        password,
        domain,
        "",
        &server_challenge,
        &client_challenge,
        filetime,
        &target_info,
    );

    // Reference computation, spelled out.
    let nt_hash = md4(&utf16le(password));
    let key = hmac_md5(&nt_hash, &utf16le("USERDOMAIN"));
    let mut blob = vec![0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    blob.extend_from_slice(&filetime.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&target_info);
    blob.extend_from_slice(&[0u8; 4]);
    let mut proved = server_challenge.to_vec();
    proved.extend_from_slice(&blob);
    let proof = hmac_md5(&key, &proved);

    let mut nt_response = proof.to_vec();
    nt_response.extend_from_slice(&blob);
    assert_eq!(out.nt_response, nt_response);
    assert_eq!(out.lm_response, [0u8; 24]);
}

#[test]
fn type3_embeds_responses_at_declared_offsets() {
    let v2 = NtlmV2Response {
        nt_response: vec![0xEE; 40],
        lm_response: [0u8; 24],
    };
    let t3 = build_type3("user", "DOMAIN", "PORTOFCALL", &v2);
    assert_eq!(&t3[..8], b"NTLMSSP\0");
    assert_eq!(u32::from_le_bytes([t3[8], t3[9], t3[10], t3[11]]), 3);

    // NT response security buffer: len/maxlen/offset at bytes 20..28.
    let nt_len = u16::from_le_bytes([t3[20], t3[21]]) as usize;
    let nt_off = u32::from_le_bytes([t3[24], t3[25], t3[26], t3[27]]) as usize;
    assert_eq!(nt_len, 40);
    assert_eq!(&t3[nt_off..nt_off + nt_len], &[0xEE; 40][..]);

    // Final field block is the zeroed session key.
    assert_eq!(&t3[t3.len() - 16..], &[0u8; 16]);
}

#[test]
fn type1_type2_spnego_flow() {
    // Wrap Type 1 as the client would and check the GSS shell.
    let t1 = build_type1("", "PORTOFCALL");
    let init = wrap_neg_token_init(&t1);
    assert_eq!(init[0], 0x60);

    // Server-side Type 2 wrapped in NegTokenResp unwraps to the raw token.
    let mut t2 = Vec::new();
    t2.extend_from_slice(b"NTLMSSP\0");
    t2.extend_from_slice(&2u32.to_le_bytes());
    t2.extend_from_slice(&[0u8; 8]); // empty target name buffer
    t2.extend_from_slice(&ntlm::negotiate_flags().bits().to_le_bytes());
    t2.extend_from_slice(&[0x11; 8]); // server challenge
    t2.extend_from_slice(&[0u8; 8]); // reserved
    t2.extend_from_slice(&[0u8; 8]); // empty target info buffer
    let wrapped = wrap_neg_token_resp(&t2);
    let unwrapped = unwrap_response_token(&wrapped).expect("unwrap");
    let parsed = parse_type2(&unwrapped).expect("parse type2");
    assert_eq!(parsed.server_challenge, [0x11; 8]);
    assert!(parsed.target_name.is_empty());
}

// RFC 2617 §3.5: MD5, qop=auth, nc=00000001, cnonce 0a4f113b.
#[test]
fn digest_rfc2617_reference() {
    let ch = DigestChallenge::parse(
        "Digest realm=\"testrealm@host.com\", \
         qop=\"auth,auth-int\", \
         nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\", \
         opaque=\"5ccc069c403ebaf9f0171e9517f40e41\"",
    )
    .expect("challenge");
    let creds = compute_response(
        &ch,
        "Mufasa",
        "Circle Of Life",
        "GET",
        "/dir/index.html",
        "0a4f113b",
    );
    assert_eq!(creds.response, "6629fae49393a05397450978507c4ef1");

    let header = authorization_value(&ch, &creds, "Mufasa", "/dir/index.html");
    assert!(header.starts_with("Digest username=\"Mufasa\""));
    assert!(header.contains("qop=auth"));
    assert!(header.contains("nc=00000001"));
    assert!(header.contains("cnonce=\"0a4f113b\""));
    assert!(header.contains("opaque=\"5ccc069c403ebaf9f0171e9517f40e41\""));
}

#[test]
fn chap_is_lower_hex_with_prefix() {
    let r = chap_response_hex(1, b"s3cret", &[0x01, 0x02]);
    assert!(r.starts_with("0x"));
    assert_eq!(r.len(), 2 + 32);
    assert!(r[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    // Equivalent to MD5(id || secret || challenge).
    let mut manual = vec![0x01];
    manual.extend_from_slice(b"s3cret");
    manual.extend_from_slice(&[0x01, 0x02]);
    assert_eq!(r[2..], hex::encode(md5(&manual)));
}
