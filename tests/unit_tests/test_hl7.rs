// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use portofcall::models::hl7::{
    Hl7Message, MshParams, build_adt_a01, build_oru_r01, unwrap_mllp, wrap_mllp,
};

fn params(mt: &str, te: &str) -> MshParams {
    MshParams {
        sending_app: "PORTOFCALL".into(),
        sending_facility: "GATEWAY".into(),
        receiving_app: "HIS".into(),
        receiving_facility: "HOSPITAL".into(),
        control_id: "POC00000001".into(),
        message_type: mt.into(),
        trigger_event: te.into(),
        version: "2.5".into(),
    }
}

#[test]
fn msh_field_indexing_property() {
    // The canonical separator-quirk case from the parser contract.
    let msg = Hl7Message::parse("MSH|^~\\&|A|B|C|D|T||MT^TE|CID|P|2.5").expect("parse");
    let msh = msg.msh().expect("msh");
    assert_eq!(
        (
            msh.sending_app.as_str(),
            msh.sending_facility.as_str(),
            msh.receiving_app.as_str(),
            msh.receiving_facility.as_str(),
            msh.timestamp.as_str(),
            msh.message_type.as_str(),
            msh.trigger_event.as_str(),
            msh.control_id.as_str(),
        ),
        ("A", "B", "C", "D", "T", "MT", "TE", "CID")
    );
}

#[test]
fn built_adt_parses_back() {
    let text = build_adt_a01(&params("ADT", "A01"), "12345", "DOE^JOHN");
    let msg = Hl7Message::parse(&text).expect("parse");
    let msh = msg.msh().expect("msh");
    assert_eq!(msh.message_type, "ADT");
    assert_eq!(msh.trigger_event, "A01");
    assert_eq!(msh.control_id, "POC00000001");
    assert_eq!(msh.version, "2.5");
    // MSH-7 is a 14-digit UTC timestamp.
    assert_eq!(msh.timestamp.len(), 14);
    assert!(msh.timestamp.chars().all(|c| c.is_ascii_digit()));
    assert!(msg.segments.iter().any(|s| s[0] == "EVN"));
    assert!(msg.segments.iter().any(|s| s[0] == "PV1"));
}

#[test]
fn built_oru_has_observation_segments() {
    let text = build_oru_r01(&params("ORU", "R01"), "999", "ROE^JANE");
    let msg = Hl7Message::parse(&text).expect("parse");
    assert!(msg.segments.iter().any(|s| s[0] == "OBR"));
    assert!(msg.segments.iter().any(|s| s[0] == "OBX"));
    assert!(!msg.segments.iter().any(|s| s[0] == "EVN"));
}

#[test]
fn ack_scenario_fields() {
    // The seed-test ACK payload, as it arrives inside MLLP framing.
    let wire = wrap_mllp(
        "MSH|^~\\&|X|Y||||||ACK|ACK001|P|2.5\rMSA|AA|MSG1|Message accepted",
    );
    let payload = unwrap_mllp(&wire);
    let msg = Hl7Message::parse(&String::from_utf8_lossy(payload)).expect("parse");
    let msa = msg.msa().expect("msa");
    assert_eq!(msa.ack_code, "AA");
    assert_eq!(msa.ack_text, "Message accepted");
    assert_eq!(msa.control_id, "MSG1");
}
