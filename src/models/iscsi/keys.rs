// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Login/Text data segments are `key=value` pairs separated by NUL bytes and
//! padded with NULs to a 4-byte boundary.

use std::collections::BTreeMap;

use crate::error::{ProbeError, Result};

/// Build a null-delimited `key=value` list in the given order.
pub fn build_kv(items: &[(&str, &str)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        items.iter().map(|(k, v)| k.len() + 1 + v.len() + 1).sum(),
    );
    for (k, v) in items {
        out.extend_from_slice(k.as_bytes());
        out.push(b'=');
        out.extend_from_slice(v.as_bytes());
        out.push(0);
    }
    out
}

/// Parse a received data segment into ordered pairs (duplicate keys kept).
pub fn parse_kv_pairs(data: &[u8]) -> Vec<(String, String)> {
    let text = String::from_utf8_lossy(data);
    text.split_terminator('\x00')
        .filter(|kv| !kv.is_empty())
        .filter_map(|kv| {
            let mut parts = kv.splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(k), Some(v)) => Some((k.to_string(), v.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// Last-one-wins map view of a data segment.
pub fn parse_kv_map(data: &[u8]) -> BTreeMap<String, String> {
    parse_kv_pairs(data).into_iter().collect()
}

/// CHAP challenge keys sent by the target: `CHAP_I` and `CHAP_C`.
pub fn parse_chap_challenge_keys(data: &[u8]) -> Result<(u8, String)> {
    let map = parse_kv_map(data);
    let id = map
        .get("CHAP_I")
        .ok_or_else(|| ProbeError::malformed("missing CHAP_I"))?
        .trim()
        .parse::<u16>()
        .map_err(|_| ProbeError::malformed("CHAP_I is not a number"))? as u8;
    let challenge = map
        .get("CHAP_C")
        .ok_or_else(|| ProbeError::malformed("missing CHAP_C"))?
        .clone();
    Ok((id, challenge))
}

/// `SendTargets=All` response: every `TargetName` begins a target, every
/// following `TargetAddress` attaches to the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTarget {
    pub name: String,
    pub addresses: Vec<String>,
}

pub fn parse_send_targets(data: &[u8]) -> Vec<DiscoveredTarget> {
    let mut out: Vec<DiscoveredTarget> = Vec::new();
    for (k, v) in parse_kv_pairs(data) {
        match k.as_str() {
            "TargetName" => out.push(DiscoveredTarget {
                name: v,
                addresses: Vec::new(),
            }),
            "TargetAddress" => {
                if let Some(current) = out.last_mut() {
                    current.addresses.push(v);
                }
            },
            _ => {},
        }
    }
    out
}
