// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SIP request construction (OPTIONS, REGISTER) and response header
//! digestion. Responses share HTTP framing, so the transport's HTTP reader
//! does the byte work and this module interprets the headers.

use rand::RngExt;

use crate::transport::framing::RawHttpResponse;

fn random_token(len: usize) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// RFC 3261 branch parameter, magic-cookie prefixed.
pub fn generate_branch() -> String {
    format!("z9hG4bK{}", random_token(16))
}

pub fn generate_tag() -> String {
    random_token(10)
}

pub fn generate_call_id(host: &str) -> String {
    format!("{}@{host}", random_token(20))
}

#[derive(Debug, Clone)]
pub struct SipRequestParams {
    pub method: String,
    pub target_host: String,
    pub target_port: u16,
    pub local_host: String,
    pub from_user: String,
    pub to_user: String,
    pub user_agent: String,
    pub branch: String,
    pub from_tag: String,
    pub call_id: String,
    pub cseq: u32,
}

/// Render one SIP request with an empty body. `authorization` carries the
/// Digest credentials on the retransmission after a 401/407.
pub fn build_request(p: &SipRequestParams, authorization: Option<(&str, &str)>) -> Vec<u8> {
    let uri = format!("sip:{}:{}", p.target_host, p.target_port);
    let mut msg = format!("{} {} SIP/2.0\r\n", p.method, uri);
    msg.push_str(&format!(
        "Via: SIP/2.0/TCP {};branch={}\r\n",
        p.local_host, p.branch
    ));
    msg.push_str("Max-Forwards: 70\r\n");
    msg.push_str(&format!(
        "From: <sip:{}@{}>;tag={}\r\n",
        p.from_user, p.local_host, p.from_tag
    ));
    msg.push_str(&format!("To: <sip:{}@{}>\r\n", p.to_user, p.target_host));
    msg.push_str(&format!("Call-ID: {}\r\n", p.call_id));
    msg.push_str(&format!("CSeq: {} {}\r\n", p.cseq, p.method));
    if p.method == "REGISTER" {
        msg.push_str(&format!(
            "Contact: <sip:{}@{}>\r\n",
            p.from_user, p.local_host
        ));
        msg.push_str("Expires: 60\r\n");
    }
    if let Some((header, value)) = authorization {
        msg.push_str(&format!("{header}: {value}\r\n"));
    }
    msg.push_str(&format!("User-Agent: {}\r\n", p.user_agent));
    msg.push_str("Content-Length: 0\r\n\r\n");
    msg.into_bytes()
}

/// Request URI as placed in the start line (Digest uses it verbatim).
pub fn request_uri(p: &SipRequestParams) -> String {
    format!("sip:{}:{}", p.target_host, p.target_port)
}

/// Comma-separated header value into trimmed items.
pub fn split_list_header(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Interpreted SIP response headers.
#[derive(Debug, Clone, Default)]
pub struct SipResponseInfo {
    pub status: u16,
    pub reason: String,
    pub allowed_methods: Vec<String>,
    pub supported_extensions: Vec<String>,
    pub server_agent: Option<String>,
}

pub fn interpret_response(resp: &RawHttpResponse) -> SipResponseInfo {
    SipResponseInfo {
        status: resp.status,
        reason: resp.reason.clone(),
        allowed_methods: resp
            .header("Allow")
            .map(split_list_header)
            .unwrap_or_default(),
        supported_extensions: resp
            .header("Supported")
            .map(split_list_header)
            .unwrap_or_default(),
        server_agent: resp
            .header("Server")
            .or_else(|| resp.header("User-Agent"))
            .map(str::to_string),
    }
}

/// A transaction is finished once a non-provisional (>= 200) status
/// arrives; 1xx responses keep the reader accumulating.
pub fn is_final_status(status: u16) -> bool {
    status >= 200
}
