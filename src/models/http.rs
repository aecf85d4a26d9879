// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Hand-built HTTP/1.1 requests for the protocols that ride plain HTTP over
//! the raw transport (RabbitMQ management, Vault, Icecast, JSON-RPC, DoH).
//! No redirects, no Content-Encoding decoding; `Connection: close` always.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

/// Request builder mirroring the wire layout byte for byte.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: String,
    path: String,
    host_header: String,
    user_agent: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        host: &str,
        port: u16,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            host_header: format!("{host}:{port}"),
            user_agent: user_agent.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn basic_auth(self, username: &str, password: &str) -> Self {
        let token = BASE64.encode(format!("{username}:{password}"));
        self.header("Authorization", format!("Basic {token}"))
    }

    pub fn body(mut self, content_type: &str, body: Vec<u8>) -> Self {
        self.headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        self.body = body;
        self
    }

    pub fn render(&self) -> Vec<u8> {
        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\nUser-Agent: {}\r\n",
            self.method, self.path, self.host_header, self.user_agent
        );
        for (k, v) in &self.headers {
            head.push_str(&format!("{k}: {v}\r\n"));
        }
        if !self.body.is_empty() {
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}
