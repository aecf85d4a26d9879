// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::io;

use serde::Serialize;
use thiserror::Error;

/// Engine-internal failure taxonomy. Every probe failure is classified into
/// exactly one of these kinds; the handler adaptors own the mapping from a
/// kind to the endpoint's HTTP status and JSON shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Required parameter missing or out of range.
    Validation,
    /// Target-block predicate refused the host.
    Blocked,
    /// Hostname could not be resolved.
    Dns,
    /// TCP connect refused.
    Refused,
    /// TLS handshake failed.
    TlsFail,
    /// Wall-clock deadline fired.
    Timeout,
    /// Peer closed before the expected bytes arrived.
    ShortRead,
    /// Announced or accumulated size exceeds the cap.
    LimitExceeded,
    /// Framing or syntactic invariant violated.
    Malformed,
    /// Wire-valid message of the wrong type.
    UnexpectedMsg,
    /// Authentication step rejected by the peer.
    AuthFail,
    /// Response authenticator/signature failed local verification.
    AuthFailVerify,
    /// Protocol-level error; carries the wire code verbatim.
    ProtocolError,
    /// Any other unexpected condition.
    Internal,
}

/// Wire-level code attached to `PROTOCOL_ERROR` (and occasionally to
/// `AUTH_FAIL`), preserved verbatim for the JSON response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WireCode {
    Http(u16),
    NtStatus(u32),
    Radius(u8),
    IscsiLogin { class: u8, detail: u8 },
    Pcep { error_type: u8, error_value: u8 },
    Sip(u16),
}

/// The one error type that crosses the engine boundary. Framing readers and
/// codecs construct it directly; I/O errors are converted via `From`.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct ProbeError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: Option<WireCode>,
}

pub type Result<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: WireCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn blocked(host: &str) -> Self {
        Self::new(ErrorKind::Blocked, format!("target {host} is blocked by policy"))
    }

    pub fn dns(host: &str) -> Self {
        Self::new(ErrorKind::Dns, format!("failed to resolve {host}"))
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Refused, message)
    }

    pub fn tls(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TlsFail, message)
    }

    pub fn timeout(label: &str) -> Self {
        Self::new(ErrorKind::Timeout, format!("{label}: deadline exceeded"))
    }

    pub fn short_read(label: &str) -> Self {
        Self::new(
            ErrorKind::ShortRead,
            format!("{label}: connection closed before expected bytes"),
        )
    }

    pub fn limit(label: &str, cap: usize) -> Self {
        Self::new(
            ErrorKind::LimitExceeded,
            format!("{label}: response exceeds {cap} byte cap"),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Malformed, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnexpectedMsg, message)
    }

    pub fn auth_fail(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthFail, message)
    }

    pub fn auth_verify(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthFailVerify, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProtocolError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<io::Error> for ProbeError {
    fn from(e: io::Error) -> Self {
        let kind = match e.kind() {
            io::ErrorKind::ConnectionRefused => ErrorKind::Refused,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ErrorKind::ShortRead,
            _ => ErrorKind::Internal,
        };
        Self::new(kind, e.to_string())
    }
}
