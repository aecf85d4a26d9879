// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Framing readers: consume bytes from a transport until a complete frame is
//! available, EOF, deadline expiry, or cap breach. Leftover bytes after a
//! frame stay in the buffer for the next read; nothing is ever discarded.

use bytes::{Bytes, BytesMut};

use crate::error::{ProbeError, Result};

/// The byte producer underneath a `FrameReader`. `Transport` is the real
/// implementation; tests feed canned chunks through a stub.
pub trait ByteSource {
    /// Read some bytes into `buf`; 0 means end-of-stream. The implementor
    /// enforces the session deadline.
    fn read_some(
        &mut self,
        buf: &mut BytesMut,
    ) -> impl Future<Output = Result<usize>> + Send;
}

/// MLLP start-of-block byte.
pub const MLLP_SB: u8 = 0x0B;
/// MLLP end-of-block byte (field separator).
pub const MLLP_EB: u8 = 0x1C;

/// Accumulating framed reader with a hard byte cap.
#[derive(Debug)]
pub struct FrameReader {
    buf: BytesMut,
    eof: bool,
    cap: usize,
}

impl FrameReader {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096.min(cap)),
            eof: false,
            cap,
        }
    }

    /// Bytes received but not yet consumed by any frame.
    pub fn leftover(&self) -> &[u8] {
        &self.buf
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Pull one chunk from the source. Returns false when the stream ended.
    async fn fill_some<S: ByteSource>(&mut self, src: &mut S) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let n = src.read_some(&mut self.buf).await?;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        if self.buf.len() > self.cap {
            return Err(ProbeError::limit("read", self.cap));
        }
        Ok(true)
    }

    /// Exactly `n` bytes; surplus stays buffered.
    pub async fn read_exact_n<S: ByteSource>(
        &mut self,
        src: &mut S,
        n: usize,
    ) -> Result<Bytes> {
        if n > self.cap {
            return Err(ProbeError::limit("read_exact", self.cap));
        }
        while self.buf.len() < n {
            if !self.fill_some(src).await? {
                return Err(ProbeError::short_read("read_exact"));
            }
        }
        Ok(self.buf.split_to(n).freeze())
    }

    /// Bytes up to and including `delim`.
    pub async fn read_until<S: ByteSource>(
        &mut self,
        src: &mut S,
        delim: &[u8],
    ) -> Result<Bytes> {
        let (frame, found) = self.read_until_or_eof(src, delim).await?;
        if !found {
            return Err(ProbeError::short_read("read_until"));
        }
        Ok(frame)
    }

    /// Like `read_until`, but EOF before the delimiter yields everything
    /// received with `found = false` (MLLP's silent acceptance of unframed
    /// responses relies on this).
    pub async fn read_until_or_eof<S: ByteSource>(
        &mut self,
        src: &mut S,
        delim: &[u8],
    ) -> Result<(Bytes, bool)> {
        debug_assert!(!delim.is_empty());
        let mut scanned = 0usize;
        loop {
            if self.buf.len() >= delim.len() {
                let start = scanned.saturating_sub(delim.len() - 1);
                if let Some(pos) = find(&self.buf[start..], delim) {
                    let end = start + pos + delim.len();
                    return Ok((self.buf.split_to(end).freeze(), true));
                }
                scanned = self.buf.len();
            }
            if !self.fill_some(src).await? {
                return Ok((self.buf.split().freeze(), false));
            }
        }
    }

    /// One `\r\n`-terminated line, delimiter stripped, lossily decoded.
    pub async fn read_line<S: ByteSource>(&mut self, src: &mut S) -> Result<String> {
        let raw = self.read_until(src, b"\r\n").await?;
        Ok(String::from_utf8_lossy(&raw[..raw.len() - 2]).into_owned())
    }

    /// 2-byte big-endian length prefix, then the payload.
    pub async fn read_u16_be_frame<S: ByteSource>(
        &mut self,
        src: &mut S,
    ) -> Result<Bytes> {
        let hdr = self.read_exact_n(src, 2).await?;
        let len = u16::from_be_bytes([hdr[0], hdr[1]]) as usize;
        if len > self.cap {
            return Err(ProbeError::limit("u16 frame", self.cap));
        }
        self.read_exact_n(src, len).await
    }

    /// 4-byte big-endian length prefix, then the payload.
    pub async fn read_u32_be_frame<S: ByteSource>(
        &mut self,
        src: &mut S,
    ) -> Result<Bytes> {
        let hdr = self.read_exact_n(src, 4).await?;
        let len = u32::from_be_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]) as usize;
        if len > self.cap {
            return Err(ProbeError::limit("u32 frame", self.cap));
        }
        self.read_exact_n(src, len).await
    }

    /// 4-byte little-endian length prefix, then the payload.
    pub async fn read_u32_le_frame<S: ByteSource>(
        &mut self,
        src: &mut S,
    ) -> Result<Bytes> {
        let hdr = self.read_exact_n(src, 4).await?;
        let len = u32::from_le_bytes([hdr[0], hdr[1], hdr[2], hdr[3]]) as usize;
        if len > self.cap {
            return Err(ProbeError::limit("u32le frame", self.cap));
        }
        self.read_exact_n(src, len).await
    }

    /// One SMB2 message: NetBIOS session header (0x00 + 24-bit BE length),
    /// then the message, which must open with the SMB2 magic.
    pub async fn read_smb2_message<S: ByteSource>(
        &mut self,
        src: &mut S,
    ) -> Result<Bytes> {
        let hdr = self.read_exact_n(src, 4).await?;
        if hdr[0] != 0 {
            return Err(ProbeError::malformed("NetBIOS: non-session-message type"));
        }
        let len = u32::from_be_bytes([0, hdr[1], hdr[2], hdr[3]]) as usize;
        if len > self.cap {
            return Err(ProbeError::limit("SMB2 message", self.cap));
        }
        let msg = self.read_exact_n(src, len).await?;
        if msg.len() < 4 || msg[0] != 0xFE || &msg[1..4] != b"SMB" {
            return Err(ProbeError::malformed("SMB2: bad protocol magic"));
        }
        Ok(msg)
    }

    /// Everything until peer close, cap-bounded (EPMD NAMES responses).
    pub async fn read_to_eof<S: ByteSource>(&mut self, src: &mut S) -> Result<Bytes> {
        while self.fill_some(src).await? {}
        Ok(self.buf.split().freeze())
    }

    /// Status line + headers + body per spec §4.2.5. Body termination:
    /// Content-Length, else chunked, else read-until-close. The cap never
    /// fails the read; it truncates the body and clears `body_complete`.
    pub async fn read_http_response<S: ByteSource>(
        &mut self,
        src: &mut S,
    ) -> Result<RawHttpResponse> {
        let status_line = self.read_line(src).await?;
        let status = parse_status_line(&status_line)?;

        let mut headers: Vec<(String, String)> = Vec::new();
        loop {
            let line = self.read_line(src).await?;
            if line.is_empty() {
                break;
            }
            let Some(colon) = line.find(':') else {
                return Err(ProbeError::malformed(format!(
                    "header line without colon: {line:?}"
                )));
            };
            headers.push((
                line[..colon].trim().to_string(),
                line[colon + 1..].trim().to_string(),
            ));
        }

        let content_length = header_get(&headers, "Content-Length")
            .map(|v| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|_| ProbeError::malformed("bad Content-Length"))
            })
            .transpose()?;
        let chunked = header_get(&headers, "Transfer-Encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));

        let (body, body_complete) = if let Some(len) = content_length {
            self.read_body_exact(src, len).await?
        } else if chunked {
            self.read_body_chunked(src).await?
        } else {
            self.read_body_to_close(src).await?
        };

        let (_, reason) = split_status(&status_line);
        Ok(RawHttpResponse {
            status_line,
            status,
            reason,
            headers,
            body,
            body_complete,
        })
    }

    async fn read_body_exact<S: ByteSource>(
        &mut self,
        src: &mut S,
        len: usize,
    ) -> Result<(Bytes, bool)> {
        let want = len.min(self.cap);
        while self.buf.len() < want {
            if !self.fill_some(src).await? {
                // Peer closed early: return what arrived, flagged incomplete.
                return Ok((self.buf.split().freeze(), false));
            }
        }
        let body = self.buf.split_to(want).freeze();
        Ok((body, want == len))
    }

    async fn read_body_to_close<S: ByteSource>(
        &mut self,
        src: &mut S,
    ) -> Result<(Bytes, bool)> {
        loop {
            if self.buf.len() >= self.cap {
                return Ok((self.buf.split_to(self.cap).freeze(), false));
            }
            if src.read_some(&mut self.buf).await? == 0 {
                self.eof = true;
                return Ok((self.buf.split().freeze(), true));
            }
        }
    }

    async fn read_body_chunked<S: ByteSource>(
        &mut self,
        src: &mut S,
    ) -> Result<(Bytes, bool)> {
        let mut body = BytesMut::new();
        loop {
            let size_line = self.read_line(src).await?;
            let size_token = size_line
                .split(';')
                .next()
                .map(str::trim)
                .unwrap_or_default();
            let size = usize::from_str_radix(size_token, 16)
                .map_err(|_| ProbeError::malformed("bad chunk size line"))?;
            if size == 0 {
                // Trailers until the blank line; tolerate early close here.
                loop {
                    match self.read_until_or_eof(src, b"\r\n").await? {
                        (line, true) if line.len() == 2 => break,
                        (_, true) => continue,
                        (_, false) => break,
                    }
                }
                return Ok((body.freeze(), true));
            }
            if body.len() + size > self.cap {
                return Ok((body.freeze(), false));
            }
            let chunk = self.read_exact_n(src, size).await?;
            body.extend_from_slice(&chunk);
            let crlf = self.read_exact_n(src, 2).await?;
            if &crlf[..] != b"\r\n" {
                return Err(ProbeError::malformed("chunk not CRLF-terminated"));
            }
        }
    }
}

/// Parsed HTTP-shaped response (also carries SIP responses: same framing).
#[derive(Debug, Clone)]
pub struct RawHttpResponse {
    pub status_line: String,
    pub status: u16,
    pub reason: String,
    /// Original order and case preserved; lookup is case-insensitive.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// False when the body was truncated at the cap or by early close.
    pub body_complete: bool,
}

impl RawHttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    /// All values for a header, in order of appearance.
    pub fn header_all<'a>(&'a self, name: &str) -> Vec<&'a str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn header_get<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn parse_status_line(line: &str) -> Result<u16> {
    let mut it = line.split_whitespace();
    let _version = it
        .next()
        .ok_or_else(|| ProbeError::malformed("empty status line"))?;
    let code = it
        .next()
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| ProbeError::malformed(format!("bad status line: {line:?}")))?;
    Ok(code)
}

fn split_status(line: &str) -> (u16, String) {
    let mut it = line.splitn(3, ' ');
    let _version = it.next();
    let code = it.next().and_then(|c| c.parse().ok()).unwrap_or(0);
    (code, it.next().unwrap_or("").to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
