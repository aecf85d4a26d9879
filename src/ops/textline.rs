// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared reply readers for the text-line protocols. SMTP and FTP use the
//! same three-digit-code grammar: a reply is final on the first line whose
//! code is followed by a space (continuation lines use `-`).

use crate::{
    error::{ProbeError, Result},
    transport::{
        conn::Transport,
        framing::FrameReader,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodedReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl CodedReply {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_positive(&self) -> bool {
        (200..400).contains(&self.code)
    }
}

/// Read one SMTP/FTP reply, accumulating continuation lines.
pub async fn read_coded_reply(
    t: &mut Transport,
    fr: &mut FrameReader,
) -> Result<CodedReply> {
    let mut lines = Vec::new();
    loop {
        let line = fr.read_line(t).await?;
        let bytes = line.as_bytes();
        let coded = bytes.len() >= 3 && bytes[..3].iter().all(u8::is_ascii_digit);
        if !coded {
            // Off-grammar line inside a multiline banner; keep collecting.
            if lines.is_empty() {
                return Err(ProbeError::malformed(format!(
                    "expected a coded reply line, got {line:?}"
                )));
            }
            lines.push(line);
            continue;
        }
        let code: u16 = line[..3]
            .parse()
            .map_err(|_| ProbeError::malformed("reply code is not numeric"))?;
        let last = bytes.get(3) != Some(&b'-');
        lines.push(line);
        if last {
            return Ok(CodedReply { code, lines });
        }
    }
}

/// POP3 single-line status: `+OK …` / `-ERR …`.
pub async fn read_pop3_status(
    t: &mut Transport,
    fr: &mut FrameReader,
) -> Result<(bool, String)> {
    let line = fr.read_line(t).await?;
    if let Some(rest) = line.strip_prefix("+OK") {
        Ok((true, rest.trim().to_string()))
    } else if let Some(rest) = line.strip_prefix("-ERR") {
        Ok((false, rest.trim().to_string()))
    } else {
        Err(ProbeError::malformed(format!(
            "POP3: unexpected status line {line:?}"
        )))
    }
}

/// POP3 multiline payload terminated by `\r\n.\r\n`; the leading status
/// line must already have been consumed.
pub async fn read_pop3_multiline(
    t: &mut Transport,
    fr: &mut FrameReader,
) -> Result<Vec<String>> {
    let raw = fr.read_until(t, b"\r\n.\r\n").await?;
    let text = String::from_utf8_lossy(&raw[..raw.len() - 5]);
    Ok(text
        .split("\r\n")
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
