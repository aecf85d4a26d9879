// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Login Response status classes and details (RFC 7143 §11.11.1), rendered
//! for the probe result exactly as received.

/// Status class names per RFC.
pub fn class_text(class: u8) -> &'static str {
    match class {
        0 => "Success",
        1 => "Redirection",
        2 => "Initiator Error",
        3 => "Target Error",
        _ => "Unknown",
    }
}

/// Detail strings for the class/detail pairs the login path can produce.
pub fn detail_text(class: u8, detail: u8) -> &'static str {
    match (class, detail) {
        (0, 0x00) => "Login successful",
        (1, 0x01) => "Target moved temporarily",
        (1, 0x02) => "Target moved permanently",
        (2, 0x00) => "Initiator error",
        (2, 0x01) => "Authentication failure",
        (2, 0x02) => "Authorization failure",
        (2, 0x03) => "Target not found",
        (2, 0x04) => "Target removed",
        (2, 0x05) => "Unsupported version",
        (2, 0x06) => "Too many connections",
        (2, 0x07) => "Missing parameter",
        (2, 0x08) => "Can't include in session",
        (2, 0x09) => "Session type not supported",
        (2, 0x0A) => "Session does not exist",
        (2, 0x0B) => "Invalid request during login",
        (3, 0x00) => "Target hardware or software error",
        (3, 0x01) => "Service unavailable",
        (3, 0x02) => "Out of resources",
        _ => "Unknown status",
    }
}

/// The combined rendering used by the login/discovery endpoints.
pub fn login_status_text(class: u8, detail: u8) -> String {
    format!("{} — {}", class_text(class), detail_text(class, detail))
}
