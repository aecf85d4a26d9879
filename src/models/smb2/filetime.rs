// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! FILETIME conversions: 100-ns intervals since 1601-01-01 UTC.

use chrono::{DateTime, TimeZone, Utc};

const EPOCH_DELTA_SECS: i64 = 11_644_473_600;

pub fn filetime_to_datetime(ft: u64) -> Option<DateTime<Utc>> {
    if ft == 0 {
        return None;
    }
    let secs = (ft / 10_000_000) as i64 - EPOCH_DELTA_SECS;
    let nanos = ((ft % 10_000_000) * 100) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}

/// ISO 8601 rendering for server clock fields.
pub fn filetime_to_iso8601(ft: u64) -> Option<String> {
    filetime_to_datetime(ft).map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

/// `YYYY-MM-DD HH:MM:SS` UTC rendering for directory entries.
pub fn filetime_to_ymd_hms(ft: u64) -> Option<String> {
    filetime_to_datetime(ft).map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}
