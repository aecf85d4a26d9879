// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod chap;
pub mod digest;
pub mod hashes;
pub mod ntlm;
pub mod spnego;
