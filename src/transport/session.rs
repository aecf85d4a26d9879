// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use tracing::debug;

use crate::{
    error::Result,
    transport::conn::{Target, Transport},
};

/// Best-effort cleanup budget, clamped further by the session's remaining
/// time.
pub const CLEANUP_GRACE: Duration = Duration::from_millis(2000);

/// Open a transport, run `body`, always close. No other component touches
/// the transport lifecycle.
pub async fn with_session<T>(
    target: &Target,
    body: impl AsyncFnOnce(&mut Transport) -> Result<T>,
) -> Result<T> {
    let mut transport = Transport::open(target).await?;
    let out = body(&mut transport).await;
    transport.close().await;
    out
}

/// Like [`with_session`], but runs a protocol-specific goodbye (QUIT,
/// LOGOFF, tree-disconnect, …) after the body, success or not. Cleanup runs
/// under `min(remaining, CLEANUP_GRACE)` and its errors are swallowed.
pub async fn with_session_cleanup<T>(
    target: &Target,
    cleanup: impl AsyncFnOnce(&mut Transport) -> Result<()>,
    body: impl AsyncFnOnce(&mut Transport) -> Result<T>,
) -> Result<T> {
    let mut transport = Transport::open(target).await?;
    let out = body(&mut transport).await;

    transport.deadline = transport.deadline.clamped(CLEANUP_GRACE);
    if let Err(e) = cleanup(&mut transport).await {
        debug!("session cleanup failed: {e}");
    }

    transport.close().await;
    out
}
