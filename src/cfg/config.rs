// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Gateway-wide static defaults. Everything here is process-global and
/// read-only once loaded; per-request parameters (host, port, credentials)
/// never live in this structure.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Wall-clock bounds applied to every session.
    #[serde(default)]
    pub limits: Limits,
    /// Per-protocol response accumulation caps.
    #[serde(default)]
    pub caps: Caps,
    /// Fixed client identities presented on the wire.
    #[serde(default)]
    pub identity: Identity,
}

/// Timeout policy. A handler clamps the request's `timeout` field into
/// `[1 ms, max]` where `max` is endpoint-specific (SIP transactions may ride
/// out long provisional phases, everything else uses the common bound).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Limits {
    #[serde(rename = "DefaultTimeout", with = "serde_ms")]
    /// Session deadline applied when the request omits `timeout`.
    pub default_timeout: Duration,

    #[serde(rename = "MaxTimeout", with = "serde_ms")]
    /// Upper bound for the common endpoints.
    pub max_timeout: Duration,

    #[serde(rename = "MaxTimeoutSip", with = "serde_ms")]
    /// Upper bound for SIP endpoints (long provisional phases).
    pub max_timeout_sip: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(10_000),
            max_timeout: Duration::from_millis(30_000),
            max_timeout_sip: Duration::from_millis(300_000),
        }
    }
}

impl Limits {
    /// Clamp a request-supplied timeout (milliseconds) into `[1, max]`,
    /// falling back to the default when absent.
    pub fn clamp(&self, requested_ms: Option<u64>, max: Duration) -> Duration {
        match requested_ms {
            None => self.default_timeout.min(max),
            Some(ms) => Duration::from_millis(ms.max(1)).min(max),
        }
    }
}

/// Maximum bytes a framing reader may accumulate per response.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Caps {
    #[serde(rename = "TextResponse")]
    /// Text-line and binary-PDU protocols (SMTP, iSCSI, RADIUS, …).
    pub text_response: usize,

    #[serde(rename = "HttpResponse")]
    /// HTTP-style responses (RabbitMQ management, Vault, DoH, …).
    pub http_response: usize,

    #[serde(rename = "FrameResponse")]
    /// Hard ceiling for announced Ignite/Thrift frame lengths.
    pub frame_response: usize,

    #[serde(rename = "SmbMessage")]
    /// One SMB2 message (64 KiB payload + header slack).
    pub smb_message: usize,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            text_response: 64 * 1024,
            http_response: 512 * 1024,
            frame_response: 1024 * 1024,
            smb_message: 64 * 1024 + 4096,
        }
    }
}

/// Fixed identities the gateway presents to probed targets.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Identity {
    #[serde(rename = "NtlmWorkstation")]
    /// Workstation name in NTLM Type 1/3 messages.
    pub ntlm_workstation: String,

    #[serde(rename = "SmbClientGuid")]
    /// 16-byte ClientGUID sent in SMB2 NEGOTIATE (ASCII, exactly 16 chars).
    pub smb_client_guid: String,

    #[serde(rename = "IscsiInitiatorName")]
    /// InitiatorName key for iSCSI logins.
    pub iscsi_initiator_name: String,

    #[serde(rename = "SipUserAgent")]
    /// User-Agent header for SIP requests.
    pub sip_user_agent: String,

    #[serde(rename = "HttpUserAgent")]
    /// User-Agent header for hand-built HTTP requests.
    pub http_user_agent: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            ntlm_workstation: "PORTOFCALL".to_string(),
            smb_client_guid: "OrtCallSMB2Clien".to_string(),
            iscsi_initiator_name: "iqn.2024-01.gg.ross.portofcall:initiator".to_string(),
            sip_user_agent: "PortOfCall/1.0".to_string(),
            http_user_agent: "PortOfCall/1.0".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let cfg: GatewayConfig =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates invariants.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.limits.default_timeout <= self.limits.max_timeout,
            "DefaultTimeout must not exceed MaxTimeout"
        );
        ensure!(
            self.limits.max_timeout <= self.limits.max_timeout_sip,
            "MaxTimeout must not exceed MaxTimeoutSip"
        );
        ensure!(self.caps.text_response >= 1024, "TextResponse cap too small");
        ensure!(
            self.caps.http_response >= self.caps.text_response,
            "HttpResponse cap must be >= TextResponse cap"
        );
        ensure!(
            self.identity.smb_client_guid.len() == 16,
            "SmbClientGuid must be exactly 16 ASCII chars"
        );
        ensure!(
            !self.identity.iscsi_initiator_name.is_empty(),
            "IscsiInitiatorName must not be empty"
        );
        Ok(())
    }

    /// The ClientGUID bytes for SMB2 NEGOTIATE.
    pub fn smb_client_guid_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        let src = self.identity.smb_client_guid.as_bytes();
        let n = src.len().min(16);
        out[..n].copy_from_slice(&src[..n]);
        out
    }
}

/// Serde helpers for representing `Duration` as a number of milliseconds.
mod serde_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}
