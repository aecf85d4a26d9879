// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SMB2/CIFS operations: negotiate probe, NTLMv2 session setup, share
//! operations (list, read, write, stat). One message in flight at a time;
//! MessageId starts at 0 with NEGOTIATE and increments per request.
//! Cleanup always attempts TREE_DISCONNECT then LOGOFF.

use std::cell::RefCell;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::Serialize;
use tracing::debug;

use crate::{
    cfg::config::GatewayConfig,
    crypto::{
        ntlm::{
            build_type1, build_type3, client_challenge, compute_ntlmv2, filetime_now,
            parse_type2,
        },
        spnego::{unwrap_response_token, wrap_neg_token_init, wrap_neg_token_resp},
    },
    error::{ErrorKind, ProbeError, Result, WireCode},
    models::smb2::{
        create::{
            CreateInfo, CreateParams, attribute_names, build_close, build_create,
            parse_create_response,
        },
        header::{
            CMD_CLOSE, CMD_CREATE, CMD_LOGOFF, CMD_NEGOTIATE, CMD_QUERY_DIRECTORY,
            CMD_READ, CMD_SESSION_SETUP, CMD_TREE_CONNECT, CMD_TREE_DISCONNECT,
            CMD_WRITE, STATUS_FILE_IS_A_DIRECTORY, STATUS_LOGON_FAILURE,
            STATUS_MORE_PROCESSING_REQUIRED, STATUS_SUCCESS, Smb2Header, assemble,
            netbios_wrap, nt_status_text,
        },
        negotiate::{
            NegotiateInfo, build_negotiate, capability_names, parse_negotiate_response,
        },
        query_directory::{
            DirEntry, build_query_directory, parse_query_directory_response,
        },
        read_write::{
            READ_CAP, ReadInfo, build_read, build_write, parse_read_response,
            parse_write_response,
        },
        session_setup::{build_session_setup, parse_session_setup_response},
        tree_connect::{build_tree_connect, parse_tree_connect_response, share_type_text},
    },
    transport::{
        conn::{Target, Transport},
        framing::FrameReader,
        session::with_session_cleanup,
    },
};

#[derive(Debug, Clone)]
pub struct SmbCredentials {
    pub username: String,
    pub password: String,
    pub domain: String,
}

/// Per-session protocol state; owns the message-id counter and the ids the
/// server assigns.
struct SmbConn {
    fr: FrameReader,
    message_id: u64,
    session_id: u64,
    tree_id: u32,
    /// Negotiated MaxReadSize; caps every READ alongside [`READ_CAP`].
    max_read_size: u32,
}

impl SmbConn {
    fn new(cap: usize) -> Self {
        Self {
            fr: FrameReader::new(cap),
            message_id: 0,
            session_id: 0,
            tree_id: 0,
            max_read_size: READ_CAP,
        }
    }

    async fn call(
        &mut self,
        t: &mut Transport,
        command: u16,
        body: &[u8],
    ) -> Result<(Smb2Header, Vec<u8>)> {
        let header =
            Smb2Header::request(command, self.message_id, self.tree_id, self.session_id);
        self.message_id += 1;
        let message = assemble(&header, body);
        t.write_all(&netbios_wrap(&message)).await?;

        let raw = self.fr.read_smb2_message(t).await?;
        let resp_header = Smb2Header::parse(&raw)?;
        Ok((resp_header, raw.to_vec()))
    }

    async fn negotiate(
        &mut self,
        t: &mut Transport,
        cfg: &GatewayConfig,
    ) -> Result<NegotiateInfo> {
        let (header, message) = self
            .call(t, CMD_NEGOTIATE, &build_negotiate(cfg.smb_client_guid_bytes()))
            .await?;
        expect_status(&header, STATUS_SUCCESS, "NEGOTIATE")?;
        let info = parse_negotiate_response(&message)?;
        self.max_read_size = info.max_read_size;
        Ok(info)
    }

    /// Two-leg NTLMv2 session setup. Empty credentials probe for guest or
    /// anonymous access.
    async fn session_setup(
        &mut self,
        t: &mut Transport,
        cfg: &GatewayConfig,
        creds: &SmbCredentials,
    ) -> Result<&'static str> {
        let type1 = build_type1(&creds.domain, &cfg.identity.ntlm_workstation);
        let (header, message) = self
            .call(
                t,
                CMD_SESSION_SETUP,
                &build_session_setup(&wrap_neg_token_init(&type1)),
            )
            .await?;
        if header.status.get() != STATUS_MORE_PROCESSING_REQUIRED {
            return Err(protocol_error(&header, "SESSION_SETUP (Type 1)"));
        }
        // The server assigns the session id on the challenge leg.
        self.session_id = header.session_id.get();
        let setup = parse_session_setup_response(&message)?;
        let type2_raw = unwrap_response_token(&setup.security_buffer)?;
        let type2 = parse_type2(&type2_raw)?;

        let v2 = compute_ntlmv2(
            &creds.username,
            &creds.password,
            &creds.domain,
            &type2.target_name,
            &type2.server_challenge,
            &client_challenge(),
            filetime_now(),
            &type2.target_info,
        );
        let type3 = build_type3(
            &creds.username,
            &creds.domain,
            &cfg.identity.ntlm_workstation,
            &v2,
        );
        let (header, message) = self
            .call(
                t,
                CMD_SESSION_SETUP,
                &build_session_setup(&wrap_neg_token_resp(&type3)),
            )
            .await?;
        match header.status.get() {
            STATUS_SUCCESS => {},
            STATUS_LOGON_FAILURE => {
                return Err(ProbeError::auth_fail(format!(
                    "logon failed for {:?}",
                    creds.username
                ))
                .with_code(WireCode::NtStatus(STATUS_LOGON_FAILURE)));
            },
            other => {
                return Err(ProbeError::protocol(format!(
                    "SESSION_SETUP (Type 3) returned {}",
                    nt_status_text(other)
                ))
                .with_code(WireCode::NtStatus(other)));
            },
        }
        let setup = parse_session_setup_response(&message)?;
        Ok(setup.flags_text())
    }

    async fn tree_connect(
        &mut self,
        t: &mut Transport,
        host: &str,
        share: &str,
    ) -> Result<&'static str> {
        let (header, message) = self
            .call(t, CMD_TREE_CONNECT, &build_tree_connect(host, share))
            .await?;
        expect_status(&header, STATUS_SUCCESS, "TREE_CONNECT")?;
        self.tree_id = header.tree_id.get();
        let info = parse_tree_connect_response(&message)?;
        Ok(share_type_text(info.share_type))
    }

    async fn create(
        &mut self,
        t: &mut Transport,
        params: &CreateParams<'_>,
    ) -> Result<CreateInfo> {
        let (header, message) = self.call(t, CMD_CREATE, &build_create(params)).await?;
        expect_status(&header, STATUS_SUCCESS, "CREATE")?;
        parse_create_response(&message)
    }

    async fn close(&mut self, t: &mut Transport, file_id: [u8; 16]) -> Result<()> {
        let (header, _) = self.call(t, CMD_CLOSE, &build_close(file_id)).await?;
        expect_status(&header, STATUS_SUCCESS, "CLOSE")
    }

    /// Best-effort goodbye, each leg on its own.
    async fn goodbye(&mut self, t: &mut Transport) {
        if self.tree_id != 0 {
            let body = [4u8, 0, 0, 0]; // StructureSize 4
            if let Err(e) = self.call(t, CMD_TREE_DISCONNECT, &body).await {
                debug!("TREE_DISCONNECT failed: {e}");
            }
            self.tree_id = 0;
        }
        if self.session_id != 0 {
            let body = [4u8, 0, 0, 0];
            if let Err(e) = self.call(t, CMD_LOGOFF, &body).await {
                debug!("LOGOFF failed: {e}");
            }
        }
    }
}

fn expect_status(header: &Smb2Header, wanted: u32, label: &str) -> Result<()> {
    if header.status.get() == wanted {
        Ok(())
    } else {
        Err(protocol_error(header, label))
    }
}

fn protocol_error(header: &Smb2Header, label: &str) -> ProbeError {
    let status = header.status.get();
    ProbeError::protocol(format!("{label} returned {}", nt_status_text(status)))
        .with_code(WireCode::NtStatus(status))
}

/// Refuse servers that mandate signing; the probe cannot sign.
fn check_signing(info: &NegotiateInfo) -> Result<()> {
    if info.signing_required {
        return Err(ProbeError::new(
            ErrorKind::AuthFail,
            "server requires message signing, which the probe does not perform",
        ));
    }
    Ok(())
}

/// Shared scaffold: negotiate, refuse signing-mandatory servers, NTLMv2
/// session setup, run the body, then tree-disconnect/logoff best-effort.
/// The connection state sits in a `RefCell` so the cleanup closure can
/// reach it; sessions are single-tasked, so borrows never overlap.
async fn run_share_op<R>(
    cfg: &GatewayConfig,
    target: &Target,
    creds: &SmbCredentials,
    body: impl AsyncFnOnce(&mut SmbConn, &mut Transport, &str) -> Result<R>,
) -> Result<(String, String, R)> {
    let cap = cfg.caps.smb_message;
    let host = target.host.clone();
    let creds = creds.clone();

    let conn = RefCell::new(SmbConn::new(cap));
    let conn_ref = &conn;

    with_session_cleanup(
        target,
        async |t| {
            conn_ref.borrow_mut().goodbye(t).await;
            Ok(())
        },
        async |t| {
            let mut c = conn_ref.borrow_mut();
            let info = c.negotiate(t, cfg).await?;
            check_signing(&info)?;
            let flags = c.session_setup(t, cfg, &creds).await?;
            let result = body(&mut c, t, &host).await?;
            Ok((info.dialect_name, flags.to_string(), result))
        },
    )
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmbProbeResult {
    pub dialect: String,
    pub signing_required: bool,
    pub capabilities: Vec<&'static str>,
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    pub server_time: Option<String>,
    pub server_start_time: Option<String>,
    pub server_guid: String,
}

/// NEGOTIATE only: dialect, capabilities, server clock.
pub async fn probe(cfg: &GatewayConfig, target: &Target) -> Result<SmbProbeResult> {
    let cap = cfg.caps.smb_message;
    with_session_cleanup(
        target,
        async |_t| Ok(()),
        async |t| {
            let mut conn = SmbConn::new(cap);
            let info = conn.negotiate(t, cfg).await?;
            Ok(SmbProbeResult {
                dialect: info.dialect_name,
                signing_required: info.signing_required,
                capabilities: capability_names(info.capabilities),
                max_transact_size: info.max_transact_size,
                max_read_size: info.max_read_size,
                max_write_size: info.max_write_size,
                server_time: info.system_time,
                server_start_time: info.server_start_time,
                server_guid: hex::encode(info.server_guid),
            })
        },
    )
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmbSessionResult {
    pub dialect: String,
    pub session_flags: String,
    pub share_type: Option<String>,
}

/// Full authentication probe; optionally connects a share to verify access.
pub async fn session(
    cfg: &GatewayConfig,
    target: &Target,
    creds: &SmbCredentials,
    share: Option<&str>,
) -> Result<SmbSessionResult> {
    let (dialect, session_flags, share_type) =
        run_share_op(cfg, target, creds, async |conn, t, host| {
            match share {
                Some(share) => Ok(Some(conn.tree_connect(t, host, share).await?.to_string())),
                None => Ok(None),
            }
        })
        .await?;
    Ok(SmbSessionResult {
        dialect,
        session_flags,
        share_type,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmbDirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub created: Option<String>,
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmbListResult {
    pub share_type: String,
    pub entries: Vec<SmbDirEntry>,
}

/// Directory listing via CREATE + QUERY_DIRECTORY + CLOSE.
pub async fn list(
    cfg: &GatewayConfig,
    target: &Target,
    creds: &SmbCredentials,
    share: &str,
    path: &str,
) -> Result<SmbListResult> {
    let path = path.trim_start_matches(['/', '\\']).to_string();
    let (_, _, result) = run_share_op(cfg, target, creds, async |conn, t, host| {
        let share_type = conn.tree_connect(t, host, share).await?.to_string();

        let create = conn.create(t, &CreateParams::open_directory(&path)).await?;
        let (hdr, message) = conn
            .call(
                t,
                CMD_QUERY_DIRECTORY,
                &build_query_directory(create.file_id, "*"),
            )
            .await?;
        expect_status(&hdr, STATUS_SUCCESS, "QUERY_DIRECTORY")?;
        let entries: Vec<SmbDirEntry> = parse_query_directory_response(&message)?
            .into_iter()
            .filter(|e: &DirEntry| e.name != "." && e.name != "..")
            .map(|e| SmbDirEntry {
                name: e.name,
                is_dir: e.is_dir,
                size: e.size,
                created: e.created,
                modified: e.modified,
            })
            .collect();
        conn.close(t, create.file_id).await?;

        Ok(SmbListResult {
            share_type,
            entries,
        })
    })
    .await?;
    Ok(result)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmbReadResult {
    pub bytes_read: usize,
    pub is_text: bool,
    /// UTF-8 text in full, or base64 of the first KiB for binary content.
    pub content: String,
    pub content_truncated: bool,
}

/// Binary content in the JSON response is capped at this many raw bytes.
const BINARY_CONTENT_CAP: usize = 1024;

/// Read a file: CREATE + READ + CLOSE. The read length is capped at
/// `min(64 KiB, MaxReadSize)`.
pub async fn read(
    cfg: &GatewayConfig,
    target: &Target,
    creds: &SmbCredentials,
    share: &str,
    path: &str,
) -> Result<SmbReadResult> {
    let path = path.trim_start_matches(['/', '\\']).to_string();
    let (_, _, result) = run_share_op(cfg, target, creds, async |conn, t, host| {
        conn.tree_connect(t, host, share).await?;

        let create = conn.create(t, &CreateParams::read_file(&path)).await?;
        let want = READ_CAP
            .min(conn.max_read_size)
            .min(create.end_of_file as u32);
        let info = if want > 0 {
            let (hdr, message) = conn
                .call(t, CMD_READ, &build_read(create.file_id, 0, want))
                .await?;
            expect_status(&hdr, STATUS_SUCCESS, "READ")?;
            parse_read_response(&message)?
        } else {
            ReadInfo {
                data: Vec::new(),
                remaining: 0,
            }
        };
        conn.close(t, create.file_id).await?;

        let bytes_read = info.data.len();
        match String::from_utf8(info.data) {
            Ok(text) => Ok(SmbReadResult {
                bytes_read,
                is_text: true,
                content: text,
                content_truncated: false,
            }),
            Err(e) => {
                let data = e.into_bytes();
                let capped = &data[..data.len().min(BINARY_CONTENT_CAP)];
                Ok(SmbReadResult {
                    bytes_read,
                    is_text: false,
                    content: BASE64.encode(capped),
                    content_truncated: data.len() > BINARY_CONTENT_CAP,
                })
            },
        }
    })
    .await?;
    Ok(result)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmbWriteResult {
    pub bytes_written: u32,
}

/// Write a file: CREATE (overwrite-if) + WRITE + CLOSE.
pub async fn write(
    cfg: &GatewayConfig,
    target: &Target,
    creds: &SmbCredentials,
    share: &str,
    path: &str,
    content: Vec<u8>,
) -> Result<SmbWriteResult> {
    let path = path.trim_start_matches(['/', '\\']).to_string();
    let (_, _, result) = run_share_op(cfg, target, creds, async |conn, t, host| {
        conn.tree_connect(t, host, share).await?;

        let create = conn.create(t, &CreateParams::write_file(&path)).await?;
        let (hdr, message) = conn
            .call(t, CMD_WRITE, &build_write(create.file_id, 0, &content))
            .await?;
        expect_status(&hdr, STATUS_SUCCESS, "WRITE")?;
        let bytes_written = parse_write_response(&message)?;
        conn.close(t, create.file_id).await?;

        Ok(SmbWriteResult { bytes_written })
    })
    .await?;
    Ok(result)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmbStatResult {
    pub exists: bool,
    pub is_dir: bool,
    pub size: u64,
    pub attributes: Vec<&'static str>,
    pub created: Option<String>,
    pub modified: Option<String>,
}

/// Stat: try as file; on a directory status, retry as directory.
pub async fn stat(
    cfg: &GatewayConfig,
    target: &Target,
    creds: &SmbCredentials,
    share: &str,
    path: &str,
) -> Result<SmbStatResult> {
    let path = path.trim_start_matches(['/', '\\']).to_string();
    let (_, _, result) = run_share_op(cfg, target, creds, async |conn, t, host| {
        conn.tree_connect(t, host, share).await?;

        let as_file = conn.create(t, &CreateParams::read_file(&path)).await;
        let create = match as_file {
            Ok(c) => c,
            Err(e)
                if e.code == Some(WireCode::NtStatus(STATUS_FILE_IS_A_DIRECTORY)) =>
            {
                conn.create(t, &CreateParams::open_directory(&path)).await?
            },
            Err(e) => return Err(e),
        };
        let info = SmbStatResult {
            exists: true,
            is_dir: create.is_directory(),
            size: create.end_of_file,
            attributes: attribute_names(create.attributes),
            created: create.created.clone(),
            modified: create.last_written.clone(),
        };
        conn.close(t, create.file_id).await?;
        Ok(info)
    })
    .await?;
    Ok(result)
}
