// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! iSCSI login and discovery. Discovery is a single Operational→FullFeature
//! login plus one SendTargets exchange; authenticated logins walk the
//! Security stage with CHAP (MD5 only). No Logout PDU is sent; the session
//! ends when the socket closes.

use serde::Serialize;
use tracing::debug;
use zerocopy::IntoBytes;

use crate::{
    cfg::config::GatewayConfig,
    crypto::chap::{chap_response_hex, decode_chap_challenge},
    error::{ErrorKind, ProbeError, Result, WireCode},
    models::iscsi::{
        bhs::{
            BasicSegment, HEADER_LEN, ISID, LoginRequestBuilder, LoginResponse,
            ResponsePdu, Stage, TextRequest, encode_pdu, parse_response_bhs,
        },
        keys::{
            DiscoveredTarget, build_kv, parse_chap_challenge_keys, parse_kv_map,
            parse_send_targets,
        },
        status::login_status_text,
    },
    transport::{
        conn::{Target, Transport},
        framing::FrameReader,
        session::with_session,
    },
};

async fn read_pdu(
    t: &mut Transport,
    fr: &mut FrameReader,
) -> Result<(ResponsePdu, Vec<u8>)> {
    let bhs = fr.read_exact_n(t, HEADER_LEN).await?;
    let pdu = parse_response_bhs(&bhs)?;
    let dlen = pdu.data_segment_len();
    let padded = dlen.div_ceil(4) * 4;
    let data = if padded > 0 {
        fr.read_exact_n(t, padded).await?[..dlen].to_vec()
    } else {
        Vec::new()
    };
    Ok((pdu, data))
}

/// Expect a Login Response; Rejects and other PDUs are typed errors.
fn expect_login(pdu: ResponsePdu) -> Result<LoginResponse> {
    match pdu {
        ResponsePdu::LoginResponse(r) => Ok(r),
        ResponsePdu::Reject(r) => Err(ProbeError::protocol(format!(
            "target rejected login PDU (reason 0x{:02x})",
            r.reason
        ))),
        other => Err(ProbeError::unexpected(format!(
            "expected Login Response, got opcode 0x{:02x}",
            other.opcode()
        ))),
    }
}

/// Fail unless the login status class is 0; auth rejections keep their
/// wire code but map to `AUTH_FAIL`.
fn check_login_status(resp: &LoginResponse) -> Result<()> {
    let class = resp.status_class;
    let detail = resp.status_detail;
    if class == 0 {
        return Ok(());
    }
    let kind = if class == 2 && detail == 0x01 {
        ErrorKind::AuthFail
    } else {
        ErrorKind::ProtocolError
    };
    Err(
        ProbeError::new(kind, login_status_text(class, detail)).with_code(
            WireCode::IscsiLogin { class, detail },
        ),
    )
}

fn identity_keys(cfg: &GatewayConfig, session_type: &str, target_name: Option<&str>) -> Vec<(String, String)> {
    let mut keys = vec![
        ("InitiatorName".to_string(), cfg.identity.iscsi_initiator_name.clone()),
        ("SessionType".to_string(), session_type.to_string()),
    ];
    if let Some(name) = target_name {
        keys.push(("TargetName".to_string(), name.to_string()));
    }
    keys
}

fn operational_keys() -> Vec<(String, String)> {
    vec![
        ("AuthMethod".to_string(), "None".to_string()),
        ("HeaderDigest".to_string(), "None".to_string()),
        ("DataDigest".to_string(), "None".to_string()),
        ("MaxRecvDataSegmentLength".to_string(), "65536".to_string()),
    ]
}

fn kv_bytes(keys: &[(String, String)]) -> Vec<u8> {
    let pairs: Vec<(&str, &str)> = keys
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    build_kv(&pairs)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IscsiTargetEntry {
    pub name: String,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IscsiDiscoverResult {
    pub is_iscsi: bool,
    pub login_status: String,
    pub tsih: u16,
    pub targets: Vec<IscsiTargetEntry>,
}

/// Discovery session: login straight to FullFeature, then SendTargets=All.
pub async fn discover(cfg: &GatewayConfig, target: &Target) -> Result<IscsiDiscoverResult> {
    let cap = cfg.caps.text_response;
    let mut keys = identity_keys(cfg, "Discovery", None);
    keys.extend(operational_keys());
    let data = kv_bytes(&keys);
    with_session(target, async |t| {
        let mut fr = FrameReader::new(cap);

        let builder = LoginRequestBuilder::new(ISID, 0)
            .transit()
            .csg(Stage::Operational)
            .nsg(Stage::FullFeature)
            .initiator_task_tag(1)
            .connection_id(0)
            .cmd_sn(1)
            .exp_stat_sn(0);
        let mut bhs = [0u8; HEADER_LEN];
        bhs.copy_from_slice(builder.header.as_bytes());
        t.write_all(&encode_pdu(bhs, &data)).await?;

        let (pdu, _login_data) = read_pdu(t, &mut fr).await?;
        let login = expect_login(pdu)?;
        check_login_status(&login)?;
        if !login.transit() || login.nsg() != Stage::FullFeature as u8 {
            debug!(flags = login.flags, "target did not transit to FullFeature");
        }

        let text = TextRequest::new(
            2,
            login.exp_cmd_sn.get(),
            login.stat_sn.get().wrapping_add(1),
        );
        let mut text_bhs = [0u8; HEADER_LEN];
        text_bhs.copy_from_slice(text.as_bytes());
        t.write_all(&encode_pdu(text_bhs, &build_kv(&[("SendTargets", "All")])))
            .await?;

        let (pdu, text_data) = read_pdu(t, &mut fr).await?;
        let targets: Vec<IscsiTargetEntry> = match pdu {
            ResponsePdu::TextResponse(_) => parse_send_targets(&text_data)
                .into_iter()
                .map(|dt: DiscoveredTarget| IscsiTargetEntry {
                    name: dt.name,
                    addresses: dt.addresses,
                })
                .collect(),
            ResponsePdu::Reject(r) => {
                return Err(ProbeError::protocol(format!(
                    "target rejected SendTargets (reason 0x{:02x})",
                    r.reason
                )));
            },
            other => {
                return Err(ProbeError::unexpected(format!(
                    "expected Text Response, got opcode 0x{:02x}",
                    other.opcode()
                )));
            },
        };

        Ok(IscsiDiscoverResult {
            is_iscsi: true,
            login_status: login_status_text(login.status_class, login.status_detail),
            tsih: login.tsih.get(),
            targets,
        })
    })
    .await
}

#[derive(Debug, Clone)]
pub struct IscsiLoginParams {
    /// Presence selects a Normal session; absence keeps Discovery. The
    /// value is also sent as the TargetName key.
    pub target_name: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IscsiLoginResult {
    pub login_ok: bool,
    pub login_status: String,
    pub auth_method: String,
    pub tsih: u16,
}

/// Login probe, optionally through the CHAP security stage.
pub async fn login(
    cfg: &GatewayConfig,
    target: &Target,
    params: &IscsiLoginParams,
) -> Result<IscsiLoginResult> {
    let cap = cfg.caps.text_response;
    let session_type = if params.target_name.is_some() {
        "Normal"
    } else {
        "Discovery"
    };
    let use_chap = params.username.is_some() && params.secret.is_some();
    let identity = identity_keys(cfg, session_type, params.target_name.as_deref());
    let params = params.clone();
    with_session(target, async |t| {
        let mut fr = FrameReader::new(cap);

        if !use_chap {
            let mut keys = identity.clone();
            keys.extend(operational_keys());
            let builder = LoginRequestBuilder::new(ISID, 0)
                .transit()
                .csg(Stage::Operational)
                .nsg(Stage::FullFeature)
                .initiator_task_tag(1)
                .connection_id(0)
                .cmd_sn(1)
                .exp_stat_sn(0);
            let mut bhs = [0u8; HEADER_LEN];
            bhs.copy_from_slice(builder.header.as_bytes());
            t.write_all(&encode_pdu(bhs, &kv_bytes(&keys))).await?;

            let (pdu, _) = read_pdu(t, &mut fr).await?;
            let login = expect_login(pdu)?;
            check_login_status(&login)?;
            return Ok(IscsiLoginResult {
                login_ok: true,
                login_status: login_status_text(login.status_class, login.status_detail),
                auth_method: "None".to_string(),
                tsih: login.tsih.get(),
            });
        }

        // Security stage: offer CHAP, let the target pick.
        let mut keys = identity.clone();
        keys.push(("AuthMethod".to_string(), "CHAP,None".to_string()));
        let builder = LoginRequestBuilder::new(ISID, 0)
            .csg(Stage::Security)
            .nsg(Stage::Operational)
            .initiator_task_tag(1)
            .connection_id(0)
            .cmd_sn(1)
            .exp_stat_sn(0);
        let mut bhs = [0u8; HEADER_LEN];
        bhs.copy_from_slice(builder.header.as_bytes());
        t.write_all(&encode_pdu(bhs, &kv_bytes(&keys))).await?;

        let (pdu, data) = read_pdu(t, &mut fr).await?;
        let resp = expect_login(pdu)?;
        check_login_status(&resp)?;
        let chosen = parse_kv_map(&data)
            .get("AuthMethod")
            .cloned()
            .unwrap_or_else(|| "None".to_string());

        let mut last = resp;
        if chosen == "CHAP" {
            // Announce the only algorithm we speak.
            let builder = LoginRequestBuilder::new(ISID, last.tsih.get())
                .csg(Stage::Security)
                .nsg(Stage::Operational)
                .initiator_task_tag(1)
                .connection_id(0)
                .cmd_sn(last.exp_cmd_sn.get())
                .exp_stat_sn(last.stat_sn.get().wrapping_add(1));
            let mut bhs = [0u8; HEADER_LEN];
            bhs.copy_from_slice(builder.header.as_bytes());
            t.write_all(&encode_pdu(bhs, &build_kv(&[("CHAP_A", "5")]))).await?;

            let (pdu, data) = read_pdu(t, &mut fr).await?;
            last = expect_login(pdu)?;
            check_login_status(&last)?;

            let map = parse_kv_map(&data);
            if let Some(a) = map.get("CHAP_A") {
                if a.trim() != "5" {
                    return Err(ProbeError::protocol(format!(
                        "target requires CHAP_A={a}, only CHAP_A=5 (MD5) is supported"
                    )));
                }
            }
            let (chap_id, chap_c) = parse_chap_challenge_keys(&data)?;
            let challenge = decode_chap_challenge(&chap_c)?;

            let user = params.username.as_deref().unwrap_or_default();
            let secret = params.secret.as_deref().unwrap_or_default();
            let chap_r = chap_response_hex(chap_id, secret.as_bytes(), &challenge);

            let builder = LoginRequestBuilder::new(ISID, last.tsih.get())
                .transit()
                .csg(Stage::Security)
                .nsg(Stage::Operational)
                .initiator_task_tag(1)
                .connection_id(0)
                .cmd_sn(last.exp_cmd_sn.get())
                .exp_stat_sn(last.stat_sn.get().wrapping_add(1));
            let mut bhs = [0u8; HEADER_LEN];
            bhs.copy_from_slice(builder.header.as_bytes());
            t.write_all(&encode_pdu(
                bhs,
                &build_kv(&[("CHAP_N", user), ("CHAP_R", &chap_r)]),
            ))
            .await?;

            let (pdu, _) = read_pdu(t, &mut fr).await?;
            last = expect_login(pdu)?;
            check_login_status(&last)?;
        }

        // Transition to FullFeature unless the target already moved us.
        if !(last.transit() && last.nsg() == Stage::FullFeature as u8) {
            let mut keys = operational_keys();
            keys.retain(|(k, _)| k != "AuthMethod");
            let builder = LoginRequestBuilder::new(ISID, last.tsih.get())
                .transit()
                .csg(Stage::Operational)
                .nsg(Stage::FullFeature)
                .initiator_task_tag(1)
                .connection_id(0)
                .cmd_sn(last.exp_cmd_sn.get())
                .exp_stat_sn(last.stat_sn.get().wrapping_add(1));
            let mut bhs = [0u8; HEADER_LEN];
            bhs.copy_from_slice(builder.header.as_bytes());
            t.write_all(&encode_pdu(bhs, &kv_bytes(&keys))).await?;

            let (pdu, _) = read_pdu(t, &mut fr).await?;
            last = expect_login(pdu)?;
            check_login_status(&last)?;
        }

        Ok(IscsiLoginResult {
            login_ok: true,
            login_status: login_status_text(last.status_class, last.status_detail),
            auth_method: chosen,
            tsih: last.tsih.get(),
        })
    })
    .await
}
