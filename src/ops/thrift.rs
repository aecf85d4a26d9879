// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::Serialize;

use crate::{
    cfg::config::GatewayConfig,
    error::{ProbeError, Result},
    models::thrift::{
        MSG_CALL, MSG_EXCEPTION, StructWriter, build_message, frame, msg_type_name,
        parse_message,
    },
    transport::{conn::Target, framing::FrameReader, session::with_session},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThriftCallResult {
    pub method: String,
    pub seq_id: i32,
    pub msg_type: String,
    pub is_exception: bool,
    /// Decoded reply fields as `[id, value]` pairs.
    pub fields: Vec<serde_json::Value>,
}

/// Encode positional JSON arguments as fields 1..N of the call struct.
fn encode_args(args: &[serde_json::Value]) -> Result<Vec<u8>> {
    let mut body = StructWriter::new();
    for (i, arg) in args.iter().enumerate() {
        let id = (i + 1) as i16;
        match arg {
            serde_json::Value::Bool(b) => {
                body.bool_field(id, *b);
            },
            serde_json::Value::String(s) => {
                body.string_field(id, s);
            },
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    if v >= i32::MIN as i64 && v <= i32::MAX as i64 {
                        body.i32_field(id, v as i32);
                    } else {
                        body.i64_field(id, v);
                    }
                } else {
                    body.double_field(id, n.as_f64().unwrap_or(0.0));
                }
            },
            other => {
                return Err(ProbeError::validation(format!(
                    "unsupported thrift argument: {other}"
                )));
            },
        }
    }
    Ok(body.finish())
}

/// One framed call/response. An EXCEPTION reply is a successful probe
/// result, not a transport failure.
pub async fn call(
    cfg: &GatewayConfig,
    target: &Target,
    method: &str,
    args: &[serde_json::Value],
) -> Result<ThriftCallResult> {
    let cap = cfg.caps.frame_response;
    let body = encode_args(args)?;
    let payload = build_message(method, MSG_CALL, 1, &body);
    let wire = frame(&payload);
    with_session(target, async |t| {
        t.write_all(&wire).await?;

        let mut fr = FrameReader::new(cap);
        let reply = fr.read_u32_be_frame(t).await?;
        let msg = parse_message(&reply)?;

        Ok(ThriftCallResult {
            method: msg.method.clone(),
            seq_id: msg.seq_id,
            msg_type: msg_type_name(msg.msg_type).to_string(),
            is_exception: msg.msg_type == MSG_EXCEPTION,
            fields: msg
                .fields
                .iter()
                .map(|f| serde_json::json!([f.id, f.value.render()]))
                .collect(),
        })
    })
    .await
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThriftProbeResult {
    pub speaks_thrift: bool,
    pub msg_type: String,
    pub is_exception: bool,
}

/// Fire a `ping` call; any well-formed framed reply (REPLY or EXCEPTION)
/// proves a Thrift binary-protocol server.
pub async fn probe(cfg: &GatewayConfig, target: &Target) -> Result<ThriftProbeResult> {
    let result = call(cfg, target, "ping", &[]).await?;
    Ok(ThriftProbeResult {
        speaks_thrift: true,
        msg_type: result.msg_type,
        is_exception: result.is_exception,
    })
}
