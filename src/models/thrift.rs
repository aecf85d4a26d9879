// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Thrift Binary Protocol v1 over the framed transport. The writer covers
//! scalars and strings; the reader additionally walks containers with a
//! 20-element cap. Nested STRUCT values are skipped by advancing a fixed
//! 100 bytes, so deeply structured replies decode only approximately.

use crate::{
    codec::buf::{ByteReader, ByteWriter},
    error::{ProbeError, Result},
};

pub const VERSION_1: u32 = 0x8001_0000;

pub const MSG_CALL: u8 = 1;
pub const MSG_REPLY: u8 = 2;
pub const MSG_EXCEPTION: u8 = 3;
pub const MSG_ONEWAY: u8 = 4;

pub const TYPE_STOP: u8 = 0;
pub const TYPE_BOOL: u8 = 2;
pub const TYPE_BYTE: u8 = 3;
pub const TYPE_DOUBLE: u8 = 4;
pub const TYPE_I16: u8 = 6;
pub const TYPE_I32: u8 = 8;
pub const TYPE_I64: u8 = 10;
pub const TYPE_STRING: u8 = 11;
pub const TYPE_STRUCT: u8 = 12;
pub const TYPE_MAP: u8 = 13;
pub const TYPE_SET: u8 = 14;
pub const TYPE_LIST: u8 = 15;

/// Containers larger than this decode only their first elements.
const CONTAINER_CAP: usize = 20;
/// Bytes to advance past a nested STRUCT value.
const STRUCT_SKIP: usize = 100;

pub fn msg_type_name(t: u8) -> &'static str {
    match t {
        MSG_CALL => "CALL",
        MSG_REPLY => "REPLY",
        MSG_EXCEPTION => "EXCEPTION",
        MSG_ONEWAY => "ONEWAY",
        _ => "UNKNOWN",
    }
}

/// Struct-body writer: scalar fields and strings, closed by a stop byte.
#[derive(Debug, Default)]
pub struct StructWriter {
    w: ByteWriter,
}

impl StructWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn field_header(&mut self, field_type: u8, id: i16) -> &mut Self {
        self.w.u8(field_type);
        self.w.i16_be(id);
        self
    }

    pub fn bool_field(&mut self, id: i16, v: bool) -> &mut Self {
        self.field_header(TYPE_BOOL, id);
        self.w.u8(v as u8);
        self
    }

    pub fn byte_field(&mut self, id: i16, v: u8) -> &mut Self {
        self.field_header(TYPE_BYTE, id);
        self.w.u8(v);
        self
    }

    pub fn i16_field(&mut self, id: i16, v: i16) -> &mut Self {
        self.field_header(TYPE_I16, id);
        self.w.i16_be(v);
        self
    }

    pub fn i32_field(&mut self, id: i16, v: i32) -> &mut Self {
        self.field_header(TYPE_I32, id);
        self.w.i32_be(v);
        self
    }

    pub fn i64_field(&mut self, id: i16, v: i64) -> &mut Self {
        self.field_header(TYPE_I64, id);
        self.w.i64_be(v);
        self
    }

    pub fn double_field(&mut self, id: i16, v: f64) -> &mut Self {
        self.field_header(TYPE_DOUBLE, id);
        self.w.u64_be(v.to_bits());
        self
    }

    pub fn string_field(&mut self, id: i16, v: &str) -> &mut Self {
        self.field_header(TYPE_STRING, id);
        self.w.i32_be(v.len() as i32);
        self.w.bytes(v.as_bytes());
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.w.u8(TYPE_STOP);
        self.w.into_bytes()
    }
}

/// One message payload (not yet framed): version+type, method, seqId, body.
pub fn build_message(method: &str, msg_type: u8, seq_id: i32, body: &[u8]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(12 + method.len() + body.len());
    w.u32_be(VERSION_1 | msg_type as u32);
    w.i32_be(method.len() as i32);
    w.bytes(method.as_bytes());
    w.i32_be(seq_id);
    w.bytes(body);
    w.into_bytes()
}

/// Prefix with the 4-byte big-endian frame length.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(payload.len() + 4);
    w.u32_be(payload.len() as u32);
    w.bytes(payload);
    w.into_bytes()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThriftValue {
    Bool(bool),
    Byte(u8),
    Double(f64),
    I16(i16),
    I32(i32),
    I64(i64),
    Str(String),
    /// Nested struct, skipped rather than decoded.
    StructSkipped,
    List(Vec<ThriftValue>),
    Map(Vec<(ThriftValue, ThriftValue)>),
}

impl ThriftValue {
    pub fn render(&self) -> serde_json::Value {
        match self {
            ThriftValue::Bool(v) => serde_json::json!(v),
            ThriftValue::Byte(v) => serde_json::json!(v),
            ThriftValue::Double(v) => serde_json::json!(v),
            ThriftValue::I16(v) => serde_json::json!(v),
            ThriftValue::I32(v) => serde_json::json!(v),
            ThriftValue::I64(v) => serde_json::json!(v),
            ThriftValue::Str(v) => serde_json::json!(v),
            ThriftValue::StructSkipped => serde_json::json!("<struct>"),
            ThriftValue::List(items) => {
                serde_json::Value::Array(items.iter().map(ThriftValue::render).collect())
            },
            ThriftValue::Map(pairs) => serde_json::Value::Array(
                pairs
                    .iter()
                    .map(|(k, v)| serde_json::json!([k.render(), v.render()]))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThriftField {
    pub id: i16,
    pub value: ThriftValue,
}

#[derive(Debug, Clone)]
pub struct ThriftMessage {
    pub msg_type: u8,
    pub method: String,
    pub seq_id: i32,
    pub fields: Vec<ThriftField>,
}

/// Parse a whole message payload (frame prefix already stripped).
pub fn parse_message(payload: &[u8]) -> Result<ThriftMessage> {
    let mut r = ByteReader::new(payload);
    let version_and_type = r.u32_be()?;
    if version_and_type & 0xFFFF_0000 != VERSION_1 {
        return Err(ProbeError::malformed(format!(
            "thrift: not a binary protocol v1 message (0x{version_and_type:08x})"
        )));
    }
    let msg_type = (version_and_type & 0xFF) as u8;
    let name_len = r.i32_be()?;
    if name_len < 0 || name_len as usize > r.remaining() {
        return Err(ProbeError::malformed("thrift: method name length"));
    }
    let method = String::from_utf8_lossy(r.take(name_len as usize)?).into_owned();
    let seq_id = r.i32_be()?;
    let fields = parse_struct_fields(&mut r)?;
    Ok(ThriftMessage {
        msg_type,
        method,
        seq_id,
        fields,
    })
}

fn parse_struct_fields(r: &mut ByteReader<'_>) -> Result<Vec<ThriftField>> {
    let mut fields = Vec::new();
    loop {
        let field_type = r.u8()?;
        if field_type == TYPE_STOP {
            return Ok(fields);
        }
        let id = r.i16_be()?;
        let value = parse_value(r, field_type)?;
        fields.push(ThriftField { id, value });
    }
}

fn parse_value(r: &mut ByteReader<'_>, field_type: u8) -> Result<ThriftValue> {
    Ok(match field_type {
        TYPE_BOOL => ThriftValue::Bool(r.u8()? != 0),
        TYPE_BYTE => ThriftValue::Byte(r.u8()?),
        TYPE_DOUBLE => ThriftValue::Double(f64::from_bits(r.u64_be()?)),
        TYPE_I16 => ThriftValue::I16(r.i16_be()?),
        TYPE_I32 => ThriftValue::I32(r.i32_be()?),
        TYPE_I64 => ThriftValue::I64(r.i64_be()?),
        TYPE_STRING => {
            let len = r.i32_be()?;
            if len < 0 || len as usize > r.remaining() {
                return Err(ProbeError::malformed("thrift: string length"));
            }
            ThriftValue::Str(String::from_utf8_lossy(r.take(len as usize)?).into_owned())
        },
        TYPE_STRUCT => {
            // Fixed-size skip keeps the walk bounded on unknown shapes.
            let n = STRUCT_SKIP.min(r.remaining());
            r.skip(n)?;
            ThriftValue::StructSkipped
        },
        TYPE_LIST | TYPE_SET => {
            let elem_type = r.u8()?;
            let size = r.i32_be()?;
            if size < 0 {
                return Err(ProbeError::malformed("thrift: negative container size"));
            }
            let take = (size as usize).min(CONTAINER_CAP);
            let mut items = Vec::with_capacity(take);
            for _ in 0..take {
                items.push(parse_value(r, elem_type)?);
            }
            ThriftValue::List(items)
        },
        TYPE_MAP => {
            let key_type = r.u8()?;
            let val_type = r.u8()?;
            let size = r.i32_be()?;
            if size < 0 {
                return Err(ProbeError::malformed("thrift: negative map size"));
            }
            let take = (size as usize).min(CONTAINER_CAP);
            let mut pairs = Vec::with_capacity(take);
            for _ in 0..take {
                let k = parse_value(r, key_type)?;
                let v = parse_value(r, val_type)?;
                pairs.push((k, v));
            }
            ThriftValue::Map(pairs)
        },
        other => {
            return Err(ProbeError::malformed(format!(
                "thrift: unsupported field type {other}"
            )));
        },
    })
}
