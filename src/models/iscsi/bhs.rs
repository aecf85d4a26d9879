// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! iSCSI Basic Header Segments for the login/discovery subset: Login
//! Request/Response, Text Request/Response, and Reject. Every BHS is 48
//! bytes; multi-byte fields are big-endian per RFC 7143.

use enum_dispatch::enum_dispatch;
use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U16, U32,
};

use crate::error::{ProbeError, Result};

pub const HEADER_LEN: usize = 48;

pub const OPCODE_LOGIN_REQ: u8 = 0x03;
pub const OPCODE_TEXT_REQ: u8 = 0x04;
pub const OPCODE_LOGIN_RESP: u8 = 0x23;
pub const OPCODE_TEXT_RESP: u8 = 0x24;
pub const OPCODE_REJECT: u8 = 0x3F;

/// Immediate-delivery bit in BHS byte 0.
pub const IMMEDIATE: u8 = 0x40;
const OPCODE_MASK: u8 = 0x3F;

/// Fixed ISID the gateway presents (type/qualifier constant across probes).
pub const ISID: [u8; 6] = [0x00, 0x02, 0x3d, 0x00, 0x00, 0x01];

/// Login negotiation stages (CSG/NSG bit pairs).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Security = 0,
    Operational = 1,
    FullFeature = 3,
}

/// Common accessors every response BHS exposes to the read path.
#[enum_dispatch]
pub trait BasicSegment {
    fn opcode(&self) -> u8;
    fn data_segment_len(&self) -> usize;
    fn initiator_task_tag(&self) -> u32;
}

/// BHS of a Login Request (opcode 0x03, Immediate).
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct LoginRequest {
    pub opcode: u8,                   // 0
    pub flags: u8,                    // 1: T C . . CSG CSG NSG NSG
    pub version_max: u8,              // 2
    pub version_min: u8,              // 3
    pub total_ahs_length: u8,         // 4
    pub data_segment_length: [u8; 3], // 5..8
    pub isid: [u8; 6],                // 8..14
    pub tsih: U16<BigEndian>,         // 14..16
    pub initiator_task_tag: U32<BigEndian>, // 16..20
    pub cid: U16<BigEndian>,          // 20..22
    reserved1: [u8; 2],               // 22..24
    pub cmd_sn: U32<BigEndian>,       // 24..28
    pub exp_stat_sn: U32<BigEndian>,  // 28..32
    reserved2: [u8; 16],              // 32..48
}

/// Chained-setter builder for a Login Request BHS.
#[derive(Debug, Default)]
pub struct LoginRequestBuilder {
    pub header: LoginRequest,
}

impl LoginRequestBuilder {
    pub fn new(isid: [u8; 6], tsih: u16) -> Self {
        let mut header = LoginRequest {
            opcode: OPCODE_LOGIN_REQ | IMMEDIATE,
            isid,
            ..Default::default()
        };
        header.tsih.set(tsih);
        Self { header }
    }

    /// Set Transit (T = bit 7).
    pub fn transit(mut self) -> Self {
        self.header.flags |= 0x80;
        self
    }

    /// Current stage (CSG, bits 2..3).
    pub fn csg(mut self, stage: Stage) -> Self {
        self.header.flags = (self.header.flags & !0x0C) | ((stage as u8) << 2);
        self
    }

    /// Next stage (NSG, bits 0..1).
    pub fn nsg(mut self, stage: Stage) -> Self {
        self.header.flags = (self.header.flags & !0x03) | stage as u8;
        self
    }

    pub fn initiator_task_tag(mut self, tag: u32) -> Self {
        self.header.initiator_task_tag.set(tag);
        self
    }

    pub fn connection_id(mut self, cid: u16) -> Self {
        self.header.cid.set(cid);
        self
    }

    pub fn cmd_sn(mut self, cmd_sn: u32) -> Self {
        self.header.cmd_sn.set(cmd_sn);
        self
    }

    pub fn exp_stat_sn(mut self, exp_stat_sn: u32) -> Self {
        self.header.exp_stat_sn.set(exp_stat_sn);
        self
    }
}

/// BHS of a Login Response (opcode 0x23).
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct LoginResponse {
    pub opcode: u8,
    pub flags: u8,
    pub version_max: u8,
    pub version_active: u8,
    pub total_ahs_length: u8,
    pub data_segment_length: [u8; 3],
    pub isid: [u8; 6],
    pub tsih: U16<BigEndian>,
    pub initiator_task_tag: U32<BigEndian>,
    pub reserved1: [u8; 4],
    pub stat_sn: U32<BigEndian>,
    pub exp_cmd_sn: U32<BigEndian>,
    pub max_cmd_sn: U32<BigEndian>,
    pub status_class: u8,
    pub status_detail: u8,
    pub reserved2: [u8; 10],
}

impl LoginResponse {
    pub fn transit(&self) -> bool {
        self.flags & 0x80 != 0
    }

    pub fn nsg(&self) -> u8 {
        self.flags & 0x03
    }
}

/// BHS of a Text Request (opcode 0x04, Immediate).
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct TextRequest {
    pub opcode: u8,
    pub flags: u8, // F C . . . . . .
    reserved1: [u8; 2],
    pub total_ahs_length: u8,
    pub data_segment_length: [u8; 3],
    pub lun: [u8; 8],
    pub initiator_task_tag: U32<BigEndian>,
    pub target_task_tag: U32<BigEndian>,
    pub cmd_sn: U32<BigEndian>,
    pub exp_stat_sn: U32<BigEndian>,
    reserved2: [u8; 16],
}

impl TextRequest {
    pub fn new(itt: u32, cmd_sn: u32, exp_stat_sn: u32) -> Self {
        let mut h = Self {
            opcode: OPCODE_TEXT_REQ | IMMEDIATE,
            flags: 0x80, // Final
            ..Default::default()
        };
        h.initiator_task_tag.set(itt);
        h.target_task_tag.set(0xFFFF_FFFF);
        h.cmd_sn.set(cmd_sn);
        h.exp_stat_sn.set(exp_stat_sn);
        h
    }
}

/// BHS of a Text Response (opcode 0x24).
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct TextResponse {
    pub opcode: u8,
    pub flags: u8,
    pub reserved1: [u8; 2],
    pub total_ahs_length: u8,
    pub data_segment_length: [u8; 3],
    pub lun: [u8; 8],
    pub initiator_task_tag: U32<BigEndian>,
    pub target_task_tag: U32<BigEndian>,
    pub stat_sn: U32<BigEndian>,
    pub exp_cmd_sn: U32<BigEndian>,
    pub max_cmd_sn: U32<BigEndian>,
    pub reserved2: [u8; 12],
}

/// BHS of a Reject PDU (opcode 0x3F).
#[repr(C)]
#[derive(Debug, Default, Clone, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct Reject {
    pub opcode: u8,
    pub flags: u8,
    pub reason: u8,
    reserved1: u8,
    pub total_ahs_length: u8,
    pub data_segment_length: [u8; 3],
    reserved2: [u8; 16],
    pub stat_sn: U32<BigEndian>,
    pub exp_cmd_sn: U32<BigEndian>,
    pub max_cmd_sn: U32<BigEndian>,
    pub data_sn: U32<BigEndian>,
    reserved3: [u8; 8],
}

macro_rules! impl_basic_segment {
    ($t:ty) => {
        impl BasicSegment for $t {
            fn opcode(&self) -> u8 {
                self.opcode & OPCODE_MASK
            }

            fn data_segment_len(&self) -> usize {
                u32::from_be_bytes([
                    0,
                    self.data_segment_length[0],
                    self.data_segment_length[1],
                    self.data_segment_length[2],
                ]) as usize
            }

            fn initiator_task_tag(&self) -> u32 {
                self.initiator_task_tag.get()
            }
        }
    };
}

impl_basic_segment!(LoginRequest);
impl_basic_segment!(LoginResponse);
impl_basic_segment!(TextRequest);
impl_basic_segment!(TextResponse);

impl BasicSegment for Reject {
    fn opcode(&self) -> u8 {
        self.opcode & OPCODE_MASK
    }

    fn data_segment_len(&self) -> usize {
        u32::from_be_bytes([
            0,
            self.data_segment_length[0],
            self.data_segment_length[1],
            self.data_segment_length[2],
        ]) as usize
    }

    fn initiator_task_tag(&self) -> u32 {
        0xFFFF_FFFF
    }
}

/// Any response BHS the probe operations may receive.
#[enum_dispatch(BasicSegment)]
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePdu {
    LoginResponse(LoginResponse),
    TextResponse(TextResponse),
    Reject(Reject),
}

/// Classify a received 48-byte BHS by opcode.
pub fn parse_response_bhs(buf: &[u8]) -> Result<ResponsePdu> {
    if buf.len() != HEADER_LEN {
        return Err(ProbeError::malformed(format!(
            "iSCSI BHS must be {HEADER_LEN} bytes, got {}",
            buf.len()
        )));
    }
    let opcode = buf[0] & OPCODE_MASK;
    match opcode {
        OPCODE_LOGIN_RESP => LoginResponse::read_from_bytes(buf)
            .map(ResponsePdu::LoginResponse)
            .map_err(|_| ProbeError::malformed("iSCSI: bad Login Response BHS")),
        OPCODE_TEXT_RESP => TextResponse::read_from_bytes(buf)
            .map(ResponsePdu::TextResponse)
            .map_err(|_| ProbeError::malformed("iSCSI: bad Text Response BHS")),
        OPCODE_REJECT => Reject::read_from_bytes(buf)
            .map(ResponsePdu::Reject)
            .map_err(|_| ProbeError::malformed("iSCSI: bad Reject BHS")),
        other => Err(ProbeError::unexpected(format!(
            "iSCSI: unexpected opcode 0x{other:02x}"
        ))),
    }
}

/// Set the 3-byte DataSegmentLength field.
pub fn set_data_segment_length(field: &mut [u8; 3], len: usize) {
    let be = (len as u32).to_be_bytes();
    field.copy_from_slice(&be[1..4]);
}

/// A request BHS plus its padded data segment, as written to the wire.
pub fn encode_pdu(mut bhs: [u8; HEADER_LEN], data: &[u8]) -> Vec<u8> {
    let be = (data.len() as u32).to_be_bytes();
    bhs[5..8].copy_from_slice(&be[1..4]);
    let padded = data.len().div_ceil(4) * 4;
    let mut out = Vec::with_capacity(HEADER_LEN + padded);
    out.extend_from_slice(&bhs);
    out.extend_from_slice(data);
    out.resize(HEADER_LEN + padded, 0);
    out
}
