//! Wire framing for the node-to-node datagram protocol.
//!
//! Layout, 7 byte header followed by an opaque payload:
//!
//! ```text
//! [0] version = 1
//! [1] type      DATA = 0x01, ACK = 0x02
//! [2] flags     bit0 = REQUIRE_ACK (DATA only)
//! [3] src       sender NodeId
//! [4] dst       recipient NodeId, 0xFF = broadcast
//! [5] msg id hi
//! [6] msg id lo
//! [7..] payload
//! ```
//!
//! The layout is bit-for-bit fixed; every node on the air depends on it.

use heapless::Vec;

use crate::config::NodeId;

pub const PROTOCOL_VERSION: u8 = 1;

pub const HEADER_LEN: usize = 7;

/// Maximum on-air frame length. Safe at SF7/BW125.
pub const MAX_FRAME_LEN: usize = 64;

pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - HEADER_LEN;

/// Set on a DATA frame when the receiver must answer with an ACK.
pub const FLAG_REQUIRE_ACK: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Data = 0x01,
    Ack = 0x02,
}

impl FrameType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(FrameType::Data),
            0x02 => Some(FrameType::Ack),
            _ => None,
        }
    }
}

/// Command opcodes carried in the first payload byte of a relay-to-remote
/// DATA frame. Any bytes after the opcode are reserved and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    ResetWaterVolume = 0x01,
}

impl CommandType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(CommandType::ResetWaterVolume),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_type: FrameType,
    pub flags: u8,
    pub src: NodeId,
    pub dst: NodeId,
    pub msg_id: u16,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl Frame {
    pub fn data(src: NodeId, dst: NodeId, msg_id: u16, payload: &[u8], require_ack: bool) -> Option<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return None;
        }
        let mut p = Vec::new();
        p.extend_from_slice(payload).ok()?;
        Some(Self {
            frame_type: FrameType::Data,
            flags: if require_ack { FLAG_REQUIRE_ACK } else { 0 },
            src,
            dst,
            msg_id,
            payload: p,
        })
    }

    /// ACKs carry no payload and are never themselves acknowledged.
    pub fn ack(src: NodeId, dst: NodeId, msg_id: u16) -> Self {
        Self {
            frame_type: FrameType::Ack,
            flags: 0,
            src,
            dst,
            msg_id,
            payload: Vec::new(),
        }
    }

    pub fn require_ack(&self) -> bool {
        self.frame_type == FrameType::Data && (self.flags & FLAG_REQUIRE_ACK) != 0
    }

    pub fn encode(&self) -> Vec<u8, MAX_FRAME_LEN> {
        let mut buf = Vec::new();
        let _ = buf.push(PROTOCOL_VERSION);
        let _ = buf.push(self.frame_type as u8);
        let _ = buf.push(self.flags);
        let _ = buf.push(self.src);
        let _ = buf.push(self.dst);
        let _ = buf.push((self.msg_id >> 8) as u8);
        let _ = buf.push(self.msg_id as u8);
        let _ = buf.extend_from_slice(&self.payload);
        buf
    }

    /// Returns `None` for anything that must be silently dropped: short
    /// frames, wrong protocol version, unknown frame type, oversized
    /// payload. Destination filtering is the receiver's business.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN || data.len() > MAX_FRAME_LEN {
            return None;
        }
        if data[0] != PROTOCOL_VERSION {
            return None;
        }
        let frame_type = FrameType::from_byte(data[1])?;
        let msg_id = ((data[5] as u16) << 8) | (data[6] as u16);

        let mut payload = Vec::new();
        if data.len() > HEADER_LEN {
            payload.extend_from_slice(&data[HEADER_LEN..]).ok()?;
        }

        Some(Self {
            frame_type,
            flags: data[2],
            src: data[3],
            dst: data[4],
            msg_id,
            payload,
        })
    }
}
