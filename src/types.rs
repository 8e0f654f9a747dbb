//! Basic wire types for the responder

use std::ops::Range;

pub const HEADER_LEN: usize = 12;
pub const TYPE_A: u16 = 1;
pub const CLASS_IN: u16 = 1;
/// Fixed TTL on every answer; the table carries no expiry.
pub const ANSWER_TTL: u32 = 1800;

const QR_MASK: u16 = 0x8000;
const OPCODE_SHIFT: u16 = 11;
const AA_MASK: u16 = 0x0400;
const TC_MASK: u16 = 0x0200;
const RD_MASK: u16 = 0x0100;
const RA_MASK: u16 = 0x0080;
const Z_SHIFT: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Opcode {
    #[default]
    Query,
    Other(u8),
}

impl Opcode {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x0F {
            0 => Opcode::Query,
            other => Opcode::Other(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Opcode::Query => 0,
            Opcode::Other(v) => v & 0x0F,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags {
    pub qr: bool,
    pub opcode: Opcode,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub z: u8,
    pub rcode: u8,
}

impl HeaderFlags {
    pub fn unpack(raw: u16) -> Self {
        Self {
            qr: raw & QR_MASK != 0,
            opcode: Opcode::from_bits((raw >> OPCODE_SHIFT) as u8),
            aa: raw & AA_MASK != 0,
            tc: raw & TC_MASK != 0,
            rd: raw & RD_MASK != 0,
            ra: raw & RA_MASK != 0,
            z: ((raw >> Z_SHIFT) & 0x07) as u8,
            rcode: (raw & 0x0F) as u8,
        }
    }

    pub fn pack(&self) -> u16 {
        let mut raw = (self.opcode.bits() as u16) << OPCODE_SHIFT;
        if self.qr { raw |= QR_MASK; }
        if self.aa { raw |= AA_MASK; }
        if self.tc { raw |= TC_MASK; }
        if self.rd { raw |= RD_MASK; }
        if self.ra { raw |= RA_MASK; }
        raw |= ((self.z & 0x07) as u16) << Z_SHIFT;
        raw | (self.rcode & 0x0F) as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub id: u16,
    pub flags: HeaderFlags,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl Header {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..2].copy_from_slice(&self.id.to_be_bytes());
        out[2..4].copy_from_slice(&self.flags.pack().to_be_bytes());
        out[4..6].copy_from_slice(&self.question_count.to_be_bytes());
        out[6..8].copy_from_slice(&self.answer_count.to_be_bytes());
        out[8..10].copy_from_slice(&self.authority_count.to_be_bytes());
        out[10..12].copy_from_slice(&self.additional_count.to_be_bytes());
        out
    }
}

/// One decoded entry of the question section.
///
/// `span` is the byte range of name + qtype + qclass inside the datagram, so
/// an answer can reuse those bytes verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
    pub span: Range<usize>,
}

impl Question {
    pub fn is_a_in(&self) -> bool {
        self.qtype == TYPE_A && self.qclass == CLASS_IN
    }
}
