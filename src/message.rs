//! Header and question decoding, reply header and answer encoding

use crate::error::ProtocolError;
use crate::name;
use crate::types::{Header, HeaderFlags, Question, ANSWER_TTL, HEADER_LEN};
use std::net::Ipv4Addr;

/// Bounds-checked read view over a datagram.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8], offset: usize, limit: usize) -> Self {
        Self { buf, pos: offset, limit: limit.min(buf.len()) }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.pos)
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        if self.remaining() < 2 {
            return Err(ProtocolError::Truncated);
        }
        let value = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    pub fn read_name(&mut self) -> Result<String, ProtocolError> {
        let (name, used) = name::decode(self.buf, self.pos, self.limit)?;
        self.pos += used;
        Ok(name)
    }
}

pub fn decode_header(buf: &[u8]) -> Result<Header, ProtocolError> {
    if buf.len() < HEADER_LEN {
        return Err(ProtocolError::Truncated);
    }
    let mut r = Reader::new(buf, 0, HEADER_LEN);
    Ok(Header {
        id: r.read_u16()?,
        flags: HeaderFlags::unpack(r.read_u16()?),
        question_count: r.read_u16()?,
        answer_count: r.read_u16()?,
        authority_count: r.read_u16()?,
        additional_count: r.read_u16()?,
    })
}

/// Decodes one question at `offset`; the second value is the number of bytes
/// spanned by name, qtype and qclass.
pub fn decode_question(buf: &[u8], offset: usize, limit: usize) -> Result<(Question, usize), ProtocolError> {
    let mut r = Reader::new(buf, offset, limit);
    let name = r.read_name()?;
    if r.remaining() < 4 {
        return Err(ProtocolError::Truncated);
    }
    let qtype = r.read_u16()?;
    let qclass = r.read_u16()?;
    let end = r.position();
    Ok((Question { name, qtype, qclass, span: offset..end }, end - offset))
}

pub fn encode_reply_header(original: &Header, answer_count: u16) -> Header {
    let mut reply = *original;
    reply.flags.qr = true;
    reply.flags.rcode = 0;
    reply.answer_count = answer_count;
    reply.authority_count = 0;
    reply.additional_count = 0;
    reply
}

/// Appends an A answer whose name/type/class prefix is `question_bytes`
/// copied verbatim. Returns the number of bytes written.
pub fn append_answer(out: &mut Vec<u8>, question_bytes: &[u8], addr: Ipv4Addr) -> usize {
    let before = out.len();
    out.extend_from_slice(question_bytes);
    out.extend_from_slice(&ANSWER_TTL.to_be_bytes());
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&addr.octets());
    out.len() - before
}
