//! Standard-query processing: validate, resolve each question, build the reply

use crate::error::ProtocolError;
use crate::message::{append_answer, decode_header, decode_question, encode_reply_header};
use crate::table::NameTable;
use crate::types::{Header, Opcode, HEADER_LEN};
use smallvec::SmallVec;
use std::fmt;
use std::net::Ipv4Addr;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Resolving,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Validating => write!(f, "validating"),
            Stage::Resolving => write!(f, "resolving"),
        }
    }
}

/// The request was dropped; the caller must not send anything back.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("query rejected while {stage}: {error}")]
pub struct Rejection {
    pub stage: Stage,
    pub error: ProtocolError,
}

impl Rejection {
    fn validating(error: ProtocolError) -> Self {
        Self { stage: Stage::Validating, error }
    }

    fn resolving(error: ProtocolError) -> Self {
        Self { stage: Stage::Resolving, error }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub bytes: Vec<u8>,
    pub answer_count: u16,
}

struct Hit {
    question: Range<usize>,
    addr: Ipv4Addr,
}

pub struct QueryProcessor<'t> {
    table: &'t NameTable,
}

impl<'t> QueryProcessor<'t> {
    pub fn new(table: &'t NameTable) -> Self {
        Self { table }
    }

    pub fn process(&self, datagram: &[u8]) -> Result<Reply, Rejection> {
        self.process_within(datagram, datagram.len())
    }

    /// Processes the message occupying the first `len` bytes of `buf`.
    ///
    /// Questions are decoded against the whole buffer, but the running total
    /// of question bytes must stay within `len`; a question section that
    /// spills into the rest of `buf` is a `SegmentOverrun`.
    pub fn process_within(&self, buf: &[u8], len: usize) -> Result<Reply, Rejection> {
        let header = validate(buf, len)?;
        let (section_end, hits) = self.resolve(buf, len, &header)?;
        Ok(build(buf, &header, section_end, &hits))
    }

    fn resolve(&self, buf: &[u8], len: usize, header: &Header) -> Result<(usize, SmallVec<[Hit; 4]>), Rejection> {
        let declared = len - HEADER_LEN;
        let mut cursor = HEADER_LEN;
        let mut consumed = 0usize;
        let mut hits = SmallVec::new();

        for _ in 0..header.question_count {
            let (question, used) = decode_question(buf, cursor, buf.len()).map_err(Rejection::resolving)?;
            consumed += used;
            if consumed > declared {
                return Err(Rejection::resolving(ProtocolError::SegmentOverrun));
            }
            if !question.is_a_in() {
                return Err(Rejection::resolving(ProtocolError::UnsupportedQueryTypeOrClass));
            }
            match self.table.lookup(&question.name) {
                Some(addr) => hits.push(Hit { question: question.span, addr }),
                None => tracing::trace!("no entry for {}", question.name),
            }
            cursor += used;
        }

        Ok((cursor, hits))
    }
}

fn validate(buf: &[u8], len: usize) -> Result<Header, Rejection> {
    if len < HEADER_LEN || len > buf.len() {
        return Err(Rejection::validating(ProtocolError::Truncated));
    }
    let header = decode_header(buf).map_err(Rejection::validating)?;
    if header.flags.qr || header.flags.opcode != Opcode::Query {
        return Err(Rejection::validating(ProtocolError::UnsupportedOpcodeOrDirection));
    }
    if header.answer_count != 0 || header.authority_count != 0 || header.additional_count != 0 {
        return Err(Rejection::validating(ProtocolError::NonZeroResponseCounts));
    }
    if header.question_count == 0 {
        return Err(Rejection::validating(ProtocolError::EmptyQuestionSection));
    }
    Ok(header)
}

fn build(buf: &[u8], header: &Header, section_end: usize, hits: &[Hit]) -> Reply {
    let answer_count = hits.len() as u16;
    let answers_len: usize = hits.iter().map(|h| h.question.len() + 10).sum();
    let mut bytes = Vec::with_capacity(section_end + answers_len);

    bytes.extend_from_slice(&encode_reply_header(header, answer_count).to_bytes());
    bytes.extend_from_slice(&buf[HEADER_LEN..section_end]);
    for hit in hits {
        append_answer(&mut bytes, &buf[hit.question.clone()], hit.addr);
    }

    Reply { bytes, answer_count }
}
