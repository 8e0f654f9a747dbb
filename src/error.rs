//! Error kinds for the wire codec and the name table

use thiserror::Error;

/// A message-level rejection reason. None of these are fatal to the server:
/// the datagram is dropped and nothing is sent back.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("buffer too short for the field being read")]
    Truncated,

    #[error("malformed label in domain name")]
    InvalidLabel,

    #[error("compressed domain names are not supported")]
    UnsupportedEncoding,

    #[error("not a standard query")]
    UnsupportedOpcodeOrDirection,

    #[error("query carries answer, authority or additional records")]
    NonZeroResponseCounts,

    #[error("query has no questions")]
    EmptyQuestionSection,

    #[error("question section runs past the message length")]
    SegmentOverrun,

    #[error("only A/IN questions are served")]
    UnsupportedQueryTypeOrClass,
}

impl ProtocolError {
    /// Short stable label for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            ProtocolError::Truncated => "truncated",
            ProtocolError::InvalidLabel => "invalid_label",
            ProtocolError::UnsupportedEncoding => "unsupported_encoding",
            ProtocolError::UnsupportedOpcodeOrDirection => "unsupported_opcode",
            ProtocolError::NonZeroResponseCounts => "nonzero_counts",
            ProtocolError::EmptyQuestionSection => "no_questions",
            ProtocolError::SegmentOverrun => "segment_overrun",
            ProtocolError::UnsupportedQueryTypeOrClass => "unsupported_type_or_class",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("invalid domain name: {0:?}")]
    InvalidName(String),

    #[error("duplicate domain name: {0}")]
    Duplicate(String),
}
