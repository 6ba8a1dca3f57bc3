//! The error-kind taxonomy for the codec.
//!
//! Decode and encode failures all funnel through [`DbnError`], which names a fixed set of kinds
//! plus an optional byte offset and a human-readable message. It's a small, manually implemented
//! error type rather than a derive-macro-generated one, because the kind tag itself is part of
//! the public contract (callers match on it), not just the message.

use std::fmt;

/// The kind of failure that occurred while decoding or encoding a stream.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DbnErrorKind {
    /// The 3-byte `"DBN"` magic was not found at the start of the stream.
    InvalidMagic,
    /// The header's `version` byte is outside the supported range `{2, 3}`.
    UnsupportedVersion,
    /// The metadata header is internally inconsistent (bad length, reserved-field mismatch).
    MalformedHeader,
    /// The stream ended before the expected number of bytes could be read.
    UnexpectedEof,
    /// A record body parser read past the record's declared `length_units * 4` boundary.
    RecordOverrun,
    /// The header's `schema_def_len` field is nonzero.
    UnsupportedSchema,
    /// A write was attempted on a writer that has already been closed.
    WriterClosed,
    /// The underlying transport returned an I/O error.
    Io,
}

impl fmt::Display for DbnErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidMagic => "invalid magic",
            Self::UnsupportedVersion => "unsupported version",
            Self::MalformedHeader => "malformed header",
            Self::UnexpectedEof => "unexpected end of file",
            Self::RecordOverrun => "record overrun",
            Self::UnsupportedSchema => "unsupported schema",
            Self::WriterClosed => "writer closed",
            Self::Io => "I/O error",
        };
        f.write_str(s)
    }
}

/// An error encountered while decoding or encoding a Format stream.
///
/// Carries the [`DbnErrorKind`], a human-readable message, and (where known) the byte offset
/// of the offending field.
#[derive(Debug)]
pub struct DbnError {
    kind: DbnErrorKind,
    message: String,
    offset: Option<u64>,
}

impl DbnError {
    /// Builds a new error of the given kind with a message.
    pub fn new(kind: DbnErrorKind, message: impl Into<String>) -> Self {
        let err = Self {
            kind,
            message: message.into(),
            offset: None,
        };
        tracing::debug!(kind = %err.kind, message = %err.message, "DbnError");
        err
    }

    /// Attaches a byte offset to this error, naming the offending location in the stream.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The kind of failure.
    pub fn kind(&self) -> DbnErrorKind {
        self.kind
    }

    /// The byte offset of the offending field, if known.
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub(crate) fn unexpected_eof(message: impl Into<String>) -> Self {
        Self::new(DbnErrorKind::UnexpectedEof, message)
    }

    pub(crate) fn record_overrun(message: impl Into<String>) -> Self {
        Self::new(DbnErrorKind::RecordOverrun, message)
    }

    pub(crate) fn malformed_header(message: impl Into<String>) -> Self {
        Self::new(DbnErrorKind::MalformedHeader, message)
    }
}

impl fmt::Display for DbnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{}: {} (at offset 0x{:x})", self.kind, self.message, offset),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for DbnError {}

impl From<std::io::Error> for DbnError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::new(DbnErrorKind::UnexpectedEof, e.to_string())
        } else {
            Self::new(DbnErrorKind::Io, e.to_string())
        }
    }
}

/// The codec's primary `Result` alias.
pub type Result<T> = std::result::Result<T, DbnError>;
