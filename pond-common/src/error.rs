use thiserror::Error;

/// A log datagram's bytes could not be decoded into a [`crate::datagram::LogDatagram`].
/// Surfaced to callers as "malformed"; the database counts and drops these,
/// it never propagates them as a hard failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatagramError {
    #[error("datagram is empty")]
    Empty,
    #[error("truncated datagram")]
    Truncated,
    #[error("reserved flag bits set")]
    ReservedBits,
    #[error("invalid log type {0}")]
    InvalidLogType(u8),
    #[error("invalid http method bit {0}")]
    InvalidHttpMethod(u8),
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
    #[error("string field contains an embedded NUL byte")]
    EmbeddedNul,
}

/// A protocol command or payload could not be decoded off a connection's
/// byte stream. This is always recoverable at the connection granularity.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command {0}")]
    UnknownCommand(u16),
    #[error("wrong payload size: expected {expected}, got {got}")]
    WrongPayloadSize { expected: usize, got: usize },
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error(transparent)]
    Datagram(#[from] DatagramError),
}
