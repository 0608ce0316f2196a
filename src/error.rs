//! Error types per layer
//!
//! Decode errors never stop the receive loop, encode errors are returned
//! before any byte reaches the socket, send errors go back to the caller.

use std::io;

use thiserror::Error;

/// Failure to turn one inbound datagram into a [`crate::protocol::Message`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Tag is not part of the catalogue. Raw bytes kept for diagnostics.
    #[error("unknown event tag {tag} ({} byte body)", body.len())]
    UnknownEvent { tag: u8, body: Vec<u8> },

    /// Buffer ended before the layout was complete.
    #[error("truncated message: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// Aggregate declared more records than the buffer holds.
    #[error("lap record count mismatch: declared {declared}, decoded {decoded}")]
    CountMismatch { declared: u8, decoded: u8 },

    /// Receive context names a tag that cannot carry this payload shape.
    #[error("tag {received_as} is not a valid context for {tag} payload")]
    InvalidContext { tag: u8, received_as: u8 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} is {len} bytes, wire strings hold at most 255")]
    StringTooLong { field: &'static str, len: usize },

    #[error("{len} lap records, the count field holds at most 255")]
    TooManyRecords { len: usize },
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("endpoint closed")]
    Closed,

    #[error("socket write failed: {0}")]
    Io(#[from] io::Error),
}

/// Setup-level failures (bind, config).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
