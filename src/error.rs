//! # Error Types
//!
//! Error handling for the UAP session protocol.
//!
//! This module defines all error variants that can occur during protocol
//! operations, from low-level I/O failures to wire-format violations.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and file system failures
//! - **Wire Errors**: truncated or mismatched datagrams, unknown commands
//! - **Session Errors**: duplicate session identifiers
//! - **Configuration Errors**: invalid or unparsable configuration
//!
//! Protocol violations that reference a missing session (wild DATA, wild
//! GOODBYE, wild ALIVE) are handled and logged at the dispatch site and do
//! not surface through this type: a hostile datagram from one peer must
//! never become a fault that affects other sessions.

use std::io;
use thiserror::Error;

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Header cannot be parsed or the payload length field disagrees with
    /// the datagram size. Dropped without reply.
    #[error("malformed message: {0}")]
    MalformedMessage(&'static str),

    /// Wrong magic number or protocol version. Dropped without reply.
    #[error("protocol mismatch: magic {magic:#06x}, version {version}")]
    ProtocolMismatch { magic: u16, version: u8 },

    /// Unrecognized command byte. Dropped without reply.
    #[error("invalid command byte: {0}")]
    InvalidCommand(u8),

    #[error("payload too large: {0} bytes")]
    OversizedPayload(usize),

    /// HELLO for a session identifier that is already active.
    #[error("duplicate session id {0:#010x}")]
    DuplicateSession(u32),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
