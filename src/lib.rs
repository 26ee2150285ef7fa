//! # UAP Protocol
//!
//! Connection-oriented session protocol over UDP.
//!
//! A client establishes a session with an explicit HELLO handshake,
//! exchanges DATA with loss and duplication detection, receives ALIVE
//! liveness replies, and tears the session down with GOODBYE or by
//! server-side inactivity timeout. The transport guarantees nothing;
//! ordering detection, liveness, and lifecycle all live in this crate.
//!
//! ## Layers
//! - `core`: wire format, datagram codec, Lamport clock
//! - `protocol`: session table, server dispatch engine, client state
//!   machine
//! - `transport`: UDP server loop and socket plumbing
//! - `config`: protocol constants and server/client configuration
//!
//! ## Wire Format
//! ```text
//! [Magic(2)] [Version(1)] [Command(1)] [Sequence(4)] [SessionId(4)] [Clock(8)] [Length(4)] [Payload(N)]
//! ```
//! Big-endian throughout; commands are `0=HELLO, 1=DATA, 2=ALIVE,
//! 3=GOODBYE`; payload is present only for DATA.
//!
//! ## Guarantees and non-goals
//! Lost DATA is detected (sequence gap) but never retransmitted; there is
//! no encryption, no authentication, and no multiplexing of streams within
//! a session.

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;

pub use crate::config::{ClientConfig, ServerConfig, UapConfig};
pub use crate::core::message::{Command, Header, Message};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::{Client, ClientState, DispatchEngine, SessionTable};
