//! # Protocol State Machines
//!
//! Session lifecycle logic for both roles.
//!
//! ## Components
//! - **Session**: server-side session records, the concurrent session
//!   table, and per-session inactivity timers
//! - **Dispatch**: the server engine routing datagrams by command
//! - **Client**: the initiating-side state machine (handshake, data with
//!   liveness wait, retries, close)

pub mod client;
pub mod dispatch;
pub mod session;

pub use client::{Client, ClientState};
pub use dispatch::DispatchEngine;
pub use session::{SequenceOutcome, SessionRecord, SessionTable};
