//! # Transport
//!
//! UDP socket plumbing for the server: bind, receive loop, the single
//! outbound writer task, and graceful shutdown.

pub mod udp;
