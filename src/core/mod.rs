//! # Core Wire Components
//!
//! Low-level message handling: header layout, encoding/decoding, and the
//! datagram codec.
//!
//! ## Components
//! - **Message**: fixed-size header plus optional DATA payload
//! - **Codec**: tokio codec for framing over UDP datagrams
//! - **Clock**: Lamport logical clock carried in every header
//!
//! ## Wire Format
//! ```text
//! [Magic(2)] [Version(1)] [Command(1)] [Sequence(4)] [SessionId(4)] [Clock(8)] [Length(4)] [Payload(N)]
//! ```
//! All integers are big-endian. Payload is present only for DATA.
//!
//! ## Security
//! - Maximum payload size: 64KB (length validated before allocation)
//! - Magic number prevents accidental misinterpretation

pub mod clock;
pub mod codec;
pub mod message;
