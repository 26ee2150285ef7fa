//! Wire message format: fixed 24-byte header plus optional payload.
//!
//! Encoding and decoding are pure transformations with no side effects.
//! Decoding distinguishes truncation/length mismatch (`MalformedMessage`)
//! from wrong magic/version (`ProtocolMismatch`) so callers can log each
//! class separately before dropping the datagram.

use std::fmt;

use crate::config::{HEADER_LEN, MAX_PAYLOAD_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION};
use crate::error::{ProtocolError, Result};

/// Protocol command carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Hello = 0,
    Data = 1,
    Alive = 2,
    Goodbye = 3,
}

impl Command {
    /// Decode a command byte; `None` for unrecognized values.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Command::Hello),
            1 => Some(Command::Data),
            2 => Some(Command::Alive),
            3 => Some(Command::Goodbye),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Hello => "HELLO",
            Command::Data => "DATA",
            Command::Alive => "ALIVE",
            Command::Goodbye => "GOODBYE",
        };
        f.write_str(name)
    }
}

/// Decoded message header. Magic and version are validated during decoding
/// and re-inserted during encoding, so they are not stored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub command: Command,
    /// Sender-assigned, monotonically increasing per session.
    pub sequence: u32,
    /// Opaque identifier, unique per active session.
    pub session_id: u32,
    /// Lamport clock value at send time.
    pub clock: u64,
}

/// A full protocol message: header plus payload (non-empty only for DATA).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(command: Command, session_id: u32, sequence: u32, clock: u64) -> Self {
        Self {
            header: Header {
                command,
                sequence,
                session_id,
                clock,
            },
            payload: Vec::new(),
        }
    }

    pub fn hello(session_id: u32, sequence: u32, clock: u64) -> Self {
        Self::new(Command::Hello, session_id, sequence, clock)
    }

    pub fn data(session_id: u32, sequence: u32, clock: u64, payload: Vec<u8>) -> Self {
        Self {
            header: Header {
                command: Command::Data,
                sequence,
                session_id,
                clock,
            },
            payload,
        }
    }

    pub fn alive(session_id: u32, sequence: u32, clock: u64) -> Self {
        Self::new(Command::Alive, session_id, sequence, clock)
    }

    pub fn goodbye(session_id: u32, sequence: u32, clock: u64) -> Self {
        Self::new(Command::Goodbye, session_id, sequence, clock)
    }

    /// Encode to network byte order: `header || payload`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&PROTOCOL_MAGIC.to_be_bytes());
        buf.push(PROTOCOL_VERSION);
        buf.push(self.header.command.as_byte());
        buf.extend_from_slice(&self.header.sequence.to_be_bytes());
        buf.extend_from_slice(&self.header.session_id.to_be_bytes());
        buf.extend_from_slice(&self.header.clock.to_be_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode one datagram.
    ///
    /// # Errors
    /// `MalformedMessage` when the buffer is shorter than the header or the
    /// length field disagrees with the remaining bytes; `ProtocolMismatch`
    /// for wrong magic/version; `InvalidCommand` for an unknown command
    /// byte; `OversizedPayload` when the length field exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(ProtocolError::MalformedMessage("truncated header"));
        }

        let magic = u16::from_be_bytes([data[0], data[1]]);
        let version = data[2];
        if magic != PROTOCOL_MAGIC || version != PROTOCOL_VERSION {
            return Err(ProtocolError::ProtocolMismatch { magic, version });
        }

        let command = Command::from_byte(data[3]).ok_or(ProtocolError::InvalidCommand(data[3]))?;
        let sequence = be_u32(&data[4..8]);
        let session_id = be_u32(&data[8..12]);
        let clock = be_u64(&data[12..20]);
        let payload_len = be_u32(&data[20..24]) as usize;

        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedPayload(payload_len));
        }
        if data.len() - HEADER_LEN != payload_len {
            return Err(ProtocolError::MalformedMessage("payload length mismatch"));
        }

        Ok(Self {
            header: Header {
                command,
                sequence,
                session_id,
                clock,
            },
            payload: data[HEADER_LEN..].to_vec(),
        })
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn be_u64(bytes: &[u8]) -> u64 {
    u64::from_be_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_exact() {
        let msg = Message::data(0x0000002A, 7, 0x0102030405060708, b"hi".to_vec());
        let bytes = msg.to_bytes();

        assert_eq!(bytes.len(), HEADER_LEN + 2);
        assert_eq!(&bytes[0..2], &[0xC4, 0x61]); // magic
        assert_eq!(bytes[2], 1); // version
        assert_eq!(bytes[3], 1); // DATA
        assert_eq!(&bytes[4..8], &7u32.to_be_bytes());
        assert_eq!(&bytes[8..12], &42u32.to_be_bytes());
        assert_eq!(&bytes[12..20], &0x0102030405060708u64.to_be_bytes());
        assert_eq!(&bytes[20..24], &2u32.to_be_bytes());
        assert_eq!(&bytes[24..], b"hi");
    }

    #[test]
    fn roundtrip_with_payload() {
        let msg = Message::data(99, 3, 17, b"a line of text".to_vec());
        let decoded = Message::from_bytes(&msg.to_bytes()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn roundtrip_without_payload() {
        let msg = Message::goodbye(1, 2, 3);
        let decoded = Message::from_bytes(&msg.to_bytes()).unwrap();
        assert_eq!(decoded, msg);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn truncated_header_is_malformed() {
        let bytes = Message::hello(1, 0, 0).to_bytes();
        let result = Message::from_bytes(&bytes[..HEADER_LEN - 1]);
        assert!(matches!(result, Err(ProtocolError::MalformedMessage(_))));
    }

    #[test]
    fn empty_buffer_is_malformed() {
        assert!(matches!(
            Message::from_bytes(&[]),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn wrong_magic_is_mismatch() {
        let mut bytes = Message::hello(1, 0, 0).to_bytes();
        bytes[0] = 0xFF;
        match Message::from_bytes(&bytes) {
            Err(ProtocolError::ProtocolMismatch { magic, version }) => {
                assert_eq!(magic, 0xFF61);
                assert_eq!(version, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn wrong_version_is_mismatch() {
        let mut bytes = Message::hello(1, 0, 0).to_bytes();
        bytes[2] = 2;
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(ProtocolError::ProtocolMismatch { version: 2, .. })
        ));
    }

    #[test]
    fn unknown_command_is_invalid() {
        let mut bytes = Message::hello(1, 0, 0).to_bytes();
        bytes[3] = 9;
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(ProtocolError::InvalidCommand(9))
        ));
    }

    #[test]
    fn length_mismatch_is_malformed() {
        let mut bytes = Message::data(1, 0, 0, b"abc".to_vec()).to_bytes();
        bytes.push(0); // one trailing byte beyond the declared length
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn oversized_length_field_is_rejected() {
        let mut bytes = Message::hello(1, 0, 0).to_bytes();
        bytes[20..24].copy_from_slice(&(MAX_PAYLOAD_SIZE as u32 + 1).to_be_bytes());
        assert!(matches!(
            Message::from_bytes(&bytes),
            Err(ProtocolError::OversizedPayload(_))
        ));
    }
}
