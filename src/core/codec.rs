//! Datagram codec adapting [`Message`] to `tokio_util::udp::UdpFramed`.
//!
//! One datagram carries exactly one message, so unlike a stream codec there
//! is no partial-frame state: every `decode` call consumes the whole buffer,
//! including when decoding fails, so a bad datagram can never poison the
//! next one.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::message::Message;
use crate::error::ProtocolError;

/// Stateless codec for UAP datagrams.
pub struct DatagramCodec;

impl Decoder for DatagramCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, ProtocolError> {
        if src.is_empty() {
            return Ok(None);
        }
        let datagram = src.split_to(src.len());
        Message::from_bytes(&datagram).map(Some)
    }
}

impl Encoder<Message> for DatagramCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        if message.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedPayload(message.payload.len()));
        }
        dst.put_slice(&message.to_bytes());
        Ok(())
    }
}
