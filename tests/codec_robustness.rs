#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Property-based decoder robustness: hostile or corrupt datagrams must be
//! rejected with the right error class and must never panic.

use proptest::prelude::*;
use uap_protocol::config::HEADER_LEN;
use uap_protocol::core::message::Message;
use uap_protocol::error::ProtocolError;

proptest! {
    // Whatever arrives off the wire, decoding returns; it never panics.
    #[test]
    fn decode_arbitrary_bytes_never_panics(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Message::from_bytes(&data);
    }

    #[test]
    fn short_buffers_are_malformed(len in 0..HEADER_LEN) {
        let result = Message::from_bytes(&vec![0u8; len]);
        prop_assert!(matches!(result, Err(ProtocolError::MalformedMessage(_))));
    }

    #[test]
    fn wrong_magic_is_always_a_mismatch(magic in any::<u16>(), session_id in any::<u32>()) {
        prop_assume!(magic != 0xC461);

        let mut bytes = Message::hello(session_id, 0, 0).to_bytes();
        bytes[0..2].copy_from_slice(&magic.to_be_bytes());

        prop_assert!(matches!(
            Message::from_bytes(&bytes),
            Err(ProtocolError::ProtocolMismatch { .. })
        ));
    }

    #[test]
    fn truncating_a_data_payload_is_malformed(
        payload in prop::collection::vec(any::<u8>(), 1..64),
        cut in 1usize..32,
    ) {
        let bytes = Message::data(1, 1, 1, payload.clone()).to_bytes();
        let cut = cut.min(payload.len());
        let result = Message::from_bytes(&bytes[..bytes.len() - cut]);
        prop_assert!(matches!(result, Err(ProtocolError::MalformedMessage(_))));
    }
}
