//! Property-based tests for the RCON and A2S decoders

use proptest::prelude::*;
use sourcemgr_core::protocol::{RconPacket, parse_info_response};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Arbitrary datagrams are rejected or parsed, never a panic
    #[test]
    fn prop_info_parser_total(datagram in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = parse_info_response(&datagram);
    }

    /// Datagrams without the single-packet header are always rejected
    #[test]
    fn prop_info_parser_requires_header(
        first in 0u8..0xFF,
        rest in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut datagram = vec![first];
        datagram.extend(rest);
        prop_assert!(parse_info_response(&datagram).is_err());
    }

    /// Arbitrary packet payloads are rejected or decoded, never a panic
    #[test]
    fn prop_rcon_decode_total(payload in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = RconPacket::decode(&payload);
    }

    /// Encoded length prefix always matches the bytes that follow
    #[test]
    fn prop_rcon_size_prefix(id in any::<i32>(), body in "[ -~]{0,200}") {
        let encoded = RconPacket::new(id, 2, body).encode();
        let size = i32::from_le_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
        prop_assert_eq!(size as usize, encoded.len() - 4);
    }
}
