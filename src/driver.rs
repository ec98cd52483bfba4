/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 G3-OSS developers.
 */

//! The two public entry points: [`encode`] turns a buffer of one or more
//! concatenated Thrift messages into the split-stream representation,
//! [`decode`] reverses it byte-for-byte.
//!
//! Both loop over [`crate::protocol::parse_message`]/
//! [`crate::protocol::unparse_message`] rather than a single call, since a
//! host may hand this crate several whole messages back to back in one
//! buffer. Encode stops once the input cursor is exhausted; decode stops
//! once it has reproduced exactly `original_size` bytes.

use crate::config::{DecoderConfig, EncoderConfig, WireFormat};
use crate::error::{Result, ThriftError};
use crate::path_tracker::{PathTracker, MAX_DEPTH_DECODE, MAX_DEPTH_ENCODE};
use crate::protocol::{binary::Binary, compact::Compact, parse_message, unparse_message};
use crate::streams::{DecodeInput, EncodeOutput, ReadStreamSet, WriteStreamSet};
use crate::wire::{ReadCursor, WriteCursor};

/// Splits `input` (one or more back-to-back Thrift messages sharing
/// `config`'s wire format) into the family of output streams described by
/// `config`. The returned [`EncodeOutput::config_bytes`] must be handed back
/// to the corresponding `decode()` call verbatim (typically via
/// [`DecoderConfig::deserialize`]).
pub fn encode(input: &[u8], config: &EncoderConfig) -> Result<EncodeOutput> {
    let tracker = PathTracker::build(config.base(), config.supports_vsf(), MAX_DEPTH_ENCODE)?;
    let mut rs = ReadCursor::new(input);
    let mut wss = WriteStreamSet::new(config.base(), config.supports_vsf());

    while !rs.is_exhausted() {
        match config.wire_format() {
            WireFormat::Compact => {
                parse_message::<Compact>(&mut rs, &mut wss, &tracker, config.parse_tulip_v2())?
            }
            WireFormat::Binary => {
                parse_message::<Binary>(&mut rs, &mut wss, &tracker, config.parse_tulip_v2())?
            }
        }
    }

    let decoder_config = DecoderConfig::from_encoder(config, input.len())?;
    let config_bytes = decoder_config.serialize();
    Ok(wss.finish(config_bytes))
}

/// Reassembles the exact original bytes from `streams`, given the
/// [`DecoderConfig`] that produced them (see [`DecoderConfig::deserialize`]
/// to recover one from the `CONFIG` singleton stream).
pub fn decode(streams: DecodeInput<'_>, config: &DecoderConfig) -> Result<Vec<u8>> {
    let tracker = PathTracker::build(config.base(), config.supports_vsf(), MAX_DEPTH_DECODE)?;
    let mut rss = ReadStreamSet::new(config.base(), config.supports_vsf(), streams)?;
    let mut w = WriteCursor::new();
    w.reserve(config.original_size());

    while w.len() < config.original_size() {
        match config.wire_format() {
            WireFormat::Compact => unparse_message::<Compact>(
                &mut rss,
                &mut w,
                &tracker,
                config.unparse_message_headers(),
            )?,
            WireFormat::Binary => unparse_message::<Binary>(
                &mut rss,
                &mut w,
                &tracker,
                config.unparse_message_headers(),
            )?,
        }
    }

    if w.len() != config.original_size() {
        return Err(ThriftError::corrupt(
            w.len(),
            "decoded output overran the declared original size",
        ));
    }

    Ok(w.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseConfig, PathInfo};
    use crate::ttype::{NodeId, TType};
    use std::collections::BTreeMap;

    /// A trivial one-field TCompact struct: field 1, i32 value 42, stop.
    /// Header byte is `(delta << 4) | CT_I32` = `(1 << 4) | 0x05` = `0x15`,
    /// the value is `zigzag(42)` = 84 = `0x54`, and the struct ends in a
    /// single all-zero stop byte.
    fn trivial_compact_message() -> Vec<u8> {
        vec![0x15, 0x54, 0x00]
    }

    #[test]
    fn encode_then_decode_round_trips_a_trivial_message() {
        let mut m = BTreeMap::new();
        m.insert(vec![NodeId::field(1)], PathInfo::new(0, TType::I32));
        let enc = EncoderConfig::new(m, TType::Struct, vec![], WireFormat::Compact, false, 14)
            .unwrap();

        let input = trivial_compact_message();
        let out = encode(&input, &enc).unwrap();

        let dec = DecoderConfig::deserialize(&out.config_bytes).unwrap();
        let decode_input = DecodeInput {
            singletons: std::array::from_fn(|i| out.singletons[i].as_slice()),
            variables: out
                .variables
                .iter()
                .map(|(id, data)| (*id, data.content.as_slice(), data.lens.as_slice()))
                .collect(),
            clusters: vec![],
            cluster_lengths: &[],
        };
        let roundtrip = decode(decode_input, &dec).unwrap();
        assert_eq!(roundtrip, input);
    }

    #[test]
    fn encode_rejects_truncated_message() {
        let m: BTreeMap<_, _> = BTreeMap::new();
        let enc = EncoderConfig::new(m, TType::Struct, vec![], WireFormat::Compact, false, 14)
            .unwrap();
        // Field header with no stop byte: struct never terminates before EOF.
        let input = [0x15, 0x54];
        assert!(encode(&input, &enc).is_err());
    }
}
