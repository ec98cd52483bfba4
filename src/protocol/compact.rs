/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 G3-OSS developers.
 */

//! TCompactProtocol: LEB128 + ZigZag varints for anything wider than a byte,
//! nibble-packed headers, and the `\n? 0x80 0x00` TulipV2 framing sequence.
//!
//! The compact-type nibble table is the standard Apache/FB Thrift assignment,
//! extended with `CT_FLOAT = 0x0D` for the FB Thrift float extension (no
//! canonical header defines this value, so it is chosen to sit in the first
//! unused nibble slot and documented as such).

use super::{leaf_stream, read_stream_mut, write_stream_mut, ListInfo, MapInfo, ThriftProtocol};
use crate::error::{Result, ThriftError};
use crate::path_tracker::Iterator as PtIterator;
use crate::streams::{ReadStreamSet, WriteStreamSet};
use crate::ttype::{NodeId, TType};
use crate::wire::{ReadCursor, WriteCursor};

const CT_STOP: u8 = 0x00;
const CT_BOOLEAN_TRUE: u8 = 0x01;
const CT_BOOLEAN_FALSE: u8 = 0x02;
const CT_BYTE: u8 = 0x03;
const CT_I16: u8 = 0x04;
const CT_I32: u8 = 0x05;
const CT_I64: u8 = 0x06;
const CT_DOUBLE: u8 = 0x07;
const CT_BINARY: u8 = 0x08;
const CT_LIST: u8 = 0x09;
const CT_SET: u8 = 0x0A;
const CT_MAP: u8 = 0x0B;
const CT_STRUCT: u8 = 0x0C;
const CT_FLOAT: u8 = 0x0D;

#[derive(Clone, Copy, PartialEq, Eq)]
enum TypeContext {
    /// A struct field's type nibble: both boolean compact types are legal,
    /// and which one is chosen depends on the field's actual value.
    Field,
    /// A list/set element type or map key/value type: `CT_BOOLEAN_FALSE` is
    /// illegal here (collections always tag bools as `CT_BOOLEAN_TRUE` and
    /// carry the real value as a separate per-element byte).
    Collection,
}

fn compact_to_ttype(nibble: u8, ctx: TypeContext, pos: usize) -> Result<TType> {
    Ok(match nibble {
        CT_STOP => TType::Stop,
        CT_BOOLEAN_TRUE => TType::Bool,
        CT_BOOLEAN_FALSE => {
            if ctx == TypeContext::Collection {
                return Err(ThriftError::corrupt(
                    pos,
                    "CT_BOOLEAN_FALSE is not a legal collection element type",
                ));
            }
            TType::Bool
        }
        CT_BYTE => TType::Byte,
        CT_I16 => TType::I16,
        CT_I32 => TType::I32,
        CT_I64 => TType::I64,
        CT_DOUBLE => TType::Double,
        CT_BINARY => TType::String,
        CT_LIST => TType::List,
        CT_SET => TType::Set,
        CT_MAP => TType::Map,
        CT_STRUCT => TType::Struct,
        CT_FLOAT => TType::Float,
        _ => return Err(ThriftError::corrupt(pos, "unknown compact type tag")),
    })
}

fn ttype_to_compact(ttype: TType, ctx: TypeContext, bool_value: Option<bool>) -> Result<u8> {
    Ok(match ttype {
        TType::Stop => CT_STOP,
        TType::Bool => match ctx {
            TypeContext::Collection => CT_BOOLEAN_TRUE,
            TypeContext::Field => {
                if bool_value.unwrap_or(true) {
                    CT_BOOLEAN_TRUE
                } else {
                    CT_BOOLEAN_FALSE
                }
            }
        },
        TType::Byte => CT_BYTE,
        TType::I16 => CT_I16,
        TType::I32 => CT_I32,
        TType::I64 => CT_I64,
        TType::Double => CT_DOUBLE,
        TType::String => CT_BINARY,
        TType::List => CT_LIST,
        TType::Set => CT_SET,
        TType::Map => CT_MAP,
        TType::Struct => CT_STRUCT,
        TType::Float => CT_FLOAT,
        other => {
            return Err(ThriftError::corrupt_owned(
                0,
                format!("{other:?} has no compact-protocol type tag"),
            ))
        }
    })
}

/// Every multi-byte integer rides a single 64-bit zigzag varint, then gets
/// narrowed with a checked conversion. TCompact never special-cases the
/// varint width by target type, so the wire decode is always full-width.
fn read_narrow_i16(rs: &mut ReadCursor) -> Result<i16> {
    let wide = rs.read_zigzag_i64()?;
    i16::try_from(wide).map_err(|_| ThriftError::corrupt(rs.pos(), "varint out of i16 range"))
}

fn read_narrow_i32(rs: &mut ReadCursor) -> Result<i32> {
    let wide = rs.read_zigzag_i64()?;
    i32::try_from(wide).map_err(|_| ThriftError::corrupt(rs.pos(), "varint out of i32 range"))
}

/// Marker type implementing [`ThriftProtocol`] for TCompactProtocol.
pub struct Compact;

impl ThriftProtocol for Compact {
    const SUPPORTS_TULIP_V2: bool = true;
    const BOOL_ALWAYS_EXPLICIT: bool = false;

    fn read_i8(rs: &mut ReadCursor) -> Result<i8> {
        Ok(rs.read_byte()? as i8)
    }
    fn read_i16(rs: &mut ReadCursor) -> Result<i16> {
        read_narrow_i16(rs)
    }
    fn read_i32(rs: &mut ReadCursor) -> Result<i32> {
        read_narrow_i32(rs)
    }
    fn read_i64(rs: &mut ReadCursor) -> Result<i64> {
        rs.read_zigzag_i64()
    }
    fn read_f32(rs: &mut ReadCursor) -> Result<f32> {
        rs.read_be_f32()
    }
    fn read_f64(rs: &mut ReadCursor) -> Result<f64> {
        rs.read_be_f64()
    }
    fn read_bool_byte(rs: &mut ReadCursor) -> Result<bool> {
        match rs.read_byte()? {
            CT_BOOLEAN_TRUE => Ok(true),
            CT_BOOLEAN_FALSE => Ok(false),
            _ => Err(ThriftError::corrupt(rs.pos(), "bad compact bool byte")),
        }
    }
    fn read_string_len(rs: &mut ReadCursor) -> Result<u32> {
        rs.read_varint_u32()
    }

    fn write_i8(w: &mut WriteCursor, v: i8) {
        w.write_byte(v as u8);
    }
    fn write_i16(w: &mut WriteCursor, v: i16) {
        w.write_zigzag_i64(v as i64);
    }
    fn write_i32(w: &mut WriteCursor, v: i32) {
        w.write_zigzag_i64(v as i64);
    }
    fn write_i64(w: &mut WriteCursor, v: i64) {
        w.write_zigzag_i64(v);
    }
    fn write_f32(w: &mut WriteCursor, v: f32) {
        w.write_be_f32(v);
    }
    fn write_f64(w: &mut WriteCursor, v: f64) {
        w.write_be_f64(v);
    }
    fn write_bool_byte(w: &mut WriteCursor, v: bool) {
        w.write_byte(if v { CT_BOOLEAN_TRUE } else { CT_BOOLEAN_FALSE });
    }
    fn write_string_len(w: &mut WriteCursor, len: u32) {
        w.write_varint_u32(len);
    }

    fn parse_field_header<'a>(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        struct_it: &PtIterator<'a>,
        prev_id: i16,
    ) -> Result<PtIterator<'a>> {
        let byte = rs.read_byte()?;
        let type_nibble = byte & 0x0f;
        let delta_nibble = byte >> 4;

        if type_nibble == CT_STOP {
            if byte != 0 {
                return Err(ThriftError::corrupt(rs.pos(), "non-canonical stop byte"));
            }
            wss.write_type(TType::Stop);
            return struct_it.stop();
        }

        let ttype = compact_to_ttype(type_nibble, TypeContext::Field, rs.pos())?;
        wss.write_type(ttype);

        let raw_id: i16;
        let delta: u16;
        if delta_nibble == 0 {
            raw_id = read_narrow_i16(rs)?;
            delta = (raw_id as u16).wrapping_sub(prev_id as u16);
            if (1..=15).contains(&delta) {
                return Err(ThriftError::corrupt(
                    rs.pos(),
                    "field id delta fits in a nibble but was varint-encoded",
                ));
            }
        } else {
            delta = delta_nibble as u16;
            raw_id = (prev_id as u16).wrapping_add(delta) as i16;
        }
        wss.write_field_delta(delta as i16);

        let field_it = struct_it.child(NodeId::field(raw_id), ttype)?;

        if ttype == TType::Bool {
            let value = type_nibble == CT_BOOLEAN_TRUE;
            write_stream_mut(wss, leaf_stream(&field_it)).write_byte(value as u8);
        }

        Ok(field_it)
    }

    fn unparse_field_header<'a>(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        struct_it: &PtIterator<'a>,
        prev_id: i16,
    ) -> Result<PtIterator<'a>> {
        let ttype = rss.read_type()?;
        if ttype == TType::Stop {
            w.write_byte(0);
            return struct_it.stop();
        }

        let delta = rss.read_field_delta()? as u16;
        let raw_id = (prev_id as u16).wrapping_add(delta) as i16;
        let field_it = struct_it.child(NodeId::field(raw_id), ttype)?;

        let bool_value = if ttype == TType::Bool {
            Some(read_stream_mut(rss, leaf_stream(&field_it))?.read_byte()? != 0)
        } else {
            None
        };
        let type_nibble = ttype_to_compact(ttype, TypeContext::Field, bool_value)?;

        if (1..=15).contains(&delta) {
            w.write_byte(((delta as u8) << 4) | type_nibble);
        } else {
            w.write_byte(type_nibble);
            w.write_zigzag_i64(raw_id as i64);
        }

        Ok(field_it)
    }

    fn parse_list_header(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        current: &PtIterator<'_>,
    ) -> Result<ListInfo> {
        let byte = rs.read_byte()?;
        let size_nibble = byte >> 4;
        let elem_nibble = byte & 0x0f;

        let size = if size_nibble == 0x0f {
            let v = rs.read_varint_u32()?;
            if v < 15 {
                return Err(ThriftError::corrupt(rs.pos(), "non-canonical list size varint"));
            }
            v
        } else {
            size_nibble as u32
        };

        let elem_type = compact_to_ttype(elem_nibble, TypeContext::Collection, rs.pos())?;
        wss.write_type(elem_type);
        write_stream_mut(wss, leaf_stream(&current.lengths()?)).write_le_u32(size);

        Ok(ListInfo { size, elem_type })
    }

    fn unparse_list_header(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        current: &PtIterator<'_>,
    ) -> Result<ListInfo> {
        let elem_type = rss.read_type()?;
        let size = read_stream_mut(rss, leaf_stream(&current.lengths()?))?.read_le_u32()?;
        let elem_nibble = ttype_to_compact(elem_type, TypeContext::Collection, None)?;

        if size < 15 {
            w.write_byte(((size as u8) << 4) | elem_nibble);
        } else {
            w.write_byte(0xf0 | elem_nibble);
            w.write_varint_u32(size);
        }

        Ok(ListInfo { size, elem_type })
    }

    fn parse_map_header(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        current: &PtIterator<'_>,
    ) -> Result<MapInfo> {
        let size = rs.read_varint_u32()?;
        write_stream_mut(wss, leaf_stream(&current.lengths()?)).write_le_u32(size);

        if size == 0 {
            return Ok(MapInfo { size: 0, key_type: TType::Stop, value_type: TType::Stop });
        }

        let byte = rs.read_byte()?;
        let key_nibble = byte >> 4;
        let value_nibble = byte & 0x0f;
        let key_type = compact_to_ttype(key_nibble, TypeContext::Collection, rs.pos())?;
        let value_type = compact_to_ttype(value_nibble, TypeContext::Collection, rs.pos())?;
        wss.write_type(key_type);
        wss.write_type(value_type);

        Ok(MapInfo { size, key_type, value_type })
    }

    fn unparse_map_header(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        current: &PtIterator<'_>,
    ) -> Result<MapInfo> {
        let size = read_stream_mut(rss, leaf_stream(&current.lengths()?))?.read_le_u32()?;
        w.write_varint_u32(size);

        if size == 0 {
            return Ok(MapInfo { size: 0, key_type: TType::Stop, value_type: TType::Stop });
        }

        let key_type = rss.read_type()?;
        let value_type = rss.read_type()?;
        let key_nibble = ttype_to_compact(key_type, TypeContext::Collection, None)?;
        let value_nibble = ttype_to_compact(value_type, TypeContext::Collection, None)?;
        w.write_byte((key_nibble << 4) | value_nibble);

        Ok(MapInfo { size, key_type, value_type })
    }

    /// `[\n]? 0x80 0x00`: an optional leading newline (left over from a text
    /// framing layer upstream) followed by the two-byte TulipV2 marker. The
    /// total byte count (2 or 3) is recorded so unparse can replay it intact.
    fn parse_tulip_v2_header(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        root: &PtIterator<'_>,
    ) -> Result<()> {
        let header_it = root.child(NodeId::MESSAGE_HEADER, TType::String)?;
        let header_stream = leaf_stream(&header_it);

        let mut byte0 = rs.read_byte()?;
        write_stream_mut(wss, header_stream).write_byte(byte0);
        let mut len = 1usize;
        if byte0 == b'\n' {
            byte0 = rs.read_byte()?;
            write_stream_mut(wss, header_stream).write_byte(byte0);
            len += 1;
        }
        let byte1 = rs.read_byte()?;
        write_stream_mut(wss, header_stream).write_byte(byte1);
        len += 1;

        if byte0 != 0x80 || byte1 != 0x00 {
            return Err(ThriftError::corrupt(rs.pos(), "malformed TulipV2 header"));
        }

        write_stream_mut(wss, leaf_stream(&header_it.lengths()?)).write_le_u32(len as u32);
        Ok(())
    }

    fn unparse_tulip_v2_header(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        root: &PtIterator<'_>,
    ) -> Result<()> {
        let header_it = root.child(NodeId::MESSAGE_HEADER, TType::String)?;
        let len = read_stream_mut(rss, leaf_stream(&header_it.lengths()?))?.read_le_u32()? as usize;
        let bytes = read_stream_mut(rss, leaf_stream(&header_it))?
            .read_bytes(len)?
            .to_vec();
        w.write_bytes(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BaseConfig;
    use std::collections::BTreeMap;

    fn tracker() -> crate::path_tracker::PathTracker {
        let m: BTreeMap<_, _> = BTreeMap::new();
        let base = BaseConfig::new(m, TType::Struct, vec![]).unwrap();
        crate::path_tracker::PathTracker::build(&base, true, crate::path_tracker::MAX_DEPTH_ENCODE)
            .unwrap()
    }

    #[test]
    fn bool_byte_accepts_only_canonical_values() {
        let mut rs = ReadCursor::new(&[0x01, 0x02, 0x03]);
        assert!(Compact::read_bool_byte(&mut rs).unwrap());
        assert!(!Compact::read_bool_byte(&mut rs).unwrap());
        assert!(Compact::read_bool_byte(&mut rs).is_err());
    }

    #[test]
    fn stop_byte_must_be_all_zero() {
        let tracker = tracker();
        let root = tracker.root_iter();
        let mut rs = ReadCursor::new(&[0x10]);
        let base = BaseConfig::new(Default::default(), TType::Struct, vec![]).unwrap();
        let mut wss = WriteStreamSet::new(&base, true);
        assert!(Compact::parse_field_header(&mut rs, &mut wss, &root, 0).is_err());
    }

    #[test]
    fn field_header_round_trips_small_delta() {
        let tracker = tracker();
        let root = tracker.root_iter();
        let base = BaseConfig::new(Default::default(), TType::Struct, vec![]).unwrap();
        let mut wss = WriteStreamSet::new(&base, true);
        // field id 3 as a byte-short delta (3 << 4 | CT_I32)
        let mut rs = ReadCursor::new(&[(3 << 4) | CT_I32, 0x10]);
        let field_it = Compact::parse_field_header(&mut rs, &mut wss, &root, 0).unwrap();
        assert_eq!(field_it.id(), NodeId::field(3));
        assert_eq!(field_it.ttype(), TType::I32);
    }

    #[test]
    fn non_canonical_small_delta_via_varint_is_rejected() {
        let tracker = tracker();
        let root = tracker.root_iter();
        let base = BaseConfig::new(Default::default(), TType::Struct, vec![]).unwrap();
        let mut wss = WriteStreamSet::new(&base, true);
        // delta_nibble=0 (varint path) encoding field id 3 from prev_id 0: the
        // canonical encoder would have used the nibble form instead.
        let mut rs = ReadCursor::new(&[CT_I32, 0x06]); // zigzag(3) = 6
        assert!(Compact::parse_field_header(&mut rs, &mut wss, &root, 0).is_err());
    }

    #[test]
    fn list_header_overflow_nibble_requires_noncanonical_rejection() {
        let tracker = tracker();
        let root = tracker.root_iter();
        let base = BaseConfig::new(Default::default(), TType::Struct, vec![]).unwrap();
        let mut wss = WriteStreamSet::new(&base, true);
        // size_nibble=15 but varint payload < 15 is non-canonical.
        let mut rs = ReadCursor::new(&[0xf0 | CT_I32, 0x05]);
        assert!(Compact::parse_list_header(&mut rs, &mut wss, &root).is_err());
    }

    #[test]
    fn map_header_empty_has_no_type_bytes() {
        let tracker = tracker();
        let root = tracker.root_iter();
        let base = BaseConfig::new(Default::default(), TType::Struct, vec![]).unwrap();
        let mut wss = WriteStreamSet::new(&base, true);
        let mut rs = ReadCursor::new(&[0x00]); // varint size = 0, nothing else
        let info = Compact::parse_map_header(&mut rs, &mut wss, &root).unwrap();
        assert_eq!(info.size, 0);
        assert!(rs.is_exhausted());
    }

    #[test]
    fn collection_bool_false_tag_is_rejected() {
        assert!(compact_to_ttype(CT_BOOLEAN_FALSE, TypeContext::Collection, 0).is_err());
        assert!(compact_to_ttype(CT_BOOLEAN_FALSE, TypeContext::Field, 0).is_ok());
    }
}
