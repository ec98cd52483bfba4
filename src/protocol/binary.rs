/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 G3-OSS developers.
 */

//! TBinaryProtocol: everything big-endian, fixed-width, and explicit. No
//! nibble packing, no varints, no TulipV2 framing.
//!
//! The wire type byte *is* the `TType` discriminant (no separate compact-type
//! table the way TCompactProtocol needs one), list/map headers carry their
//! element types unconditionally (even for an empty map), and bools always
//! get an explicit body byte. There is no header nibble to hide the value
//! in.

use super::{leaf_stream, read_stream_mut, write_stream_mut, ListInfo, MapInfo, ThriftProtocol};
use crate::error::{Result, ThriftError};
use crate::path_tracker::Iterator as PtIterator;
use crate::streams::{ReadStreamSet, WriteStreamSet};
use crate::ttype::{NodeId, TType};
use crate::wire::{ReadCursor, WriteCursor};

fn validate_binary_type(t: TType, pos: usize) -> Result<()> {
    match t {
        TType::Stop
        | TType::Bool
        | TType::Byte
        | TType::I16
        | TType::I32
        | TType::I64
        | TType::Double
        | TType::String
        | TType::Struct
        | TType::Map
        | TType::Set
        | TType::List
        | TType::Float => Ok(()),
        other => Err(ThriftError::corrupt_owned(
            pos,
            format!("{other:?} is not a legal TBinary wire type"),
        )),
    }
}

fn binary_type_from_byte(byte: u8, pos: usize) -> Result<TType> {
    let t = TType::from_u8(byte).ok_or_else(|| ThriftError::corrupt(pos, "unknown type tag"))?;
    validate_binary_type(t, pos)?;
    Ok(t)
}

fn binary_byte_from_type(t: TType) -> Result<u8> {
    validate_binary_type(t, 0)?;
    Ok(t as u8)
}

/// Marker type implementing [`ThriftProtocol`] for TBinaryProtocol.
pub struct Binary;

impl ThriftProtocol for Binary {
    const SUPPORTS_TULIP_V2: bool = false;
    const BOOL_ALWAYS_EXPLICIT: bool = true;

    fn read_i8(rs: &mut ReadCursor) -> Result<i8> {
        Ok(rs.read_byte()? as i8)
    }
    fn read_i16(rs: &mut ReadCursor) -> Result<i16> {
        rs.read_be_i16()
    }
    fn read_i32(rs: &mut ReadCursor) -> Result<i32> {
        rs.read_be_i32()
    }
    fn read_i64(rs: &mut ReadCursor) -> Result<i64> {
        rs.read_be_i64()
    }
    fn read_f32(rs: &mut ReadCursor) -> Result<f32> {
        rs.read_be_f32()
    }
    fn read_f64(rs: &mut ReadCursor) -> Result<f64> {
        rs.read_be_f64()
    }
    fn read_bool_byte(rs: &mut ReadCursor) -> Result<bool> {
        Ok(rs.read_byte()? != 0)
    }
    fn read_string_len(rs: &mut ReadCursor) -> Result<u32> {
        rs.read_be_u32()
    }

    fn write_i8(w: &mut WriteCursor, v: i8) {
        w.write_byte(v as u8);
    }
    fn write_i16(w: &mut WriteCursor, v: i16) {
        w.write_be_i16(v);
    }
    fn write_i32(w: &mut WriteCursor, v: i32) {
        w.write_be_i32(v);
    }
    fn write_i64(w: &mut WriteCursor, v: i64) {
        w.write_be_i64(v);
    }
    fn write_f32(w: &mut WriteCursor, v: f32) {
        w.write_be_f32(v);
    }
    fn write_f64(w: &mut WriteCursor, v: f64) {
        w.write_be_f64(v);
    }
    fn write_bool_byte(w: &mut WriteCursor, v: bool) {
        w.write_byte(v as u8);
    }
    fn write_string_len(w: &mut WriteCursor, len: u32) {
        w.write_be_u32(len);
    }

    fn parse_field_header<'a>(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        struct_it: &PtIterator<'a>,
        prev_id: i16,
    ) -> Result<PtIterator<'a>> {
        let ttype = binary_type_from_byte(rs.read_byte()?, rs.pos())?;
        wss.write_type(ttype);
        if ttype == TType::Stop {
            return struct_it.stop();
        }

        let raw_id = rs.read_be_i16()?;
        let delta = (raw_id as u16).wrapping_sub(prev_id as u16);
        wss.write_field_delta(delta as i16);

        struct_it.child(NodeId::field(raw_id), ttype)
    }

    fn unparse_field_header<'a>(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        struct_it: &PtIterator<'a>,
        prev_id: i16,
    ) -> Result<PtIterator<'a>> {
        let ttype = rss.read_type()?;
        w.write_byte(binary_byte_from_type(ttype)?);
        if ttype == TType::Stop {
            return struct_it.stop();
        }

        let delta = rss.read_field_delta()? as u16;
        let raw_id = (prev_id as u16).wrapping_add(delta) as i16;
        w.write_be_i16(raw_id);

        struct_it.child(NodeId::field(raw_id), ttype)
    }

    fn parse_list_header(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        current: &PtIterator<'_>,
    ) -> Result<ListInfo> {
        let elem_type = binary_type_from_byte(rs.read_byte()?, rs.pos())?;
        wss.write_type(elem_type);
        let size = rs.read_be_u32()?;
        write_stream_mut(wss, leaf_stream(&current.lengths()?)).write_le_u32(size);
        Ok(ListInfo { size, elem_type })
    }

    fn unparse_list_header(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        current: &PtIterator<'_>,
    ) -> Result<ListInfo> {
        let elem_type = rss.read_type()?;
        w.write_byte(binary_byte_from_type(elem_type)?);
        let size = read_stream_mut(rss, leaf_stream(&current.lengths()?))?.read_le_u32()?;
        w.write_be_u32(size);
        Ok(ListInfo { size, elem_type })
    }

    fn parse_map_header(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        current: &PtIterator<'_>,
    ) -> Result<MapInfo> {
        let key_type = binary_type_from_byte(rs.read_byte()?, rs.pos())?;
        let value_type = binary_type_from_byte(rs.read_byte()?, rs.pos())?;
        wss.write_type(key_type);
        wss.write_type(value_type);
        let size = rs.read_be_u32()?;
        write_stream_mut(wss, leaf_stream(&current.lengths()?)).write_le_u32(size);
        Ok(MapInfo { size, key_type, value_type })
    }

    fn unparse_map_header(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        current: &PtIterator<'_>,
    ) -> Result<MapInfo> {
        let key_type = rss.read_type()?;
        let value_type = rss.read_type()?;
        w.write_byte(binary_byte_from_type(key_type)?);
        w.write_byte(binary_byte_from_type(value_type)?);
        let size = read_stream_mut(rss, leaf_stream(&current.lengths()?))?.read_le_u32()?;
        w.write_be_u32(size);
        Ok(MapInfo { size, key_type, value_type })
    }

    fn parse_tulip_v2_header(
        _rs: &mut ReadCursor,
        _wss: &mut WriteStreamSet,
        _root: &PtIterator<'_>,
    ) -> Result<()> {
        Err(ThriftError::corrupt(0, "TulipV2 framing is not compatible with TBinary"))
    }

    fn unparse_tulip_v2_header(
        _rss: &mut ReadStreamSet,
        _w: &mut WriteCursor,
        _root: &PtIterator<'_>,
    ) -> Result<()> {
        Err(ThriftError::corrupt(0, "TulipV2 framing is not compatible with TBinary"))
    }
}
