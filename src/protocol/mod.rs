/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 G3-OSS developers.
 */

//! The protocol-generic recursive-descent skeleton shared by TCompact and
//! TBinary, plus the [`ThriftProtocol`] trait each wire format implements to
//! plug into it.
//!
//! Everything that does not depend on how a particular wire format spells
//! field/list/map headers (struct field loops, list/map element dispatch,
//! the primitive-body fast paths, bool placement rules) lives here once
//! and is shared by both formats via static dispatch over `P`.

pub mod binary;
pub mod compact;

use crate::error::{Result, ThriftError};
use crate::path_tracker::{Iterator as PtIterator, StreamRef};
use crate::streams::{ReadStreamSet, WriteStreamSet};
use crate::ttype::{NodeId, TType};
use crate::wire::{ReadCursor, WriteCursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListInfo {
    pub size: u32,
    pub elem_type: TType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapInfo {
    pub size: u32,
    pub key_type: TType,
    pub value_type: TType,
}

/// One wire format's header grammar and primitive encoding. Struct/list/map
/// traversal order, the primitive-body fast paths, and bool placement rules
/// are generic over this and live in the free functions below.
pub trait ThriftProtocol {
    const SUPPORTS_TULIP_V2: bool;
    /// `true` for TBinary, where every bool gets an explicit byte; `false`
    /// for TCompact, where a struct-field bool's value rides in the field
    /// header and only map/list/set elements get an explicit byte.
    const BOOL_ALWAYS_EXPLICIT: bool;

    fn read_i8(rs: &mut ReadCursor) -> Result<i8>;
    fn read_i16(rs: &mut ReadCursor) -> Result<i16>;
    fn read_i32(rs: &mut ReadCursor) -> Result<i32>;
    fn read_i64(rs: &mut ReadCursor) -> Result<i64>;
    fn read_f32(rs: &mut ReadCursor) -> Result<f32>;
    fn read_f64(rs: &mut ReadCursor) -> Result<f64>;
    fn read_bool_byte(rs: &mut ReadCursor) -> Result<bool>;
    fn read_string_len(rs: &mut ReadCursor) -> Result<u32>;

    fn write_i8(w: &mut WriteCursor, v: i8);
    fn write_i16(w: &mut WriteCursor, v: i16);
    fn write_i32(w: &mut WriteCursor, v: i32);
    fn write_i64(w: &mut WriteCursor, v: i64);
    fn write_f32(w: &mut WriteCursor, v: f32);
    fn write_f64(w: &mut WriteCursor, v: f64);
    fn write_bool_byte(w: &mut WriteCursor, v: bool);
    fn write_string_len(w: &mut WriteCursor, len: u32);

    fn parse_field_header<'a>(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        struct_it: &PtIterator<'a>,
        prev_id: i16,
    ) -> Result<PtIterator<'a>>;

    fn unparse_field_header<'a>(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        struct_it: &PtIterator<'a>,
        prev_id: i16,
    ) -> Result<PtIterator<'a>>;

    fn parse_list_header(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        current: &PtIterator<'_>,
    ) -> Result<ListInfo>;

    fn unparse_list_header(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        current: &PtIterator<'_>,
    ) -> Result<ListInfo>;

    fn parse_map_header(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        current: &PtIterator<'_>,
    ) -> Result<MapInfo>;

    fn unparse_map_header(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        current: &PtIterator<'_>,
    ) -> Result<MapInfo>;

    fn parse_tulip_v2_header(
        rs: &mut ReadCursor,
        wss: &mut WriteStreamSet,
        root: &PtIterator<'_>,
    ) -> Result<()>;

    fn unparse_tulip_v2_header(
        rss: &mut ReadStreamSet,
        w: &mut WriteCursor,
        root: &PtIterator<'_>,
    ) -> Result<()>;
}

fn write_stream_mut<'a, 'b>(
    wss: &'b mut WriteStreamSet<'a>,
    r: StreamRef,
) -> &'b mut WriteCursor {
    match r {
        StreamRef::Singleton(id) => wss.singleton_mut(id),
        StreamRef::Variable(id) => wss.variable_mut(id),
        StreamRef::VsfLens(id) => wss.vsf_lens_mut(id),
    }
}

fn read_stream_mut<'a, 'b>(
    rss: &'b mut ReadStreamSet<'a>,
    r: StreamRef,
) -> Result<&'b mut ReadCursor<'a>> {
    match r {
        StreamRef::Singleton(id) => Ok(rss.singleton_mut(id)),
        StreamRef::Variable(id) => rss.variable_mut(id),
        StreamRef::VsfLens(id) => rss.vsf_lens_mut(id),
    }
}

fn leaf_stream(it: &PtIterator<'_>) -> StreamRef {
    it.stream().expect("scalar thrift types always have a bound stream")
}

/// Runs one fully recursive-descent encode pass starting at `it`, writing
/// split-stream output into `wss` as it consumes bytes from `rs`.
pub fn advance<P: ThriftProtocol>(
    rs: &mut ReadCursor,
    wss: &mut WriteStreamSet,
    it: &PtIterator<'_>,
) -> Result<()> {
    match it.ttype() {
        TType::Bool => {
            let explicit = P::BOOL_ALWAYS_EXPLICIT
                || matches!(it.id(), NodeId::MAP_KEY | NodeId::MAP_VALUE | NodeId::LIST_ELEM);
            if explicit {
                let val = P::read_bool_byte(rs)?;
                write_stream_mut(wss, leaf_stream(it)).write_byte(val as u8);
            }
        }
        TType::Byte => {
            let val = P::read_i8(rs)?;
            write_stream_mut(wss, leaf_stream(it)).write_byte(val as u8);
        }
        TType::I16 => {
            let val = P::read_i16(rs)?;
            write_stream_mut(wss, leaf_stream(it)).write_le_i16(val);
        }
        TType::I32 => {
            let val = P::read_i32(rs)?;
            write_stream_mut(wss, leaf_stream(it)).write_le_i32(val);
        }
        TType::I64 => {
            let val = P::read_i64(rs)?;
            write_stream_mut(wss, leaf_stream(it)).write_le_i64(val);
        }
        TType::Float => {
            let val = P::read_f32(rs)?;
            write_stream_mut(wss, leaf_stream(it)).write_le_f32(val);
        }
        TType::Double => {
            let val = P::read_f64(rs)?;
            write_stream_mut(wss, leaf_stream(it)).write_le_f64(val);
        }
        TType::String => {
            let len = P::read_string_len(rs)?;
            write_stream_mut(wss, leaf_stream(&it.lengths()?)).write_le_u32(len);
            let bytes = rs.read_bytes(len as usize)?.to_vec();
            write_stream_mut(wss, leaf_stream(it)).write_bytes(&bytes);
        }
        TType::Map => parse_map::<P>(rs, wss, it)?,
        TType::List | TType::Set => parse_list::<P>(rs, wss, it)?,
        TType::Struct => {
            let mut prev_id: i16 = 0;
            loop {
                let field_it = P::parse_field_header(rs, wss, it, prev_id)?;
                if field_it.ttype() == TType::Stop {
                    break;
                }
                advance::<P>(rs, wss, &field_it)?;
                prev_id = field_it.id().0 as i16;
            }
        }
        other => {
            return Err(ThriftError::corrupt_owned(
                rs.pos(),
                format!("unexpected thrift type in message body: {other:?}"),
            ))
        }
    }
    Ok(())
}

fn parse_primitive_list_body<P: ThriftProtocol>(
    rs: &mut ReadCursor,
    wss: &mut WriteStreamSet,
    elem_it: &PtIterator<'_>,
    elem_type: TType,
    num_elts: u32,
) -> Result<()> {
    let stream = leaf_stream(elem_it);
    for _ in 0..num_elts {
        match elem_type {
            TType::I16 => {
                let v = P::read_i16(rs)?;
                write_stream_mut(wss, stream).write_le_i16(v);
            }
            TType::I32 => {
                let v = P::read_i32(rs)?;
                write_stream_mut(wss, stream).write_le_i32(v);
            }
            TType::I64 => {
                let v = P::read_i64(rs)?;
                write_stream_mut(wss, stream).write_le_i64(v);
            }
            TType::Float => {
                let v = P::read_f32(rs)?;
                write_stream_mut(wss, stream).write_le_f32(v);
            }
            TType::Double => {
                let v = P::read_f64(rs)?;
                write_stream_mut(wss, stream).write_le_f64(v);
            }
            _ => unreachable!("caller only dispatches fixed-width numeric types here"),
        }
    }
    Ok(())
}

fn parse_list<P: ThriftProtocol>(
    rs: &mut ReadCursor,
    wss: &mut WriteStreamSet,
    current: &PtIterator<'_>,
) -> Result<()> {
    let info = P::parse_list_header(rs, wss, current)?;
    let elem_it = current.list_elem(info.elem_type)?;
    match info.elem_type {
        TType::I16 | TType::I32 | TType::I64 | TType::Float | TType::Double => {
            parse_primitive_list_body::<P>(rs, wss, &elem_it, info.elem_type, info.size)?;
        }
        _ => {
            for _ in 0..info.size {
                advance::<P>(rs, wss, &elem_it)?;
            }
        }
    }
    Ok(())
}

fn parse_map_fallback<P: ThriftProtocol>(
    rs: &mut ReadCursor,
    wss: &mut WriteStreamSet,
    current: &PtIterator<'_>,
    info: MapInfo,
) -> Result<()> {
    let key_it = current.map_key(info.key_type)?;
    let value_it = current.map_value(info.value_type)?;
    for _ in 0..info.size {
        advance::<P>(rs, wss, &key_it)?;
        advance::<P>(rs, wss, &value_it)?;
    }
    Ok(())
}

fn parse_map<P: ThriftProtocol>(
    rs: &mut ReadCursor,
    wss: &mut WriteStreamSet,
    current: &PtIterator<'_>,
) -> Result<()> {
    let info = P::parse_map_header(rs, wss, current)?;
    if info.size == 0 {
        return Ok(());
    }
    let fast_key = matches!(info.key_type, TType::I32 | TType::I64);
    let fast_value = matches!(
        info.value_type,
        TType::I32 | TType::I64 | TType::Float | TType::Double
    );
    if fast_key && fast_value {
        let key_it = current.map_key(info.key_type)?;
        let value_it = current.map_value(info.value_type)?;
        let key_stream = leaf_stream(&key_it);
        let value_stream = leaf_stream(&value_it);
        for _ in 0..info.size {
            match info.key_type {
                TType::I32 => {
                    let v = P::read_i32(rs)?;
                    write_stream_mut(wss, key_stream).write_le_i32(v);
                }
                TType::I64 => {
                    let v = P::read_i64(rs)?;
                    write_stream_mut(wss, key_stream).write_le_i64(v);
                }
                _ => unreachable!(),
            }
            match info.value_type {
                TType::I32 => {
                    let v = P::read_i32(rs)?;
                    write_stream_mut(wss, value_stream).write_le_i32(v);
                }
                TType::I64 => {
                    let v = P::read_i64(rs)?;
                    write_stream_mut(wss, value_stream).write_le_i64(v);
                }
                TType::Float => {
                    let v = P::read_f32(rs)?;
                    write_stream_mut(wss, value_stream).write_le_f32(v);
                }
                TType::Double => {
                    let v = P::read_f64(rs)?;
                    write_stream_mut(wss, value_stream).write_le_f64(v);
                }
                _ => unreachable!(),
            }
        }
        Ok(())
    } else {
        parse_map_fallback::<P>(rs, wss, current, info)
    }
}

/// Runs one fully recursive-descent decode pass starting at `it`, writing
/// wire bytes into `w` as it consumes split-stream input from `rss`.
pub fn unparse<P: ThriftProtocol>(
    rss: &mut ReadStreamSet,
    w: &mut WriteCursor,
    it: &PtIterator<'_>,
) -> Result<()> {
    match it.ttype() {
        TType::Bool => {
            let explicit = P::BOOL_ALWAYS_EXPLICIT
                || matches!(it.id(), NodeId::MAP_KEY | NodeId::MAP_VALUE | NodeId::LIST_ELEM);
            if explicit {
                let val = read_stream_mut(rss, leaf_stream(it))?.read_byte()? != 0;
                P::write_bool_byte(w, val);
            }
        }
        TType::Byte => {
            let val = read_stream_mut(rss, leaf_stream(it))?.read_byte()? as i8;
            P::write_i8(w, val);
        }
        TType::I16 => {
            let val = read_stream_mut(rss, leaf_stream(it))?.read_le_i16()?;
            P::write_i16(w, val);
        }
        TType::I32 => {
            let val = read_stream_mut(rss, leaf_stream(it))?.read_le_i32()?;
            P::write_i32(w, val);
        }
        TType::I64 => {
            let val = read_stream_mut(rss, leaf_stream(it))?.read_le_i64()?;
            P::write_i64(w, val);
        }
        TType::Float => {
            let val = read_stream_mut(rss, leaf_stream(it))?.read_le_f32()?;
            P::write_f32(w, val);
        }
        TType::Double => {
            let val = read_stream_mut(rss, leaf_stream(it))?.read_le_f64()?;
            P::write_f64(w, val);
        }
        TType::String => {
            let len = read_stream_mut(rss, leaf_stream(&it.lengths()?))?.read_le_u32()?;
            P::write_string_len(w, len);
            let bytes = read_stream_mut(rss, leaf_stream(it))?
                .read_bytes(len as usize)?
                .to_vec();
            w.write_bytes(&bytes);
        }
        TType::Map => unparse_map::<P>(rss, w, it)?,
        TType::List | TType::Set => unparse_list::<P>(rss, w, it)?,
        TType::Struct => {
            let mut prev_id: i16 = 0;
            loop {
                let field_it = P::unparse_field_header(rss, w, it, prev_id)?;
                if field_it.ttype() == TType::Stop {
                    break;
                }
                unparse::<P>(rss, w, &field_it)?;
                prev_id = field_it.id().0 as i16;
            }
        }
        other => {
            return Err(ThriftError::corrupt_owned(
                w.len(),
                format!("unexpected thrift type while unparsing: {other:?}"),
            ))
        }
    }
    Ok(())
}

fn unparse_list<P: ThriftProtocol>(
    rss: &mut ReadStreamSet,
    w: &mut WriteCursor,
    current: &PtIterator<'_>,
) -> Result<()> {
    let info = P::unparse_list_header(rss, w, current)?;
    if info.size == 0 {
        return Ok(());
    }
    let elem_it = current.list_elem(info.elem_type)?;
    for _ in 0..info.size {
        unparse::<P>(rss, w, &elem_it)?;
    }
    Ok(())
}

fn unparse_map<P: ThriftProtocol>(
    rss: &mut ReadStreamSet,
    w: &mut WriteCursor,
    current: &PtIterator<'_>,
) -> Result<()> {
    let info = P::unparse_map_header(rss, w, current)?;
    if info.size == 0 {
        return Ok(());
    }
    let key_it = current.map_key(info.key_type)?;
    let value_it = current.map_value(info.value_type)?;
    for _ in 0..info.size {
        unparse::<P>(rss, w, &key_it)?;
        unparse::<P>(rss, w, &value_it)?;
    }
    Ok(())
}

/// Encodes one concatenated Thrift message starting at `tracker`'s root,
/// optionally preceded by a TulipV2 framing header.
pub fn parse_message<P: ThriftProtocol>(
    rs: &mut ReadCursor,
    wss: &mut WriteStreamSet,
    tracker: &crate::path_tracker::PathTracker,
    parse_tulip_v2: bool,
) -> Result<()> {
    let root = tracker.root_iter();
    if parse_tulip_v2 {
        P::parse_tulip_v2_header(rs, wss, &root)?;
    }
    advance::<P>(rs, wss, &root)
}

/// Decodes one concatenated Thrift message starting at `tracker`'s root.
pub fn unparse_message<P: ThriftProtocol>(
    rss: &mut ReadStreamSet,
    w: &mut WriteCursor,
    tracker: &crate::path_tracker::PathTracker,
    unparse_message_headers: bool,
) -> Result<()> {
    let root = tracker.root_iter();
    if unparse_message_headers {
        P::unparse_tulip_v2_header(rss, w, &root)?;
    }
    unparse::<P>(rss, w, &root)
}
