/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 G3-OSS developers.
 */

//! The fixed family of singleton streams plus the configurable family of
//! variable (logical-id-keyed) streams, and the cluster concatenation /
//! splitting machinery that sits on top of them.

use rustc_hash::FxHashMap;

use crate::config::{BaseConfig, LogicalId};
use crate::error::{Result, ThriftError};
use crate::ttype::TType;
use crate::wire::{ReadCursor, WriteCursor};

/// The fixed family of streams the core always emits, in fixed declaration
/// order, used as the index into `[T; NUM_SINGLETONS]` arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(usize)]
pub enum SingletonId {
    Types = 0,
    FieldDeltas = 1,
    Lengths = 2,
    Bool = 3,
    Int8 = 4,
    Int16 = 5,
    Int32 = 6,
    Int64 = 7,
    Float32 = 8,
    Float64 = 9,
    Binary = 10,
    Config = 11,
}

pub const NUM_SINGLETONS: usize = 12;

pub const ALL_SINGLETONS: [SingletonId; NUM_SINGLETONS] = [
    SingletonId::Types,
    SingletonId::FieldDeltas,
    SingletonId::Lengths,
    SingletonId::Bool,
    SingletonId::Int8,
    SingletonId::Int16,
    SingletonId::Int32,
    SingletonId::Int64,
    SingletonId::Float32,
    SingletonId::Float64,
    SingletonId::Binary,
    SingletonId::Config,
];

/// Which of the four variable-stream shapes a logical id's data takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableOutcome {
    Serialized,
    Numeric,
    Vsf,
}

/// Maps a path's declared `TType` to the outcome and (for fixed-width
/// outcomes) the per-element byte width used by cluster-length accounting.
pub fn outcome_for_type(ttype: TType, supports_vsf: bool) -> (VariableOutcome, usize) {
    match ttype {
        TType::Bool | TType::Byte => (VariableOutcome::Serialized, 1),
        TType::I16 => (VariableOutcome::Numeric, 2),
        TType::I32 | TType::U32 => (VariableOutcome::Numeric, 4),
        TType::I64 => (VariableOutcome::Numeric, 8),
        TType::Float => (VariableOutcome::Numeric, 4),
        TType::Double => (VariableOutcome::Numeric, 8),
        TType::String => {
            if supports_vsf {
                (VariableOutcome::Vsf, 0)
            } else {
                (VariableOutcome::Serialized, 1)
            }
        }
        _ => (VariableOutcome::Serialized, 1),
    }
}

/// The bytes of one variable stream, in whichever shape its outcome dictates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableStreamData {
    pub content: Vec<u8>,
    /// Only populated for `Vsf` outcomes: one 4-byte little-endian length
    /// per string, parallel to `content`.
    pub lens: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterStreamData {
    pub successor: i32,
    pub data: VariableStreamData,
}

/// Full output of one encode call, ready for the host to route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutput {
    pub singletons: [Vec<u8>; NUM_SINGLETONS],
    pub variables: Vec<(LogicalId, VariableStreamData)>,
    pub clusters: Vec<ClusterStreamData>,
    pub cluster_lengths: Vec<u8>,
    pub config_bytes: Vec<u8>,
}

/// Owns the growable write-side streams for one `encode()` call.
pub struct WriteStreamSet<'cfg> {
    base: &'cfg BaseConfig,
    supports_vsf: bool,
    singletons: [WriteCursor; NUM_SINGLETONS],
    variables: FxHashMap<LogicalId, WriteCursor>,
    vsf_lens: FxHashMap<LogicalId, WriteCursor>,
}

impl<'cfg> WriteStreamSet<'cfg> {
    pub fn new(base: &'cfg BaseConfig, supports_vsf: bool) -> Self {
        let mut variables = FxHashMap::default();
        let mut vsf_lens = FxHashMap::default();
        for id in base.logical_ids() {
            variables.insert(*id, WriteCursor::new());
        }
        for info in base.path_map().values() {
            let (outcome, _) = outcome_for_type(info.ttype, supports_vsf);
            if outcome == VariableOutcome::Vsf {
                vsf_lens.entry(info.id).or_insert_with(WriteCursor::new);
            }
        }
        WriteStreamSet {
            base,
            supports_vsf,
            singletons: Default::default(),
            variables,
            vsf_lens,
        }
    }

    pub fn singleton_mut(&mut self, id: SingletonId) -> &mut WriteCursor {
        &mut self.singletons[id as usize]
    }

    pub fn variable_mut(&mut self, id: LogicalId) -> &mut WriteCursor {
        self.variables.entry(id).or_insert_with(WriteCursor::new)
    }

    pub fn vsf_lens_mut(&mut self, id: LogicalId) -> &mut WriteCursor {
        self.vsf_lens.entry(id).or_insert_with(WriteCursor::new)
    }

    pub fn write_type(&mut self, ttype: TType) {
        self.singleton_mut(SingletonId::Types).write_byte(ttype as u8);
    }

    pub fn write_field_delta(&mut self, delta: i16) {
        self.singleton_mut(SingletonId::FieldDeltas).write_le_i16(delta);
    }

    /// Finalizes all streams into an [`EncodeOutput`], consuming `self`.
    /// `config_bytes` is the pre-serialized `DecoderConfig` for the
    /// `CONFIG` singleton.
    pub fn finish(mut self, config_bytes: Vec<u8>) -> EncodeOutput {
        self.singleton_mut(SingletonId::Config).write_bytes(&config_bytes);

        let singletons: [Vec<u8>; NUM_SINGLETONS] =
            std::array::from_fn(|i| std::mem::take(&mut self.singletons[i]).into_vec());

        let unclustered = self.base.unclustered_streams();
        let mut variables = Vec::with_capacity(unclustered.len());
        for id in unclustered {
            let content = self
                .variables
                .remove(&id)
                .map(WriteCursor::into_vec)
                .unwrap_or_default();
            let lens = self
                .vsf_lens
                .remove(&id)
                .map(WriteCursor::into_vec)
                .unwrap_or_default();
            variables.push((id, VariableStreamData { content, lens }));
        }

        let mut cluster_lengths = WriteCursor::new();
        let mut clusters = Vec::with_capacity(self.base.clusters().len());
        for cluster in self.base.clusters() {
            let mut content = Vec::new();
            let mut lens = Vec::new();
            for id in &cluster.ids {
                let member_content = self
                    .variables
                    .remove(id)
                    .map(WriteCursor::into_vec)
                    .unwrap_or_default();
                let member_lens = self
                    .vsf_lens
                    .remove(id)
                    .map(WriteCursor::into_vec)
                    .unwrap_or_default();

                let is_vsf = !member_lens.is_empty() || self.is_vsf_id(*id);
                let count: u32 = if is_vsf {
                    (member_lens.len() / 4) as u32
                } else {
                    let width = self.width_of_id(*id);
                    if self.supports_vsf {
                        (member_content.len() / width.max(1)) as u32
                    } else {
                        member_content.len() as u32
                    }
                };
                cluster_lengths.write_le_u32(count);

                content.extend_from_slice(&member_content);
                lens.extend_from_slice(&member_lens);
            }
            clusters.push(ClusterStreamData {
                successor: cluster.successor,
                data: VariableStreamData { content, lens },
            });
        }

        EncodeOutput {
            singletons,
            variables,
            clusters,
            cluster_lengths: cluster_lengths.into_vec(),
            config_bytes,
        }
    }

    fn width_of_id(&self, id: LogicalId) -> usize {
        self.base
            .path_map()
            .values()
            .find(|info| info.id == id)
            .map(|info| outcome_for_type(info.ttype, self.supports_vsf).1)
            .unwrap_or(1)
    }

    fn is_vsf_id(&self, id: LogicalId) -> bool {
        self.base
            .path_map()
            .values()
            .find(|info| info.id == id)
            .map(|info| outcome_for_type(info.ttype, self.supports_vsf).0 == VariableOutcome::Vsf)
            .unwrap_or(false)
    }
}

/// The read-side mirror of [`WriteStreamSet`]: takes the host's delivered
/// streams and re-splices clustered content back into per-logical-id
/// ranges.
pub struct ReadStreamSet<'a> {
    singletons: [ReadCursor<'a>; NUM_SINGLETONS],
    variables: FxHashMap<LogicalId, (ReadCursor<'a>, ReadCursor<'a>)>,
}

/// Borrowed view of everything the host must hand back to `decode()`.
pub struct DecodeInput<'a> {
    pub singletons: [&'a [u8]; NUM_SINGLETONS],
    pub variables: Vec<(LogicalId, &'a [u8], &'a [u8])>,
    pub clusters: Vec<(&'a [u8], &'a [u8])>,
    pub cluster_lengths: &'a [u8],
}

impl<'a> ReadStreamSet<'a> {
    pub fn new(base: &BaseConfig, supports_vsf: bool, input: DecodeInput<'a>) -> Result<Self> {
        let singletons: [ReadCursor<'a>; NUM_SINGLETONS] =
            std::array::from_fn(|i| ReadCursor::new(input.singletons[i]));

        let mut variables: FxHashMap<LogicalId, (ReadCursor<'a>, ReadCursor<'a>)> =
            FxHashMap::default();
        for (id, content, lens) in input.variables {
            variables.insert(id, (ReadCursor::new(content), ReadCursor::new(lens)));
        }

        if !base.clusters().is_empty() {
            let mut cluster_lengths = ReadCursor::new(input.cluster_lengths);
            if input.clusters.len() != base.clusters().len() {
                return Err(ThriftError::corrupt(
                    0,
                    "cluster stream count does not match config",
                ));
            }
            for (cluster, (content_buf, lens_buf)) in
                base.clusters().iter().zip(input.clusters.iter())
            {
                let mut content_off = 0usize;
                let mut lens_off = 0usize;
                for id in &cluster.ids {
                    let count = cluster_lengths.read_le_u32()? as usize;
                    let info = base
                        .path_map()
                        .values()
                        .find(|info| info.id == *id)
                        .ok_or_else(|| {
                            ThriftError::corrupt(0, "cluster references unconfigured logical id")
                        })?;
                    let (outcome, width) = outcome_for_type(info.ttype, supports_vsf);
                    if outcome == VariableOutcome::Vsf {
                        let lens_bytes = count * 4;
                        if lens_off + lens_bytes > lens_buf.len() {
                            return Err(ThriftError::corrupt(
                                0,
                                "truncated cluster length stream",
                            ));
                        }
                        let member_lens = &lens_buf[lens_off..lens_off + lens_bytes];
                        lens_off += lens_bytes;

                        let mut total: usize = 0;
                        let mut peek = ReadCursor::new(member_lens);
                        for _ in 0..count {
                            total += peek.read_le_u32()? as usize;
                        }
                        if content_off + total > content_buf.len() {
                            return Err(ThriftError::corrupt(0, "truncated cluster content stream"));
                        }
                        let member_content = &content_buf[content_off..content_off + total];
                        content_off += total;
                        variables.insert(
                            *id,
                            (
                                ReadCursor::new(member_content),
                                ReadCursor::new(member_lens),
                            ),
                        );
                    } else {
                        let num_bytes = if supports_vsf { count * width.max(1) } else { count };
                        if content_off + num_bytes > content_buf.len() {
                            return Err(ThriftError::corrupt(0, "truncated cluster content stream"));
                        }
                        let member_content = &content_buf[content_off..content_off + num_bytes];
                        content_off += num_bytes;
                        variables.insert(*id, (ReadCursor::new(member_content), ReadCursor::new(&[])));
                    }
                }
                if content_off != content_buf.len() || lens_off != lens_buf.len() {
                    return Err(ThriftError::corrupt(
                        0,
                        "residual bytes after splitting cluster stream",
                    ));
                }
            }
        }

        Ok(ReadStreamSet {
            singletons,
            variables,
        })
    }

    pub fn singleton_mut(&mut self, id: SingletonId) -> &mut ReadCursor<'a> {
        &mut self.singletons[id as usize]
    }

    pub fn variable_mut(&mut self, id: LogicalId) -> Result<&mut ReadCursor<'a>> {
        Ok(&mut self
            .variables
            .entry(id)
            .or_insert_with(|| (ReadCursor::new(&[]), ReadCursor::new(&[])))
            .0)
    }

    pub fn vsf_lens_mut(&mut self, id: LogicalId) -> Result<&mut ReadCursor<'a>> {
        Ok(&mut self
            .variables
            .entry(id)
            .or_insert_with(|| (ReadCursor::new(&[]), ReadCursor::new(&[])))
            .1)
    }

    pub fn read_type(&mut self) -> Result<TType> {
        let byte = self.singleton_mut(SingletonId::Types).read_byte()?;
        TType::from_u8(byte).ok_or_else(|| ThriftError::corrupt(0, "unknown type tag"))
    }

    pub fn read_field_delta(&mut self) -> Result<i16> {
        self.singleton_mut(SingletonId::FieldDeltas).read_le_i16()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BaseConfig, LogicalCluster, PathInfo};
    use crate::ttype::NodeId;
    use std::collections::BTreeMap;

    #[test]
    fn unclustered_emission_is_sorted() {
        let mut m = BTreeMap::new();
        m.insert(vec![NodeId::field(1)], PathInfo::new(5, TType::I32));
        m.insert(vec![NodeId::field(2)], PathInfo::new(2, TType::I32));
        let base = BaseConfig::new(m, TType::Struct, vec![]).unwrap();
        let mut wss = WriteStreamSet::new(&base, true);
        wss.variable_mut(5).write_le_i32(1);
        wss.variable_mut(2).write_le_i32(2);
        let out = wss.finish(vec![]);
        let ids: Vec<LogicalId> = out.variables.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 5]);
    }

    #[test]
    fn cluster_round_trip_numeric() {
        let mut m = BTreeMap::new();
        m.insert(vec![NodeId::field(1)], PathInfo::new(0, TType::I32));
        m.insert(vec![NodeId::field(2)], PathInfo::new(1, TType::I32));
        let base =
            BaseConfig::new(m, TType::Struct, vec![LogicalCluster::new(vec![0, 1], 9)]).unwrap();
        let mut wss = WriteStreamSet::new(&base, true);
        wss.variable_mut(0).write_le_i32(10);
        wss.variable_mut(0).write_le_i32(20);
        wss.variable_mut(1).write_le_i32(30);
        let out = wss.finish(vec![]);
        assert_eq!(out.clusters.len(), 1);
        assert_eq!(out.clusters[0].data.content.len(), 12);
        let mut lengths = ReadCursor::new(&out.cluster_lengths);
        assert_eq!(lengths.read_le_u32().unwrap(), 2); // 8 bytes / 4 = 2 elements
        assert_eq!(lengths.read_le_u32().unwrap(), 1);

        let input = DecodeInput {
            singletons: std::array::from_fn(|_| &[] as &[u8]),
            variables: vec![],
            clusters: vec![(&out.clusters[0].data.content, &[])],
            cluster_lengths: &out.cluster_lengths,
        };
        let mut rss = ReadStreamSet::new(&base, true, input).unwrap();
        assert_eq!(rss.variable_mut(0).unwrap().read_le_i32().unwrap(), 10);
        assert_eq!(rss.variable_mut(0).unwrap().read_le_i32().unwrap(), 20);
        assert_eq!(rss.variable_mut(1).unwrap().read_le_i32().unwrap(), 30);
    }
}
