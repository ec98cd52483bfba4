/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 G3-OSS developers.
 */

//! Validated representation of the per-path extraction plan consumed by the
//! parsers. `BaseConfig` holds everything shared between encode and decode;
//! `EncoderConfig` and `DecoderConfig` each add the handful of fields only
//! relevant to their direction.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::error::{ConfigError, Result, ThriftError};
use crate::ttype::{NodeId, Path, TType};
use crate::wire::{ReadCursor, WriteCursor};

pub type LogicalId = u16;

/// Which Thrift wire format a config targets. TulipV2 framing is only
/// defined for `Compact`: attempting it under `Binary` is a configuration
/// error rather than a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireFormat {
    Compact = 0,
    Binary = 1,
}

impl WireFormat {
    fn from_u8(b: u8) -> Result<Self> {
        match b {
            0 => Ok(WireFormat::Compact),
            1 => Ok(WireFormat::Binary),
            _ => Err(ConfigError::Malformed("bad wire format byte").into()),
        }
    }
}

/// 10 = minimum encode/decode format version.
pub const MIN_FORMAT_VERSION_ENCODE: u32 = 10;
/// 12 = TulipV2 framing and clusters.
pub const MIN_FORMAT_VERSION_TULIP_V2: u32 = 12;
/// 12 = clusters (same gate as TulipV2).
pub const MIN_FORMAT_VERSION_CLUSTERS: u32 = 12;
/// 14 = string VSF (combined data+length stream) and cluster lengths
/// measured in elements rather than bytes.
pub const MIN_FORMAT_VERSION_VSF: u32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInfo {
    pub id: LogicalId,
    pub ttype: TType,
}

impl PathInfo {
    pub fn new(id: LogicalId, ttype: TType) -> Self {
        PathInfo { id, ttype }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalCluster {
    pub ids: Vec<LogicalId>,
    /// Opaque routing tag for the host's compression graph; this crate never
    /// interprets it beyond passing it through.
    pub successor: i32,
}

impl LogicalCluster {
    pub fn new(ids: Vec<LogicalId>, successor: i32) -> Self {
        LogicalCluster { ids, successor }
    }
}

/// Fields shared between [`EncoderConfig`] and [`DecoderConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseConfig {
    path_map: BTreeMap<Path, PathInfo>,
    root_type: TType,
    clusters: Vec<LogicalCluster>,
    logical_ids: FxHashSet<LogicalId>,
}

impl BaseConfig {
    pub fn new(
        path_map: BTreeMap<Path, PathInfo>,
        root_type: TType,
        clusters: Vec<LogicalCluster>,
    ) -> Result<Self> {
        let mut logical_ids = FxHashSet::default();
        for info in path_map.values() {
            logical_ids.insert(info.id);
        }
        let config = BaseConfig {
            path_map,
            root_type: root_type.coerce(),
            clusters,
            logical_ids,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn path_map(&self) -> &BTreeMap<Path, PathInfo> {
        &self.path_map
    }

    pub fn root_type(&self) -> TType {
        self.root_type
    }

    pub fn clusters(&self) -> &[LogicalCluster] {
        &self.clusters
    }

    pub fn logical_ids(&self) -> &FxHashSet<LogicalId> {
        &self.logical_ids
    }

    pub fn logical_stream_at(&self, path: &[NodeId]) -> Option<PathInfo> {
        self.path_map.get(path).copied()
    }

    /// Logical ids not referenced by any cluster, in ascending order.
    /// Emitted before clusters on encode.
    pub fn unclustered_streams(&self) -> Vec<LogicalId> {
        let clustered: FxHashSet<LogicalId> = self
            .clusters
            .iter()
            .flat_map(|c| c.ids.iter().copied())
            .collect();
        let mut ids: Vec<LogicalId> = self
            .logical_ids
            .iter()
            .copied()
            .filter(|id| !clustered.contains(id))
            .collect();
        ids.sort_unstable();
        ids
    }

    fn type_of_logical_id(&self, id: LogicalId) -> Option<TType> {
        self.path_map.values().find(|info| info.id == id).map(|info| info.ttype)
    }

    fn validate(&self) -> Result<()> {
        // Invariant 1: every path is non-empty.
        for path in self.path_map.keys() {
            if path.is_empty() {
                return Err(ConfigError::EmptyPath.into());
            }
        }

        // Invariant 2: all paths mapped to the same logical id share type.
        let mut seen: BTreeMap<LogicalId, TType> = BTreeMap::new();
        for info in self.path_map.values() {
            match seen.get(&info.id) {
                Some(ttype) if *ttype != info.ttype => {
                    return Err(ConfigError::LogicalIdTypeMismatch { id: info.id }.into());
                }
                _ => {
                    seen.insert(info.id, info.ttype);
                }
            }
        }

        // Invariant 3: clusters are non-empty and type-homogeneous.
        for (index, cluster) in self.clusters.iter().enumerate() {
            if cluster.ids.is_empty() {
                return Err(ConfigError::EmptyCluster { index }.into());
            }
            let mut cluster_type: Option<TType> = None;
            for id in &cluster.ids {
                let ttype = self.type_of_logical_id(*id);
                match (cluster_type, ttype) {
                    (None, t) => cluster_type = t,
                    (Some(a), Some(b)) if a != b => {
                        return Err(ConfigError::MixedTypeCluster { index }.into());
                    }
                    _ => {}
                }
            }
        }

        // Invariant 4: a LENGTH-terminated path requires its data prefix to
        // also be configured. The data prefix is the path with the trailing
        // LENGTH removed; for a container's element count (as opposed to a
        // string's byte length) that prefix is itself the *parent* of a
        // configured path rather than a literal key, e.g. `[f1, LIST_ELEM]`
        // configured makes `[f1, LENGTH]` valid even though `[f1]` alone was
        // never assigned a stream. Mirrors `parse_config.cpp`'s two-pass
        // `dataPrefixes` set: every non-LENGTH path contributes both itself
        // and itself-minus-its-last-element as a valid data prefix.
        let mut data_prefixes: std::collections::BTreeSet<&[NodeId]> =
            std::collections::BTreeSet::new();
        for path in self.path_map.keys() {
            if path.last() != Some(&NodeId::LENGTH) {
                data_prefixes.insert(path.as_slice());
                data_prefixes.insert(&path[..path.len() - 1]);
            }
        }
        for path in self.path_map.keys() {
            if path.last() == Some(&NodeId::LENGTH) {
                let prefix = &path[..path.len() - 1];
                if prefix.is_empty() || !data_prefixes.contains(prefix) {
                    return Err(ConfigError::LengthsWithoutData.into());
                }
            }
        }

        Ok(())
    }

    /// Invariant 5 / invariant 6 checks that require knowing the declared
    /// format version and direction-specific flags; called by
    /// `EncoderConfig`/`DecoderConfig` constructors after they know those
    /// flags.
    fn validate_format_gates(
        &self,
        min_format_version: u32,
        parse_tulip_v2: bool,
        wire_format: WireFormat,
    ) -> Result<()> {
        if min_format_version < MIN_FORMAT_VERSION_ENCODE {
            return Err(ConfigError::FormatVersionTooLow {
                feature: "encode/decode",
                required: MIN_FORMAT_VERSION_ENCODE,
                have: min_format_version,
            }
            .into());
        }

        for path in self.path_map.keys() {
            for id in path {
                if id.is_special() {
                    let required = id.min_format_version();
                    if min_format_version < required {
                        return Err(ConfigError::FormatVersionTooLow {
                            feature: "sentinel node id",
                            required,
                            have: min_format_version,
                        }
                        .into());
                    }
                }
            }
        }

        if parse_tulip_v2 {
            if min_format_version < MIN_FORMAT_VERSION_TULIP_V2 {
                return Err(ConfigError::FormatVersionTooLow {
                    feature: "TulipV2",
                    required: MIN_FORMAT_VERSION_TULIP_V2,
                    have: min_format_version,
                }
                .into());
            }
            if wire_format != WireFormat::Compact {
                return Err(ConfigError::Malformed("TulipV2 is only defined for TCompact").into());
            }
        }

        if !self.clusters.is_empty() && min_format_version < MIN_FORMAT_VERSION_CLUSTERS {
            return Err(ConfigError::FormatVersionTooLow {
                feature: "clusters",
                required: MIN_FORMAT_VERSION_CLUSTERS,
                have: min_format_version,
            }
            .into());
        }

        Ok(())
    }
}

/// Consumed by `encode()`. Adds the TulipV2 flag and the declared minimum
/// format version. The per-type default successor map the external
/// compression-graph builder uses to route singleton streams lives entirely
/// on the host side; this crate only ever passes a successor through for a
/// [`LogicalCluster`], since clusters are its own construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    base: BaseConfig,
    wire_format: WireFormat,
    parse_tulip_v2: bool,
    min_format_version: u32,
}

impl EncoderConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path_map: BTreeMap<Path, PathInfo>,
        root_type: TType,
        clusters: Vec<LogicalCluster>,
        wire_format: WireFormat,
        parse_tulip_v2: bool,
        min_format_version: u32,
    ) -> Result<Self> {
        let base = BaseConfig::new(path_map, root_type, clusters)?;
        base.validate_format_gates(min_format_version, parse_tulip_v2, wire_format)?;
        Ok(EncoderConfig {
            base,
            wire_format,
            parse_tulip_v2,
            min_format_version,
        })
    }

    pub fn base(&self) -> &BaseConfig {
        &self.base
    }

    pub fn wire_format(&self) -> WireFormat {
        self.wire_format
    }

    pub fn parse_tulip_v2(&self) -> bool {
        self.parse_tulip_v2
    }

    pub fn min_format_version(&self) -> u32 {
        self.min_format_version
    }

    pub fn supports_vsf(&self) -> bool {
        self.min_format_version >= MIN_FORMAT_VERSION_VSF
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = WriteCursor::new();
        w.write_be_u32(self.min_format_version);
        w.write_byte(self.base.root_type() as u8);
        w.write_byte(self.wire_format as u8);
        w.write_byte(self.parse_tulip_v2 as u8);
        write_path_map(&mut w, &self.base);
        write_clusters(&mut w, &self.base);
        w.into_vec()
    }
}

/// Consumed by `decode()`. Adds the original byte length the decoded output
/// must match and whether TulipV2-style message headers should be
/// re-spliced in front of each decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    base: BaseConfig,
    wire_format: WireFormat,
    original_size: usize,
    unparse_message_headers: bool,
    min_format_version: u32,
}

impl DecoderConfig {
    pub fn new(
        base: BaseConfig,
        wire_format: WireFormat,
        original_size: usize,
        unparse_message_headers: bool,
        min_format_version: u32,
    ) -> Result<Self> {
        base.validate_format_gates(min_format_version, unparse_message_headers, wire_format)?;
        Ok(DecoderConfig {
            base,
            wire_format,
            original_size,
            unparse_message_headers,
            min_format_version,
        })
    }

    pub fn from_encoder(encoder: &EncoderConfig, original_size: usize) -> Result<Self> {
        DecoderConfig::new(
            encoder.base.clone(),
            encoder.wire_format,
            original_size,
            encoder.parse_tulip_v2,
            encoder.min_format_version,
        )
    }

    pub fn base(&self) -> &BaseConfig {
        &self.base
    }

    pub fn wire_format(&self) -> WireFormat {
        self.wire_format
    }

    pub fn original_size(&self) -> usize {
        self.original_size
    }

    pub fn unparse_message_headers(&self) -> bool {
        self.unparse_message_headers
    }

    pub fn min_format_version(&self) -> u32 {
        self.min_format_version
    }

    pub fn supports_vsf(&self) -> bool {
        self.min_format_version >= MIN_FORMAT_VERSION_VSF
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut w = WriteCursor::new();
        w.write_be_u32(self.min_format_version);
        w.write_byte(self.base.root_type() as u8);
        w.write_byte(self.wire_format as u8);
        w.write_byte(self.unparse_message_headers as u8);
        w.write_varint_u64(self.original_size as u64);
        write_path_map(&mut w, &self.base);
        write_clusters(&mut w, &self.base);
        w.into_vec()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut r = ReadCursor::new(bytes);
        let min_format_version = r.read_be_u32()?;
        let root_byte = r.read_byte()?;
        let root_type = TType::from_u8(root_byte)
            .ok_or(ConfigError::Malformed("bad root type byte"))?;
        let wire_format = WireFormat::from_u8(r.read_byte()?)?;
        let unparse_message_headers = r.read_byte()? != 0;
        let original_size = r.read_varint_u64()? as usize;
        let path_map = read_path_map(&mut r)?;
        let clusters = read_clusters(&mut r)?;
        let base = BaseConfig::new(path_map, root_type, clusters)?;
        DecoderConfig::new(
            base,
            wire_format,
            original_size,
            unparse_message_headers,
            min_format_version,
        )
    }
}

fn write_path_map(w: &mut WriteCursor, base: &BaseConfig) {
    w.write_varint_u64(base.path_map().len() as u64);
    for (path, info) in base.path_map() {
        w.write_varint_u64(path.len() as u64);
        for id in path {
            w.write_le_i32(id.0);
        }
        w.write_le_u16(info.id);
        w.write_byte(info.ttype as u8);
    }
}

fn read_path_map(r: &mut ReadCursor) -> Result<BTreeMap<Path, PathInfo>> {
    let count = r.read_varint_u64()?;
    let mut map = BTreeMap::new();
    for _ in 0..count {
        let len = r.read_varint_u64()?;
        let mut path = Vec::with_capacity(len as usize);
        for _ in 0..len {
            path.push(NodeId(r.read_le_i32()?));
        }
        let logical_id = r.read_le_u16()?;
        let ttype_byte = r.read_byte()?;
        let ttype =
            TType::from_u8(ttype_byte).ok_or(ConfigError::Malformed("bad path type byte"))?;
        map.insert(path, PathInfo::new(logical_id, ttype));
    }
    Ok(map)
}

fn write_clusters(w: &mut WriteCursor, base: &BaseConfig) {
    w.write_varint_u64(base.clusters().len() as u64);
    for cluster in base.clusters() {
        w.write_be_i32(cluster.successor);
        w.write_varint_u64(cluster.ids.len() as u64);
        for id in &cluster.ids {
            w.write_le_u16(*id);
        }
    }
}

fn read_clusters(r: &mut ReadCursor) -> Result<Vec<LogicalCluster>> {
    let count = r.read_varint_u64()?;
    let mut clusters = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let successor = r.read_be_i32()?;
        let id_count = r.read_varint_u64()?;
        let mut ids = Vec::with_capacity(id_count as usize);
        for _ in 0..id_count {
            ids.push(r.read_le_u16()?);
        }
        clusters.push(LogicalCluster::new(ids, successor));
    }
    Ok(clusters)
}
