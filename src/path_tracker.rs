/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 G3-OSS developers.
 */

//! Walks a validated [`BaseConfig`] in lockstep with the parser, resolving
//! each position in the thrift tree to the stream that holds its data.
//!
//! Nodes live in a flat arena (`Vec<Node>`, addressed by [`NodeIdx`]) rather
//! than being linked by raw pointers, and an [`Iterator`] carries its own
//! path vector instead of a parent pointer, so the whole graph is plain
//! owned data with no borrow-checker fighting.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::config::{BaseConfig, LogicalId};
use crate::error::{ConfigError, Result, ThriftError};
use crate::streams::SingletonId;
use crate::ttype::{NodeId, TType};

/// Maximum recursion depth while encoding. Changing this requires a format
/// version bump.
pub const MAX_DEPTH_ENCODE: usize = 128;
/// Maximum recursion depth while decoding. Kept looser than encode because a
/// corrupt `TYPES` stream can otherwise be crafted to recurse deeper than any
/// real message the encoder would have produced.
pub const MAX_DEPTH_DECODE: usize = 256;

const VEC_SLOTS: usize = 1024;
/// One slot per `TType` discriminant, `Float` (22) being the highest.
const NUM_TTYPES: usize = TType::Float as usize + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeIdx(u32);

/// Identifies which concrete stream a node's data lives in, without holding
/// a live borrow of it. The parser looks this up in the
/// [`crate::streams::WriteStreamSet`]/[`crate::streams::ReadStreamSet`] for
/// the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRef {
    Singleton(SingletonId),
    Variable(LogicalId),
    /// The parallel string-length stream auto-attached to a `STRING` node's
    /// `LENGTH` child when the config supports combined VSF encoding.
    VsfLens(LogicalId),
}

struct Node {
    id: NodeId,
    ttype: TType,
    stream: Option<StreamRef>,
    children_vec: Vec<Option<NodeIdx>>,
    children_map: FxHashMap<i32, NodeIdx>,
    lengths: Option<NodeIdx>,
    map_key: Option<NodeIdx>,
    map_value: Option<NodeIdx>,
    list_elem: Option<NodeIdx>,
}

impl Node {
    fn new(id: NodeId, ttype: TType, stream: Option<StreamRef>) -> Self {
        Node {
            id,
            ttype: ttype.coerce(),
            stream,
            children_vec: Vec::new(),
            children_map: FxHashMap::default(),
            lengths: None,
            map_key: None,
            map_value: None,
            list_elem: None,
        }
    }

    fn child_slot(&self, id: NodeId) -> Option<NodeIdx> {
        match id {
            NodeId::MAP_KEY => self.map_key,
            NodeId::MAP_VALUE => self.map_value,
            NodeId::LIST_ELEM => self.list_elem,
            NodeId::LENGTH => self.lengths,
            _ => {
                let idx = id.0;
                if idx >= 0 && (idx as usize) < VEC_SLOTS {
                    self.children_vec.get(idx as usize).copied().flatten()
                } else {
                    self.children_map.get(&idx).copied()
                }
            }
        }
    }

    fn set_child_slot(&mut self, id: NodeId, child: NodeIdx) {
        match id {
            NodeId::MAP_KEY => self.map_key = Some(child),
            NodeId::MAP_VALUE => self.map_value = Some(child),
            NodeId::LIST_ELEM => self.list_elem = Some(child),
            NodeId::LENGTH => self.lengths = Some(child),
            _ => {
                let idx = id.0;
                if idx >= 0 && (idx as usize) < VEC_SLOTS {
                    let idx = idx as usize;
                    if self.children_vec.len() <= idx {
                        self.children_vec.resize(idx + 1, None);
                    }
                    self.children_vec[idx] = Some(child);
                } else {
                    self.children_map.insert(idx, child);
                }
            }
        }
    }
}

/// The prebuilt walk graph for one [`BaseConfig`].
pub struct PathTracker {
    nodes: Vec<Node>,
    root: NodeIdx,
    fallback_by_type: [NodeIdx; NUM_TTYPES],
    fallback_lengths: NodeIdx,
    max_depth: usize,
}

impl PathTracker {
    pub fn build(config: &BaseConfig, supports_vsf: bool, max_depth: usize) -> Result<Self> {
        let mut nodes = Vec::new();

        let fallback_by_type: [NodeIdx; NUM_TTYPES] = std::array::from_fn(|i| {
            let ttype = TType::from_u8(i as u8).unwrap_or(TType::Void);
            let stream = singleton_for_type(ttype).map(StreamRef::Singleton);
            nodes.push(Node::new(NodeId(0), ttype, stream));
            NodeIdx((nodes.len() - 1) as u32)
        });

        nodes.push(Node::new(
            NodeId::LENGTH,
            TType::U32,
            Some(StreamRef::Singleton(SingletonId::Lengths)),
        ));
        let fallback_lengths = NodeIdx((nodes.len() - 1) as u32);

        nodes.push(Node::new(NodeId::ROOT, config.root_type(), None));
        let root = NodeIdx((nodes.len() - 1) as u32);

        let mut tracker = PathTracker {
            nodes,
            root,
            fallback_by_type,
            fallback_lengths,
            max_depth,
        };
        tracker.fill_graph(config, supports_vsf)?;
        Ok(tracker)
    }

    fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx.0 as usize]
    }

    fn node_mut(&mut self, idx: NodeIdx) -> &mut Node {
        &mut self.nodes[idx.0 as usize]
    }

    fn fallback_for(&self, ttype: TType) -> NodeIdx {
        self.fallback_by_type[ttype.coerce() as usize]
    }

    fn fill_graph(&mut self, config: &BaseConfig, supports_vsf: bool) -> Result<()> {
        for (path, info) in config.path_map() {
            let mut cur = self.root;
            for &id in path {
                let inferred = if id == NodeId::MAP_KEY || id == NodeId::MAP_VALUE {
                    Some(TType::Map)
                } else if id == NodeId::LIST_ELEM {
                    Some(TType::List)
                } else if !id.is_special() {
                    Some(TType::Struct)
                } else {
                    None
                };
                if let Some(inferred) = inferred {
                    let cur_node = self.node(cur);
                    if cur_node.ttype == TType::Void {
                        self.node_mut(cur).ttype = inferred;
                    } else if cur_node.ttype != inferred {
                        return Err(ConfigError::ConflictingNodeType { id: cur_node.id.0 }.into());
                    }
                }

                let next = match self.node(cur).child_slot(id) {
                    Some(existing) => existing,
                    None => {
                        self.nodes.push(Node::new(id, TType::Void, None));
                        let new_idx = NodeIdx((self.nodes.len() - 1) as u32);
                        self.node_mut(cur).set_child_slot(id, new_idx);
                        new_idx
                    }
                };
                cur = next;
            }

            if supports_vsf {
                if self.node(cur).stream.is_some() {
                    return Err(ConfigError::DuplicateStreamBinding.into());
                }
                if info.ttype == TType::String {
                    self.add_string_lengths_node(cur, info.id)?;
                }
            }

            let cur_node = self.node(cur);
            if cur_node.ttype != TType::Void && cur_node.ttype != info.ttype.coerce() {
                return Err(ConfigError::ConflictingNodeType { id: cur_node.id.0 }.into());
            }
            self.node_mut(cur).ttype = info.ttype.coerce();
            self.node_mut(cur).stream = Some(StreamRef::Variable(info.id));
        }
        Ok(())
    }

    fn add_string_lengths_node(&mut self, string_node: NodeIdx, id: LogicalId) -> Result<()> {
        if self.node(string_node).child_slot(NodeId::LENGTH).is_some() {
            return Err(ConfigError::DuplicateLengthChild.into());
        }
        self.nodes.push(Node::new(
            NodeId::LENGTH,
            TType::U32,
            Some(StreamRef::VsfLens(id)),
        ));
        let length_idx = NodeIdx((self.nodes.len() - 1) as u32);
        self.node_mut(string_node)
            .set_child_slot(NodeId::LENGTH, length_idx);
        Ok(())
    }

    pub fn root_iter(&self) -> Iterator<'_> {
        Iterator {
            tracker: self,
            node: self.root,
            id: NodeId::ROOT,
            ttype: self.node(self.root).ttype,
            depth: 0,
            path: SmallVec::new(),
        }
    }
}

fn singleton_for_type(ttype: TType) -> Option<SingletonId> {
    match ttype {
        TType::Bool => Some(SingletonId::Bool),
        TType::Byte => Some(SingletonId::Int8),
        TType::I16 => Some(SingletonId::Int16),
        TType::I32 => Some(SingletonId::Int32),
        TType::I64 => Some(SingletonId::Int64),
        TType::Float => Some(SingletonId::Float32),
        TType::Double => Some(SingletonId::Float64),
        TType::String => Some(SingletonId::Binary),
        _ => None,
    }
}

/// A position in the thrift tree during one parse/unparse call. Cheap to
/// clone-by-construction (`child()` and friends each hand back a fresh
/// value); must be re-derived from the parent at every recursion level
/// rather than cached across calls, since it borrows the tracker.
#[derive(Clone)]
pub struct Iterator<'a> {
    tracker: &'a PathTracker,
    node: NodeIdx,
    id: NodeId,
    ttype: TType,
    depth: usize,
    /// Almost every real Thrift struct nests well under 8 levels deep, so an
    /// inline buffer avoids a heap allocation per recursion level for the
    /// common case; it spills to the heap transparently past that.
    path: SmallVec<[NodeId; 8]>,
}

impl<'a> Iterator<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn ttype(&self) -> TType {
        self.ttype
    }

    pub fn path(&self) -> &[NodeId] {
        self.path.as_slice()
    }

    /// The stream bound to this exact node, if any. Containers (`STRUCT`,
    /// `LIST`, `MAP`, `SET`) and bookkeeping types (`STOP`, `VOID`) never
    /// carry a value of their own and always resolve to `None`.
    pub fn stream(&self) -> Option<StreamRef> {
        self.tracker.node(self.node).stream
    }

    fn descend(&self, child: NodeIdx, id: NodeId, ttype: TType) -> Result<Iterator<'a>> {
        let depth = self.depth + 1;
        if depth > self.tracker.max_depth {
            return Err(ThriftError::DepthExceeded {
                limit: self.tracker.max_depth,
            });
        }
        let mut path = self.path.clone();
        path.push(id);
        Ok(Iterator {
            tracker: self.tracker,
            node: child,
            id,
            ttype,
            depth,
            path,
        })
    }

    fn node_or_fallback(&self, slot: Option<NodeIdx>, ttype: TType) -> Result<NodeIdx> {
        let ttype = ttype.coerce();
        match slot {
            Some(idx) => {
                let node = self.tracker.node(idx);
                if node.ttype != ttype {
                    return Err(ConfigError::ConflictingNodeType { id: node.id.0 }.into());
                }
                Ok(idx)
            }
            None => Ok(self.tracker.fallback_for(ttype)),
        }
    }

    /// Ordinary field-id child. Must not be called with `MAP_KEY`,
    /// `MAP_VALUE`, `LIST_ELEM`, `LENGTH`, or `STOP`; use the dedicated
    /// methods below for those.
    pub fn child(&self, id: NodeId, ttype: TType) -> Result<Iterator<'a>> {
        debug_assert!(!matches!(
            id,
            NodeId::MAP_KEY | NodeId::MAP_VALUE | NodeId::LIST_ELEM | NodeId::LENGTH | NodeId::STOP
        ));
        let slot = self.tracker.node(self.node).child_slot(id);
        let resolved = match slot {
            Some(idx) => {
                let node = self.tracker.node(idx);
                if node.ttype != ttype.coerce() {
                    return Err(ConfigError::ConflictingNodeType { id: node.id.0 }.into());
                }
                idx
            }
            None => self.tracker.fallback_for(ttype),
        };
        self.descend(resolved, id, ttype.coerce())
    }

    pub fn lengths(&self) -> Result<Iterator<'a>> {
        let slot = self.tracker.node(self.node).lengths;
        let resolved = slot.unwrap_or(self.tracker.fallback_lengths);
        self.descend(resolved, NodeId::LENGTH, TType::U32)
    }

    pub fn map_key(&self, ttype: TType) -> Result<Iterator<'a>> {
        let slot = self.tracker.node(self.node).map_key;
        let resolved = self.node_or_fallback(slot, ttype)?;
        self.descend(resolved, NodeId::MAP_KEY, ttype.coerce())
    }

    pub fn map_value(&self, ttype: TType) -> Result<Iterator<'a>> {
        let slot = self.tracker.node(self.node).map_value;
        let resolved = self.node_or_fallback(slot, ttype)?;
        self.descend(resolved, NodeId::MAP_VALUE, ttype.coerce())
    }

    pub fn list_elem(&self, ttype: TType) -> Result<Iterator<'a>> {
        let slot = self.tracker.node(self.node).list_elem;
        let resolved = self.node_or_fallback(slot, ttype)?;
        self.descend(resolved, NodeId::LIST_ELEM, ttype.coerce())
    }

    pub fn stop(&self) -> Result<Iterator<'a>> {
        let resolved = self.tracker.fallback_for(TType::Stop);
        self.descend(resolved, NodeId::STOP, TType::Stop)
    }
}
