/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 G3-OSS developers.
 */

//! Thrift's type tag and node-id vocabulary, shared by TCompact and TBinary.

/// A Thrift wire type tag. Only a subset appears on the wire; `Void` is
/// internal bookkeeping and `Stream`/`Utf8`/`Utf16` are rejected wherever
/// they would otherwise be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TType {
    Stop = 0,
    Void = 1,
    Bool = 2,
    Byte = 3,
    Double = 4,
    Deprecated16 = 5,
    I16 = 6,
    Deprecated32 = 7,
    I32 = 8,
    Deprecated64 = 9,
    I64 = 10,
    String = 11,
    Struct = 12,
    Map = 13,
    Set = 14,
    List = 15,
    Utf8 = 16,
    Utf16 = 17,
    Stream = 18,
    U16 = 19,
    U32 = 20,
    U64 = 21,
    Float = 22,
}

impl TType {
    pub fn from_u8(b: u8) -> Option<TType> {
        use TType::*;
        Some(match b {
            0 => Stop,
            1 => Void,
            2 => Bool,
            3 => Byte,
            4 => Double,
            6 => I16,
            8 => I32,
            10 => I64,
            11 => String,
            12 => Struct,
            13 => Map,
            14 => Set,
            15 => List,
            16 => Utf8,
            17 => Utf16,
            18 => Stream,
            19 => U16,
            20 => U32,
            21 => U64,
            22 => Float,
            _ => return None,
        })
    }

    /// `Set` is treated identically to `List` everywhere in this crate: the
    /// split streams and recursion logic never distinguish them, though the
    /// original tag is preserved in the `TYPES` stream so it can be restored
    /// on decode (see the coercion note in DESIGN.md).
    pub fn coerce(self) -> TType {
        if self == TType::Set {
            TType::List
        } else {
            self
        }
    }

    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            TType::Bool
                | TType::Byte
                | TType::I16
                | TType::I32
                | TType::I64
                | TType::Float
                | TType::Double
        )
    }
}

/// A Thrift node id: either an ordinary 16-bit field id, or one of the seven
/// structural sentinels above `i16::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub i32);

impl NodeId {
    pub const MAP_KEY: NodeId = NodeId(i32::MAX);
    pub const MAP_VALUE: NodeId = NodeId(i32::MAX - 1);
    pub const LIST_ELEM: NodeId = NodeId(i32::MAX - 2);
    pub const STOP: NodeId = NodeId(i32::MAX - 3);
    pub const ROOT: NodeId = NodeId(i32::MAX - 4);
    pub const LENGTH: NodeId = NodeId(i32::MAX - 5);
    pub const MESSAGE_HEADER: NodeId = NodeId(i32::MAX - 6);

    pub fn field(id: i16) -> NodeId {
        NodeId(id as i32)
    }

    pub fn is_special(self) -> bool {
        self.0 < i16::MIN as i32 || self.0 > i16::MAX as i32
    }

    /// The minimum `min_format_version` a config must declare to use this
    /// sentinel. Ordinary field ids always return `0`.
    pub fn min_format_version(self) -> u32 {
        match self {
            NodeId::MAP_KEY
            | NodeId::MAP_VALUE
            | NodeId::LIST_ELEM
            | NodeId::ROOT
            | NodeId::LENGTH => crate::config::MIN_FORMAT_VERSION_ENCODE,
            NodeId::MESSAGE_HEADER => crate::config::MIN_FORMAT_VERSION_TULIP_V2,
            _ => 0,
        }
    }
}

/// An ordered sequence of node ids describing descent from the message
/// root. `Vec<NodeId>` is used directly rather than a newtype so configs can
/// build paths with ordinary vector literals.
pub type Path = Vec<NodeId>;

pub fn path_to_string(path: &[NodeId]) -> String {
    let mut s = String::from("[");
    for (i, id) in path.iter().enumerate() {
        if i > 0 {
            s.push_str(", ");
        }
        s.push_str(&id.0.to_string());
    }
    s.push(']');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_coerces_to_list() {
        assert_eq!(TType::Set.coerce(), TType::List);
        assert_eq!(TType::List.coerce(), TType::List);
        assert_eq!(TType::Struct.coerce(), TType::Struct);
    }

    #[test]
    fn sentinel_ids_are_special() {
        assert!(NodeId::MAP_KEY.is_special());
        assert!(NodeId::MESSAGE_HEADER.is_special());
        assert!(!NodeId::field(5).is_special());
        assert!(!NodeId::field(i16::MAX).is_special());
    }
}
