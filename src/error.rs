/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 G3-OSS developers.
 */

use thiserror::Error;

/// Errors raised while validating a [`crate::config::BaseConfig`] (or one of
/// its `Encoder`/`Decoder` specializations) at construction time.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("path is empty")]
    EmptyPath,
    #[error("logical id {id} is mapped to conflicting types")]
    LogicalIdTypeMismatch { id: u16 },
    #[error("cluster {index} is empty")]
    EmptyCluster { index: usize },
    #[error("cluster {index} mixes types")]
    MixedTypeCluster { index: usize },
    #[error("length path has no matching data path")]
    LengthsWithoutData,
    #[error("feature {feature} requires format version >= {required}, have {have}")]
    FormatVersionTooLow {
        feature: &'static str,
        required: u32,
        have: u32,
    },
    #[error("node id {id} conflicts with an existing node of a different type")]
    ConflictingNodeType { id: i32 },
    #[error("node already has a bound stream")]
    DuplicateStreamBinding,
    #[error("node already has a LENGTH child")]
    DuplicateLengthChild,
    #[error("truncated config bytes")]
    Truncated,
    #[error("invalid config byte encoding: {0}")]
    Malformed(&'static str),
}

/// Top level error type returned by [`crate::encode`] and [`crate::decode`].
///
/// Format-version-too-low surfaces via [`ConfigError::FormatVersionTooLow`]
/// rather than a dedicated top-level variant: every gate is checked once at
/// config construction, before any message is parsed. There's no variant
/// for an allocator failure either; `Vec`/`String` growth aborts the
/// process on OOM rather than returning a `Result` this crate could catch.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ThriftError {
    #[error("thrift parser failed at position {pos}: {reason}")]
    CorruptWire { pos: usize, reason: &'static str },

    #[error("thrift parser failed at position {pos}: {reason}")]
    CorruptWireOwned { pos: usize, reason: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("exceeded maximum thrift recursion depth of {limit}")]
    DepthExceeded { limit: usize },
}

pub type Result<T> = std::result::Result<T, ThriftError>;

impl ThriftError {
    pub(crate) fn corrupt(pos: usize, reason: &'static str) -> Self {
        ThriftError::CorruptWire { pos, reason }
    }

    pub(crate) fn corrupt_owned(pos: usize, reason: String) -> Self {
        ThriftError::CorruptWireOwned { pos, reason }
    }
}
