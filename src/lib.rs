/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 G3-OSS developers.
 */

//! Bidirectional, configurable splitter/unsplitter for TCompact and TBinary
//! Thrift messages.
//!
//! [`encode`] decomposes one or more concatenated Thrift messages into a
//! fixed family of singleton streams plus a configurable family of variable
//! streams keyed by structural path, byte-exactly reversible via [`decode`].
//! See `DESIGN.md` for the wire-format and stream-layout details.

pub mod config;
pub mod driver;
pub mod error;
pub mod path_tracker;
pub mod protocol;
pub mod streams;
pub mod ttype;
pub mod wire;

pub use config::{
    BaseConfig, DecoderConfig, EncoderConfig, LogicalCluster, LogicalId, PathInfo, WireFormat,
};
pub use driver::{decode, encode};
pub use error::{ConfigError, Result, ThriftError};
pub use streams::{ClusterStreamData, DecodeInput, EncodeOutput, VariableStreamData};
pub use ttype::{NodeId, Path, TType};
