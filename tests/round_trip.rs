//! End-to-end round-trip tests covering naked-primitive structs, collections,
//! cross-protocol stream equivalence, empty configs, naked root containers,
//! clusters, and legacy VSF paths, plus the general testable properties
//! (round trip, concatenation, non-canonical rejection, depth bound,
//! determinism, emission order). Messages are hand-assembled wire bytes
//! rather than produced by a Thrift library, since this crate's only
//! wire-format writer is the protocol implementation under test itself.

use std::collections::BTreeMap;

use hex_literal::hex;
use thrift_splitter::config::{
    BaseConfig, DecoderConfig, EncoderConfig, LogicalCluster, LogicalId, PathInfo, WireFormat,
};
use thrift_splitter::protocol::binary::Binary;
use thrift_splitter::protocol::compact::Compact;
use thrift_splitter::protocol::ThriftProtocol;
use thrift_splitter::streams::{DecodeInput, EncodeOutput};
use thrift_splitter::ttype::{NodeId, TType};
use thrift_splitter::wire::WriteCursor;
use thrift_splitter::{decode, encode};

// Standard Apache/FB Thrift TCompactProtocol type nibbles (see
// src/protocol/compact.rs and DESIGN.md's open-question note on CT_FLOAT).
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
const CT_STRUCT: u8 = 0x0C;
const CT_FLOAT: u8 = 0x0D;

fn compact_field_header(delta: u8, type_nibble: u8) -> u8 {
    (delta << 4) | type_nibble
}

fn decode_input(out: &EncodeOutput) -> DecodeInput<'_> {
    DecodeInput {
        singletons: std::array::from_fn(|i| out.singletons[i].as_slice()),
        variables: out
            .variables
            .iter()
            .map(|(id, d)| (*id, d.content.as_slice(), d.lens.as_slice()))
            .collect(),
        clusters: out
            .clusters
            .iter()
            .map(|c| (c.data.content.as_slice(), c.data.lens.as_slice()))
            .collect(),
        cluster_lengths: &out.cluster_lengths,
    }
}

fn roundtrip(input: &[u8], enc: &EncoderConfig) -> EncodeOutput {
    let out = encode(input, enc).expect("encode should succeed");
    let dec = DecoderConfig::deserialize(&out.config_bytes).expect("config should deserialize");
    let decoded = decode(decode_input(&out), &dec).expect("decode should succeed");
    assert_eq!(decoded, input, "decode(encode(m)) must equal m byte-for-byte");
    out
}

fn path_map(entries: &[(Vec<NodeId>, LogicalId, TType)]) -> BTreeMap<Vec<NodeId>, PathInfo> {
    entries
        .iter()
        .map(|(p, id, t)| (p.clone(), PathInfo::new(*id, *t)))
        .collect()
}

/// A struct with one field per primitive type, in TCompact.
fn naked_primitives_message() -> Vec<u8> {
    let mut w = WriteCursor::new();
    w.write_byte(compact_field_header(1, CT_BOOLEAN_FALSE)); // field 1: bool = false
    w.write_byte(compact_field_header(1, CT_BYTE)); // field 2: byte = 0xbe
    w.write_byte(0xbe);
    w.write_byte(compact_field_header(1, CT_I16)); // field 3: i16 = 0xbeef
    Compact::write_i16(&mut w, 0xbeefu16 as i16);
    w.write_byte(compact_field_header(1, CT_I32)); // field 4: i32 = 0xdeadbeef
    Compact::write_i32(&mut w, 0xdeadbeefu32 as i32);
    w.write_byte(compact_field_header(1, CT_I64)); // field 5: i64 = 0xfaceb00cdeadbeef
    Compact::write_i64(&mut w, 0xfaceb00cdeadbeefu64 as i64);
    w.write_byte(compact_field_header(1, CT_FLOAT)); // field 6: f32 = 0.42
    Compact::write_f32(&mut w, 0.42f32);
    w.write_byte(compact_field_header(1, CT_DOUBLE)); // field 7: f64 = 0.42
    Compact::write_f64(&mut w, 0.42f64);
    w.write_byte(compact_field_header(1, CT_BINARY)); // field 8: string "B" * 42
    Compact::write_string_len(&mut w, 42);
    w.write_bytes(&[b'B'; 42]);
    w.write_byte(0x00); // stop
    w.into_vec()
}

fn naked_primitives_config() -> EncoderConfig {
    let m = path_map(&[
        (vec![NodeId::field(1)], 0, TType::Bool),
        (vec![NodeId::field(2)], 1, TType::Byte),
        (vec![NodeId::field(3)], 2, TType::I16),
        (vec![NodeId::field(4)], 3, TType::I32),
        (vec![NodeId::field(5)], 4, TType::I64),
        (vec![NodeId::field(6)], 5, TType::Float),
        (vec![NodeId::field(7)], 6, TType::Double),
        (vec![NodeId::field(8)], 7, TType::String),
    ]);
    // format 10: below the VSF gate, so the string's length lands in the
    // shared LENGTHS singleton rather than a per-id parallel stream.
    EncoderConfig::new(m, TType::Struct, vec![], WireFormat::Compact, false, 10).unwrap()
}

#[test]
fn naked_primitives_struct_round_trips() {
    let input = naked_primitives_message();
    let enc = naked_primitives_config();
    let out = roundtrip(&input, &enc);

    let expected_types: Vec<u8> = [
        TType::Bool,
        TType::Byte,
        TType::I16,
        TType::I32,
        TType::I64,
        TType::Float,
        TType::Double,
        TType::String,
        TType::Stop,
    ]
    .iter()
    .map(|t| *t as u8)
    .collect();
    assert_eq!(out.singletons[0], expected_types, "TYPES stream");

    let mut expected_deltas = Vec::new();
    for _ in 0..8 {
        expected_deltas.extend_from_slice(&1i16.to_le_bytes());
    }
    assert_eq!(out.singletons[1], expected_deltas, "FIELD_DELTAS stream");

    assert_eq!(out.singletons[2], 42u32.to_le_bytes(), "LENGTHS stream");

    let var = |id: LogicalId| -> &[u8] {
        out.variables
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, d)| d.content.as_slice())
            .unwrap()
    };
    assert_eq!(var(0), &[0u8]);
    assert_eq!(var(1), &[0xbeu8]);
    assert_eq!(var(2), &(0xbeefu16 as i16).to_le_bytes());
    assert_eq!(var(3), &(0xdeadbeefu32 as i32).to_le_bytes());
    assert_eq!(var(4), &(0xfaceb00cdeadbeefu64 as i64).to_le_bytes());
    assert_eq!(var(5), &0.42f32.to_le_bytes());
    assert_eq!(var(6), &0.42f64.to_le_bytes());
    assert_eq!(var(7), &[b'B'; 42]);
}

/// Collections, with TCompact's size == 0 map omitting key/value types.
#[test]
fn empty_map_omits_type_bytes() {
    let mut w = WriteCursor::new();
    w.write_byte(compact_field_header(1, 0x0B)); // field 1: map<i32, bool>, CT_MAP
    w.write_byte(0x00); // varint size 0, no type bytes follow
    w.write_byte(0x00); // stop
    let input = w.into_vec();

    let enc = EncoderConfig::new(BTreeMap::new(), TType::Struct, vec![], WireFormat::Compact, false, 10)
        .unwrap();
    let out = roundtrip(&input, &enc);

    // TYPES holds only the field's own Map tag and the final Stop, with no
    // key or value type tags, since the map was empty.
    assert_eq!(out.singletons[0], vec![TType::Map as u8, TType::Stop as u8]);
    assert_eq!(out.singletons[2], 0u32.to_le_bytes(), "map cardinality");
}

#[test]
fn collections_cardinalities_and_round_trip() {
    let mut w = WriteCursor::new();
    w.write_byte(compact_field_header(1, CT_LIST)); // field 1: list<bool>, size 2
    w.write_byte((2u8 << 4) | CT_BOOLEAN_TRUE);
    w.write_byte(CT_BOOLEAN_TRUE);
    w.write_byte(CT_BOOLEAN_FALSE);
    w.write_byte(compact_field_header(1, CT_SET)); // field 2: set<i32>, size 3
    w.write_byte((3u8 << 4) | CT_I32);
    Compact::write_i32(&mut w, 1);
    Compact::write_i32(&mut w, -1);
    Compact::write_i32(&mut w, 1_000_000);
    w.write_byte(compact_field_header(1, 0x0B)); // field 3: map<i32, bool>, size 2
    w.write_byte(0x02); // varint size 2
    w.write_byte((CT_I32 << 4) | CT_BOOLEAN_TRUE);
    Compact::write_i32(&mut w, 7);
    w.write_byte(CT_BOOLEAN_TRUE);
    Compact::write_i32(&mut w, 8);
    w.write_byte(CT_BOOLEAN_FALSE);
    w.write_byte(0x00); // stop
    let input = w.into_vec();

    let enc = EncoderConfig::new(BTreeMap::new(), TType::Struct, vec![], WireFormat::Compact, false, 10)
        .unwrap();
    let out = roundtrip(&input, &enc);

    // LENGTHS holds the three container cardinalities in traversal order.
    let mut r = thrift_splitter::wire::ReadCursor::new(&out.singletons[2]);
    assert_eq!(r.read_le_u32().unwrap(), 2);
    assert_eq!(r.read_le_u32().unwrap(), 3);
    assert_eq!(r.read_le_u32().unwrap(), 2);
}

/// The same logical data encoded via TBinary yields the same variable
/// stream content as TCompact, compared here for a single scalar field,
/// since the split streams are wire-format-agnostic little-endian bodies
/// regardless of which protocol produced them.
#[test]
fn compact_and_binary_variable_streams_match() {
    let m = path_map(&[(vec![NodeId::field(1)], 0, TType::I32)]);

    let mut cw = WriteCursor::new();
    cw.write_byte(compact_field_header(1, CT_I32));
    Compact::write_i32(&mut cw, -559038737);
    cw.write_byte(0x00);
    let compact_enc = EncoderConfig::new(
        m.clone(),
        TType::Struct,
        vec![],
        WireFormat::Compact,
        false,
        10,
    )
    .unwrap();
    let compact_out = roundtrip(&cw.into_vec(), &compact_enc);

    let mut bw = WriteCursor::new();
    bw.write_byte(TType::I32 as u8);
    bw.write_be_i16(1);
    Binary::write_i32(&mut bw, -559038737);
    bw.write_byte(TType::Stop as u8);
    let binary_enc =
        EncoderConfig::new(m, TType::Struct, vec![], WireFormat::Binary, false, 10).unwrap();
    let binary_out = roundtrip(&bw.into_vec(), &binary_enc);

    assert_eq!(compact_out.variables, binary_out.variables);
}

/// An empty config round trips and produces no variable streams.
#[test]
fn empty_config_round_trips_with_no_variable_streams() {
    let input = naked_primitives_message();
    let enc = EncoderConfig::new(BTreeMap::new(), TType::Struct, vec![], WireFormat::Compact, false, 10)
        .unwrap();
    let out = roundtrip(&input, &enc);
    assert!(out.variables.is_empty());
}

/// Naked root types (LIST / SET / MAP) round-trip without an enclosing
/// struct.
#[test]
fn naked_root_list_round_trips() {
    let mut w = WriteCursor::new();
    w.write_byte((3u8 << 4) | CT_I32); // list<i32>, size 3
    Compact::write_i32(&mut w, 1);
    Compact::write_i32(&mut w, 2);
    Compact::write_i32(&mut w, 3);
    let input = w.into_vec();

    let enc = EncoderConfig::new(BTreeMap::new(), TType::List, vec![], WireFormat::Compact, false, 10)
        .unwrap();
    roundtrip(&input, &enc);
}

#[test]
fn naked_root_map_round_trips() {
    let mut w = WriteCursor::new();
    w.write_byte(0x01); // varint size 1
    w.write_byte((CT_I32 << 4) | CT_I32);
    Compact::write_i32(&mut w, 9);
    Compact::write_i32(&mut w, 99);
    let input = w.into_vec();

    let enc = EncoderConfig::new(BTreeMap::new(), TType::Map, vec![], WireFormat::Compact, false, 10)
        .unwrap();
    roundtrip(&input, &enc);
}

/// A cluster of two int32-list paths at format 14 emits one concatenated
/// stream plus a cluster-segment-lengths stream counting *elements*.
#[test]
fn cluster_concatenates_and_splits() {
    let mut w = WriteCursor::new();
    w.write_byte(compact_field_header(1, CT_LIST)); // field 1: list<i32>, size 3
    w.write_byte((3u8 << 4) | CT_I32);
    Compact::write_i32(&mut w, 10);
    Compact::write_i32(&mut w, 20);
    Compact::write_i32(&mut w, 30);
    w.write_byte(compact_field_header(1, CT_LIST)); // field 2: list<i32>, size 2
    w.write_byte((2u8 << 4) | CT_I32);
    Compact::write_i32(&mut w, 100);
    Compact::write_i32(&mut w, 200);
    w.write_byte(0x00); // stop
    let input = w.into_vec();

    let m = path_map(&[
        (vec![NodeId::field(1), NodeId::LIST_ELEM], 0, TType::I32),
        (vec![NodeId::field(2), NodeId::LIST_ELEM], 1, TType::I32),
    ]);
    let clusters = vec![LogicalCluster::new(vec![0, 1], 9)];
    let enc = EncoderConfig::new(m, TType::Struct, clusters, WireFormat::Compact, false, 14).unwrap();
    let out = roundtrip(&input, &enc);

    assert_eq!(out.clusters.len(), 1);
    assert_eq!(out.clusters[0].successor, 9);
    assert_eq!(out.clusters[0].data.content.len(), (3 + 2) * 4);

    let mut lengths = thrift_splitter::wire::ReadCursor::new(&out.cluster_lengths);
    assert_eq!(lengths.read_le_u32().unwrap(), 3, "3 elements in list 1");
    assert_eq!(lengths.read_le_u32().unwrap(), 2, "2 elements in list 2");
}

/// An old-style VSF path (separate data + length logical ids) round
/// trips below format 14 and is rejected at format >= 14, where the string
/// node auto-attaches its own combined length child.
#[test]
fn old_style_vsf_path_round_trips_below_format_14() {
    let mut w = WriteCursor::new();
    w.write_byte(compact_field_header(1, CT_BINARY)); // field 1: string "hi"
    Compact::write_string_len(&mut w, 2);
    w.write_bytes(b"hi");
    w.write_byte(0x00); // stop
    let input = w.into_vec();

    let m = path_map(&[
        (vec![NodeId::field(1)], 0, TType::String),
        (vec![NodeId::field(1), NodeId::LENGTH], 1, TType::I32),
    ]);
    let enc =
        EncoderConfig::new(m, TType::Struct, vec![], WireFormat::Compact, false, 10).unwrap();
    roundtrip(&input, &enc);
}

#[test]
fn old_style_vsf_path_rejected_at_format_14() {
    let mut w = WriteCursor::new();
    w.write_byte(compact_field_header(1, CT_BINARY));
    Compact::write_string_len(&mut w, 2);
    w.write_bytes(b"hi");
    w.write_byte(0x00);
    let input = w.into_vec();

    let m = path_map(&[
        (vec![NodeId::field(1)], 0, TType::String),
        (vec![NodeId::field(1), NodeId::LENGTH], 1, TType::I32),
    ]);
    let enc =
        EncoderConfig::new(m, TType::Struct, vec![], WireFormat::Compact, false, 14).unwrap();
    assert!(encode(&input, &enc).is_err());
}

/// concatenated messages round-trip and the parser correctly
/// restarts at each message boundary.
#[test]
fn concatenated_messages_round_trip() {
    let one = naked_primitives_message();
    let mut both = one.clone();
    both.extend_from_slice(&one);
    let enc = naked_primitives_config();
    roundtrip(&both, &enc);
}

/// a field header with a nibble-sized delta re-encoded as a
/// varint is non-canonical and must be rejected.
#[test]
fn non_canonical_field_header_is_rejected() {
    // delta_nibble = 0 (varint path) encoding field id 3 from prev_id 0:
    // zigzag(3) = 6. The canonical encoder would have used the nibble form.
    let input = [CT_I32, 0x06];
    let enc = EncoderConfig::new(BTreeMap::new(), TType::Struct, vec![], WireFormat::Compact, false, 10)
        .unwrap();
    assert!(encode(&input, &enc).is_err());
}

/// recursion past the encode depth limit fails cleanly rather
/// than overflowing the native stack.
#[test]
fn depth_limit_exceeded_fails_cleanly() {
    // Each byte opens one more nested single-field struct (field id 1, type
    // STRUCT); well past MAX_DEPTH_ENCODE (128) before input is exhausted.
    let input = vec![compact_field_header(1, CT_STRUCT); 140];
    let enc = EncoderConfig::new(BTreeMap::new(), TType::Struct, vec![], WireFormat::Compact, false, 10)
        .unwrap();
    assert!(encode(&input, &enc).is_err());
}

/// two encodes of the same input with the same config produce
/// byte-identical output across every stream.
#[test]
fn determinism_across_repeated_encodes() {
    let input = naked_primitives_message();
    let enc = naked_primitives_config();
    let a = encode(&input, &enc).unwrap();
    let b = encode(&input, &enc).unwrap();
    assert_eq!(a, b);
}

/// unclustered variable streams emit in ascending logical-id
/// order regardless of the order fields appear on the wire or in the config.
#[test]
fn unclustered_streams_emit_in_ascending_id_order() {
    let input = naked_primitives_message();
    let enc = naked_primitives_config();
    let out = encode(&input, &enc).unwrap();
    let ids: Vec<LogicalId> = out.variables.iter().map(|(id, _)| *id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

/// a lengths-only path with no matching data path is rejected at
/// config construction time, before any message is ever parsed.
#[test]
fn lengths_without_data_rejected_at_config_construction() {
    let m = path_map(&[(vec![NodeId::field(1), NodeId::LENGTH], 0, TType::I32)]);
    assert!(BaseConfig::new(m, TType::Struct, vec![]).is_err());
}

/// a raw TCompact fixture given as a hex literal (one bool field,
/// value true, then stop) round-trips identically to the hand-assembled
/// byte-vector fixtures above.
#[test]
fn hex_fixture_round_trips() {
    let input = hex!("11 00").to_vec(); // field 1 delta=1, CT_BOOLEAN_TRUE; stop
    let m = path_map(&[(vec![NodeId::field(1)], 0, TType::Bool)]);
    let enc = EncoderConfig::new(m, TType::Struct, vec![], WireFormat::Compact, false, 10)
        .unwrap();
    let out = roundtrip(&input, &enc);
    assert_eq!(
        out.variables.iter().find(|(id, _)| *id == 0).unwrap().1.content,
        vec![1u8]
    );
}
