//! AMF3 and LDF codecs, standalone and as definition-file types.

use structdsl::amf3::{self, Amf3Error, Amf3Value};
use structdsl::ldf::{self, LdfEntry, LdfError};
use structdsl::{BitStream, BitStreamError, ParseError, StructParser, TypeRegistry, Value};

fn wide(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
}

/// Append one LDF entry header (key and type id) to `out`.
fn ldf_key(out: &mut Vec<u8>, key: &str, type_id: u8) {
    let k = wide(key);
    out.push(k.len() as u8);
    out.extend(k);
    out.push(type_id);
}

fn sample_ldf() -> Vec<u8> {
    let mut out = 3u32.to_le_bytes().to_vec();
    ldf_key(&mut out, "id", 1);
    out.extend((-5i32).to_le_bytes());
    ldf_key(&mut out, "name", 0);
    out.extend(2u32.to_le_bytes());
    out.extend(wide("ok"));
    ldf_key(&mut out, "on", 7);
    out.push(1);
    out
}

// ==================== AMF3 ====================

#[test]
fn amf3_scalars() {
    let mut data = vec![0x00, 0x02, 0x03, 0x05];
    data.extend(1.5f64.to_le_bytes());
    data.extend([0x06, 0x07, b'a', b'b', b'c']);
    let mut s = BitStream::new(&data);
    assert_eq!(amf3::read(&mut s).unwrap(), Amf3Value::Undefined);
    assert_eq!(amf3::read(&mut s).unwrap(), Amf3Value::Bool(false));
    assert_eq!(amf3::read(&mut s).unwrap(), Amf3Value::Bool(true));
    assert_eq!(amf3::read(&mut s).unwrap(), Amf3Value::Double(1.5));
    assert_eq!(
        amf3::read(&mut s).unwrap(),
        Amf3Value::String("abc".to_string())
    );
    assert!(s.is_fully_consumed());
}

#[test]
fn amf3_string_references() {
    // array { "ab": <ref 0> } with no dense part
    let data = [0x09, 0x01, 0x05, b'a', b'b', 0x06, 0x00, 0x01];
    let mut s = BitStream::new(&data);
    assert_eq!(
        amf3::read(&mut s).unwrap(),
        Amf3Value::Array {
            assoc: vec![("ab".to_string(), Amf3Value::String("ab".to_string()))],
            dense: vec![],
        }
    );

    let bad = [0x06, 0x02];
    assert!(matches!(
        amf3::read(&mut BitStream::new(&bad)),
        Err(Amf3Error::BadStringReference { index: 1, len: 0 })
    ));
}

#[test]
fn amf3_dense_array() {
    let data = [0x09, 0x05, 0x01, 0x03, 0x00];
    let v = amf3::read(&mut BitStream::new(&data)).unwrap();
    assert_eq!(
        v,
        Amf3Value::Array {
            assoc: vec![],
            dense: vec![Amf3Value::Bool(true), Amf3Value::Undefined],
        }
    );
    assert_eq!(Value::from(v), Value::List(vec![Value::Bool(true), Value::Null]));
}

#[test]
fn amf3_unknown_marker() {
    assert!(matches!(
        amf3::read(&mut BitStream::new(&[0x0a])),
        Err(Amf3Error::UnknownMarker(0x0a))
    ));
    assert!(matches!(
        amf3::read(&mut BitStream::new(&[0x06])),
        Err(Amf3Error::Stream(BitStreamError::EndOfData { .. }))
    ));
}

#[test]
fn amf3_writer_encodes_u29_widths() {
    let mut out = Vec::new();
    amf3::write(&Amf3Value::String("x".repeat(100)), &mut out).unwrap();
    // 100 chars -> header 201 -> two U29 bytes
    assert_eq!(&out[..3], &[0x06, 0x81, 0x49]);
    assert_eq!(out.len(), 3 + 100);

    let long = "y".repeat(0x12_3456);
    let mut out = Vec::new();
    amf3::write(&Amf3Value::String(long.clone()), &mut out).unwrap();
    assert_eq!(out.len(), 1 + 4 + long.len());
    let back = amf3::read(&mut BitStream::new(&out)).unwrap();
    assert_eq!(back, Amf3Value::String(long));
}

#[test]
fn amf3_writer_output_reads_back() {
    let value = Amf3Value::Array {
        assoc: vec![
            ("enabled".to_string(), Amf3Value::Bool(true)),
            ("scale".to_string(), Amf3Value::Double(-0.25)),
            (
                "child".to_string(),
                Amf3Value::Array {
                    assoc: vec![("name".to_string(), Amf3Value::String("n".to_string()))],
                    dense: vec![],
                },
            ),
        ],
        dense: vec![Amf3Value::Undefined],
    };
    let mut out = Vec::new();
    amf3::write(&value, &mut out).unwrap();
    assert_eq!(amf3::read(&mut BitStream::new(&out)).unwrap(), value);
}

/// `depth` arrays, each holding the next one as its only dense item.
fn nested_arrays(depth: usize) -> Vec<u8> {
    let mut data = [0x09, 0x03, 0x01].repeat(depth);
    data.push(0x00);
    data
}

#[test]
fn amf3_nesting_is_bounded() {
    let ok = nested_arrays(amf3::MAX_DEPTH);
    assert!(amf3::read(&mut BitStream::new(&ok)).is_ok());

    let deep = nested_arrays(amf3::MAX_DEPTH + 1);
    assert!(matches!(
        amf3::read(&mut BitStream::new(&deep)),
        Err(Amf3Error::TooDeep(_))
    ));

    let hostile = nested_arrays(200_000);
    let parser = StructParser::with_types("[amf3] - v\n", &codec_registry()).expect("compile");
    match parser.parse(&hostile).next() {
        Some(Err(ParseError::Stream {
            source: BitStreamError::Malformed { format, .. },
            ..
        })) => assert_eq!(format, "AMF3"),
        other => panic!("expected malformed AMF3, got {:?}", other),
    }
}

// ==================== LDF ====================

#[test]
fn ldf_reads_entries() {
    let data = sample_ldf();
    let mut s = BitStream::new(&data);
    let entries = ldf::read(&mut s).unwrap();
    assert_eq!(
        entries,
        vec![
            LdfEntry {
                key: "id".to_string(),
                type_id: 1,
                value: Value::I32(-5),
            },
            LdfEntry {
                key: "name".to_string(),
                type_id: 0,
                value: Value::Str("ok".to_string()),
            },
            LdfEntry {
                key: "on".to_string(),
                type_id: 7,
                value: Value::Bool(true),
            },
        ]
    );
    assert!(s.is_fully_consumed());
}

#[test]
fn ldf_numeric_and_bytes_types() {
    let mut data = 4u32.to_le_bytes().to_vec();
    ldf_key(&mut data, "f", 3);
    data.extend(2.5f32.to_le_bytes());
    ldf_key(&mut data, "u", 5);
    data.extend(7u32.to_le_bytes());
    ldf_key(&mut data, "i", 9);
    data.extend((-1i64).to_le_bytes());
    ldf_key(&mut data, "b", 13);
    data.extend(2u32.to_le_bytes());
    data.extend([0xca, 0xfe]);
    let values: Vec<_> = ldf::read(&mut BitStream::new(&data))
        .unwrap()
        .into_iter()
        .map(|e| e.value)
        .collect();
    assert_eq!(
        values,
        vec![
            Value::Float(2.5),
            Value::U32(7),
            Value::I64(-1),
            Value::Bytes(vec![0xca, 0xfe]),
        ]
    );
}

#[test]
fn ldf_unknown_type_id() {
    let mut data = 1u32.to_le_bytes().to_vec();
    ldf_key(&mut data, "x", 2);
    match ldf::read(&mut BitStream::new(&data)) {
        Err(LdfError::UnknownType { key, type_id }) => {
            assert_eq!(key, "x");
            assert_eq!(type_id, 2);
        }
        other => panic!("expected UnknownType, got {:?}", other),
    }
}

// ==================== As definition types ====================

fn codec_registry() -> TypeRegistry {
    TypeRegistry::builtin()
        .with("amf3", amf3::decode_value)
        .with("ldf", ldf::decode_value)
}

#[test]
fn codecs_as_field_types() {
    let parser = StructParser::with_types(
        "cfg=[ldf] - config, expect \"on\" in value\n[amf3] - extra\n[u8] - tail\n",
        &codec_registry(),
    )
    .expect("compile");
    let mut data = sample_ldf();
    data.extend([0x03, 0x09]);
    let got: Vec<_> = parser.parse(&data).map(|r| r.unwrap()).collect();
    assert_eq!(got.len(), 3);
    assert_eq!(
        got[0].value,
        Value::Map(vec![
            ("id".to_string(), Value::I32(-5)),
            ("name".to_string(), Value::Str("ok".to_string())),
            ("on".to_string(), Value::Bool(true)),
        ])
    );
    assert_eq!(got[0].unexpected, Some(false));
    assert_eq!(got[1].value, Value::Bool(true));
    assert_eq!(got[2].value, Value::U8(9));
}

#[test]
fn malformed_codec_data_is_a_stream_error() {
    let parser = StructParser::with_types("[amf3] - blob\n", &codec_registry()).expect("compile");
    let mut it = parser.parse(&[0x0b]);
    match it.next() {
        Some(Err(ParseError::Stream {
            source: BitStreamError::Malformed { format, .. },
            ..
        })) => assert_eq!(format, "AMF3"),
        other => panic!("expected malformed AMF3, got {:?}", other),
    }
}
