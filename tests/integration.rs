//! Integration tests: compile definitions, interpret them against byte buffers.

use std::io::Write;
use structdsl::{
    BitStream, BitStreamError, CompileError, EvalError, ParseError, StructParser, Structure,
    TypeRegistry, Value, Variables,
};

/// (depth, description, value, unexpected) for every record; panics on error.
fn records<'p>(parser: &'p StructParser, data: &[u8]) -> Vec<(usize, &'p str, Value, Option<bool>)> {
    parser
        .parse(data)
        .map(|r| {
            let s = r.expect("record");
            (s.depth, s.description, s.value, s.unexpected)
        })
        .collect()
}

#[test]
fn test_repeat_by_value() {
    let parser = StructParser::new("[u8] - count, assert > 0\n\t[u8] - item\n").expect("compile");
    let got = records(&parser, &[0x03, 0x10, 0x20, 0x30]);
    assert_eq!(
        got,
        vec![
            (0, "count", Value::U8(3), None),
            (1, "item", Value::U8(16), None),
            (1, "item", Value::U8(32), None),
            (1, "item", Value::U8(48), None),
        ]
    );
}

#[test]
fn test_zero_count_skips_children() {
    let parser = StructParser::new("[u8] - count\n\t[u8] - item\n[u8] - tail\n").expect("compile");
    let got = records(&parser, &[0, 9]);
    assert_eq!(got.len(), 2);
    assert_eq!(got[1].1, "tail");
}

#[test]
fn test_bool_flag_guards_children() {
    let parser = StructParser::new("[bit] - present\n\t[u8] - body\n").expect("compile");
    let got = records(&parser, &[0x80, 0x00]);
    assert_eq!(
        got,
        vec![
            (0, "present", Value::Bool(true), None),
            (1, "body", Value::U8(0), None),
        ]
    );
    let got = records(&parser, &[0x00]);
    assert_eq!(got, vec![(0, "present", Value::Bool(false), None)]);
}

#[test]
fn test_if_on_bound_value() {
    let src = "value=[u8] - flag\nif value == 1:\n\t[u8] - extra\n[u8] - tail\n";
    let parser = StructParser::new(src).expect("compile");

    let got = records(&parser, &[0, 9]);
    let descriptions: Vec<_> = got.iter().map(|r| r.1).collect();
    assert_eq!(descriptions, vec!["flag", "tail"]);

    let got = records(&parser, &[1, 7, 9]);
    assert_eq!(
        got,
        vec![
            (0, "flag", Value::U8(1), None),
            (1, "extra", Value::U8(7), None),
            (0, "tail", Value::U8(9), None),
        ]
    );
}

#[test]
fn test_while_with_guarded_break() {
    let src = "\
value=[u8] - first
while value > 0:
\tvalue=[u8] - next
\tif value == 0:
\t\tbreak
\t[u8] - payload
[u8] - tail
";
    let parser = StructParser::new(src).expect("compile");
    let got = records(&parser, &[1, 5, 0xaa, 0, 0xbb]);
    assert_eq!(
        got,
        vec![
            (0, "first", Value::U8(1), None),
            (1, "next", Value::U8(5), None),
            (1, "payload", Value::U8(0xaa), None),
            (1, "next", Value::U8(0), None),
            (0, "tail", Value::U8(0xbb), None),
        ]
    );
}

#[test]
fn test_while_ends_when_condition_fails() {
    let src = "n=[u8] - n\nwhile n > 0:\n\tn=[u8] - n\n";
    let parser = StructParser::new(src).expect("compile");
    let got = records(&parser, &[2, 1, 0]);
    assert_eq!(got.len(), 3);
    let mut it = parser.parse(&[2, 1]);
    assert!(it.next().unwrap().is_ok());
    assert!(it.next().unwrap().is_ok());
    assert!(matches!(
        it.next(),
        Some(Err(ParseError::Stream {
            source: BitStreamError::EndOfData { .. },
            ..
        }))
    ));
}

#[test]
fn test_inner_break_leaves_outer_loop_running() {
    let src = "\
outer=[u8] - outer
while outer:
\tinner=[u8] - inner
\twhile inner:
\t\tif inner == 9:
\t\t\tbreak
\t\tinner=[u8] - next inner
\touter=[u8] - outer again
[u8] - tail
";
    let parser = StructParser::new(src).expect("compile");
    let got = records(&parser, &[1, 1, 9, 1, 9, 0, 0x77]);
    assert_eq!(
        got,
        vec![
            (0, "outer", Value::U8(1), None),
            (1, "inner", Value::U8(1), None),
            (2, "next inner", Value::U8(9), None),
            (1, "outer again", Value::U8(1), None),
            (1, "inner", Value::U8(9), None),
            (1, "outer again", Value::U8(0), None),
            (0, "tail", Value::U8(0x77), None),
        ]
    );
}

#[test]
fn test_break_fires_after_several_false_guards() {
    let src = "\
n=[u8] - n
while True:
\tif n == 0:
\t\tbreak
\t[u8] - item
\tn=[u8] - n
[u8] - tail
";
    let parser = StructParser::new(src).expect("compile");
    let values: Vec<_> = records(&parser, &[3, 0xa0, 2, 0xa1, 1, 0xa2, 0, 0xee])
        .into_iter()
        .map(|r| (r.1, r.2))
        .collect();
    assert_eq!(
        values,
        vec![
            ("n", Value::U8(3)),
            ("item", Value::U8(0xa0)),
            ("n", Value::U8(2)),
            ("item", Value::U8(0xa1)),
            ("n", Value::U8(1)),
            ("item", Value::U8(0xa2)),
            ("n", Value::U8(0)),
            ("tail", Value::U8(0xee)),
        ]
    );
}

#[test]
fn test_bodiless_if_and_while_are_skipped() {
    let src = "[u8] - head\nwhile True:\nif undefined_name:\n[u8] - tail\n";
    let parser = StructParser::new(src).expect("compile");
    let got = records(&parser, &[1, 2]);
    assert_eq!(
        got,
        vec![
            (0, "head", Value::U8(1), None),
            (0, "tail", Value::U8(2), None),
        ]
    );
}

#[test]
fn test_expect_is_tri_state() {
    let src = "[u8] - a\n[u8] - b, expect == 1\n[u8] - c, expect == 1\n[u8] - d, expect > 0 and < 3\n";
    let parser = StructParser::new(src).expect("compile");
    let flags: Vec<_> = records(&parser, &[7, 1, 2, 5]).into_iter().map(|r| r.3).collect();
    assert_eq!(flags, vec![None, Some(false), Some(true), Some(true)]);
}

#[test]
fn test_back_reference_in_assert() {
    let parser = StructParser::new("len=[u8] - length\n[u8] - copy, assert == len\n").expect("compile");
    assert_eq!(records(&parser, &[4, 4]).len(), 2);

    let mut it = parser.parse(&[4, 5]);
    assert!(it.next().unwrap().is_ok());
    match it.next() {
        Some(Err(ParseError::Assertion {
            line,
            description,
            expression,
            value,
        })) => {
            assert_eq!(line, 2);
            assert_eq!(description, "copy");
            assert_eq!(expression, "value == len");
            assert_eq!(value, Value::U8(5));
        }
        other => panic!("expected assertion failure, got {:?}", other),
    }
}

#[test]
fn test_assert_names_the_failing_conjunct() {
    let parser =
        StructParser::new("[u8] - level, assert value > 1 and value < 5\n").expect("compile");
    match parser.parse(&[9]).next() {
        Some(Err(ParseError::Assertion { expression, .. })) => {
            assert_eq!(expression, "value < 5");
        }
        other => panic!("expected assertion failure, got {:?}", other),
    }
}

#[test]
fn test_expect_conjunction_guards_later_checks() {
    let src = "x=[u8] - divisor\n[u8] - ratio, expect x != 0 and 10 // x > 1\n";
    let parser = StructParser::new(src).expect("compile");
    let flags: Vec<_> = records(&parser, &[0, 1]).into_iter().map(|r| r.3).collect();
    assert_eq!(flags, vec![None, Some(true)]);
    let flags: Vec<_> = records(&parser, &[2, 1]).into_iter().map(|r| r.3).collect();
    assert_eq!(flags, vec![None, Some(false)]);
}

#[test]
fn test_assert_failure_keeps_earlier_records() {
    let parser =
        StructParser::new("[u8] - a\n[u8] - b\n[u8] - c, assert < 10\n[u8] - d\n").expect("compile");
    let results: Vec<_> = parser.parse(&[1, 2, 30, 4]).collect();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().value, Value::U8(1));
    assert_eq!(results[1].as_ref().unwrap().value, Value::U8(2));
    assert!(matches!(results[2], Err(ParseError::Assertion { line: 3, .. })));
}

#[test]
fn test_same_input_same_records() {
    let src = "n=[u8] - n\n\t[u16] - v, expect < 0x100\nif n == 2:\n\t[u8_str] - name\n";
    let parser = StructParser::new(src).expect("compile");
    let data = [2, 0x01, 0x00, 0x00, 0x02, 2, b'h', b'i'];
    let first: Vec<Structure<'_>> = parser.parse(&data).map(|r| r.unwrap()).collect();
    let second: Vec<Structure<'_>> = parser.parse(&data).map(|r| r.unwrap()).collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
    assert_eq!(first[2].unexpected, Some(true));
    assert_eq!(first[3].value, Value::Str("hi".to_string()));
}

#[test]
fn test_seeded_namespace() {
    let parser = StructParser::new("if mode == 2:\n\t[u16] - wide\n[u8] - narrow\n").expect("compile");
    let vars = Variables::new().with("mode", Value::I64(2));
    let got: Vec<_> = parser
        .parse_with(&[0x34, 0x12, 9], vars)
        .map(|r| r.unwrap().value)
        .collect();
    assert_eq!(got, vec![Value::U16(0x1234), Value::U8(9)]);

    let mut unseeded = parser.parse(&[9]);
    assert!(matches!(
        unseeded.next(),
        Some(Err(ParseError::Eval {
            line: 1,
            source: EvalError::UnknownVariable(_),
            ..
        }))
    ));
    assert!(unseeded.next().is_none());
}

#[test]
fn test_namespace_carries_over_between_calls() {
    let parser = StructParser::new("total=[u8] - total, expect > prev\n").expect("compile");
    let mut records = parser.parse_with(&[5], Variables::new().with("prev", Value::U8(0)));
    assert_eq!(records.next().unwrap().unwrap().unexpected, Some(false));
    let mut vars = records.into_variables();
    assert_eq!(vars.get("total"), Some(&Value::U8(5)));

    vars.set("prev", Value::U8(5));
    let mut records = parser.parse_with(&[3], vars);
    assert_eq!(records.next().unwrap().unwrap().unexpected, Some(true));
}

#[test]
fn test_explicit_address_seeks() {
    let parser = StructParser::new("[A:0x2,u8] - third\n[u8] - fourth\n").expect("compile");
    let got: Vec<_> = parser.parse(&[0, 0, 7, 8]).map(|r| r.unwrap().value).collect();
    assert_eq!(got, vec![Value::U8(7), Value::U8(8)]);

    let parser = StructParser::new("[A:0x0BIT4,L:BIT1] - bit four\n").expect("compile");
    let mut records = parser.parse(&[0b0000_1000]);
    assert_eq!(records.next().unwrap().unwrap().value, Value::Bool(true));
    assert!(records.next().is_none());
    assert!(records.is_fully_consumed());
}

#[test]
fn test_seek_past_end_fails() {
    let parser = StructParser::new("[A:0x10,u8] - far\n").expect("compile");
    let mut it = parser.parse(&[1, 2]);
    assert!(matches!(
        it.next(),
        Some(Err(ParseError::Stream {
            source: BitStreamError::SeekOutOfRange { .. },
            ..
        }))
    ));
}

#[test]
fn test_length_derived_types() {
    let parser = StructParser::new("[L:2] - signed\n[L:3] - raw\n").expect("compile");
    let got: Vec<_> = parser
        .parse(&[0xfe, 0xff, 1, 2, 3])
        .map(|r| r.unwrap().value)
        .collect();
    assert_eq!(got, vec![Value::I16(-2), Value::Bytes(vec![1, 2, 3])]);
}

#[test]
fn test_strings() {
    let parser = StructParser::new("[u8_wstr] - name\n[u16_str] - tag\n").expect("compile");
    let data = [2, b'h', 0, b'i', 0, 3, 0, b'a', b'b', b'c'];
    let got: Vec<_> = parser.parse(&data).map(|r| r.unwrap().value).collect();
    assert_eq!(
        got,
        vec![Value::Str("hi".to_string()), Value::Str("abc".to_string())]
    );
}

#[test]
fn test_unconsumed_data_is_advisory() {
    let parser = StructParser::new("[u8] - a\n").expect("compile");
    let mut records = parser.parse(&[1, 2]);
    assert!(records.by_ref().all(|r| r.is_ok()));
    assert!(!records.is_fully_consumed());
    let summary = records.finish();
    assert!(!summary.fully_consumed);
    assert_eq!(summary.bits_consumed, 8);

    match parser.parse_all_strict(&[1, 2]) {
        Err(ParseError::NotFullyConsumed {
            position,
            remaining_bits,
        }) => assert_eq!((position, remaining_bits), (8, 8)),
        other => panic!("expected NotFullyConsumed, got {:?}", other),
    }
    assert_eq!(parser.parse_all_strict(&[1]).expect("strict").len(), 1);
}

#[test]
fn test_negative_repeat_is_fatal() {
    let parser = StructParser::new("[s8] - n\n\t[u8] - item\n").expect("compile");
    let mut it = parser.parse(&[0xff, 0]);
    assert_eq!(it.next().unwrap().unwrap().value, Value::I8(-1));
    assert!(matches!(
        it.next(),
        Some(Err(ParseError::NegativeRepeat { line: 1, .. }))
    ));
    assert!(it.next().is_none());
}

#[test]
fn test_unknown_type_fails_at_construction() {
    match StructParser::new("[u8] - ok\n[u24] - odd\n") {
        Err(CompileError::UnknownType { line, name }) => {
            assert_eq!(line, 2);
            assert_eq!(name, "u24");
        }
        other => panic!("expected UnknownType, got {:?}", other),
    }
}

#[test]
fn test_custom_type_handler() {
    let registry = TypeRegistry::builtin()
        .with("fixed8_8", |s| s.read_i16().map(|v| Value::Double(v as f64 / 256.0)));
    let parser = StructParser::with_types("[fixed8_8] - speed, expect > 1\n", &registry).expect("compile");
    let rec = parser.parse(&[0x80, 0x01]).next().unwrap().unwrap();
    assert_eq!(rec.value, Value::Double(1.5));
    assert_eq!(rec.unexpected, Some(false));
}

#[test]
fn test_parse_stream_from_offset() {
    let parser = StructParser::new("[u8] - x\n").expect("compile");
    let data = [1, 2, 3];
    let mut stream = BitStream::new(&data);
    stream.seek(16).expect("seek");
    let got: Vec<_> = parser
        .parse_stream(stream, Variables::new())
        .map(|r| r.unwrap().value)
        .collect();
    assert_eq!(got, vec![Value::U8(3)]);
}

#[test]
fn test_from_path() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, "# header\nn=[u8] - n\n\t[u8] - item\n").expect("write");
    let parser = StructParser::from_path(file.path(), &TypeRegistry::builtin()).expect("compile");
    assert_eq!(records(&parser, &[1, 9]).len(), 2);

    let missing = file.path().with_extension("missing");
    assert!(matches!(
        StructParser::from_path(&missing, &TypeRegistry::builtin()),
        Err(CompileError::Io(_))
    ));
}

#[test]
fn test_shared_parser_across_threads() {
    let parser = StructParser::new("n=[u8] - n\n\t[u8] - item\n").expect("compile");
    std::thread::scope(|scope| {
        for n in 0u8..4 {
            let parser = &parser;
            scope.spawn(move || {
                let mut data = vec![n];
                data.extend(std::iter::repeat(7).take(n as usize));
                assert_eq!(records(parser, &data).len(), 1 + n as usize);
            });
        }
    });
}
