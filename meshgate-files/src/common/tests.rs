use serde_json::json;

use crate::common::cursor::{ByteCursor, Endian};
use crate::common::schema::Node;
use crate::ParserError;

#[test]
fn cursor_reads_both_endiannesses() -> Result<(), anyhow::Error> {
    let data = [0x01u8, 0x02, 0x03, 0x04];

    let mut little = ByteCursor::new(&data, Endian::Little, "test.bin");
    assert_eq!(little.read_u16()?, 0x0201);
    assert_eq!(little.read_u16()?, 0x0403);

    let mut big = ByteCursor::new(&data, Endian::Big, "test.bin");
    assert_eq!(big.read_u32()?, 0x0102_0304);
    assert_eq!(big.offset(), 4);
    assert_eq!(big.remaining(), 0);

    Ok(())
}

#[test]
fn cursor_read_past_end_is_out_of_bounds() {
    let data = [0u8; 3];
    let mut cursor = ByteCursor::new(&data, Endian::Little, "test.bin");
    cursor.skip(2);

    match cursor.read_u32() {
        Err(ParserError::OutOfBounds {
            offset, count, length, ..
        }) => {
            assert_eq!(offset, 2);
            assert_eq!(count, 4);
            assert_eq!(length, 3);
        }
        other => panic!("expected OutOfBounds, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn cursor_cstring_excludes_terminator() -> Result<(), anyhow::Error> {
    let data = b"Box\0rest";
    let mut cursor = ByteCursor::new(data, Endian::Little, "test.bin");

    assert_eq!(cursor.read_cstring()?, b"Box");
    assert_eq!(cursor.offset(), 4);
    assert_eq!(cursor.read_bytes(4)?, b"rest");

    Ok(())
}

#[test]
fn cursor_unterminated_cstring_fails() {
    let data = b"no terminator";
    let mut cursor = ByteCursor::new(data, Endian::Little, "test.bin");
    assert!(matches!(cursor.read_cstring(), Err(ParserError::OutOfBounds { .. })));
}

#[test]
fn cursor_negative_skip_is_a_no_op() {
    let data = [0u8; 8];
    let mut cursor = ByteCursor::new(&data, Endian::Little, "test.bin");
    cursor.skip(4);
    cursor.skip(-10);
    assert_eq!(cursor.offset(), 4);

    cursor.skip(100);
    assert_eq!(cursor.offset(), 8);
}

#[test]
fn schema_reports_dotted_paths() {
    let document = json!({ "mesh": { "positions": [ { "x": 1.0, "y": "oops", "z": 3.0 } ] } });
    let root = Node::root("model.json", &document);

    let positions = root.member("mesh").unwrap().member("positions").unwrap();
    let error = positions.elements().unwrap()[0].expect_float3().unwrap_err();

    match error {
        ParserError::SchemaViolation { file, path, expected } => {
            assert_eq!(file, "model.json");
            assert_eq!(path, "mesh.positions[0].y");
            assert_eq!(expected, "a number");
        }
        other => panic!("expected SchemaViolation, got {other:?}"),
    }
}

#[test]
fn schema_missing_required_field() {
    let document = json!({ "a": {} });
    let root = Node::root("model.json", &document);

    let error = root.member("a").unwrap().member("b").unwrap_err();
    match error {
        ParserError::SchemaViolation { path, .. } => assert_eq!(path, "a.b"),
        other => panic!("expected SchemaViolation, got {other:?}"),
    }
}

#[test]
fn schema_color_clamps_and_defaults_alpha() -> Result<(), anyhow::Error> {
    let document = json!({ "tint": { "r": 2.0, "g": -1.0, "b": 0.5 } });
    let root = Node::root("model.json", &document);

    let color = root.member("tint")?.expect_color()?;
    assert_eq!(color.r, 1.0);
    assert_eq!(color.g, 0.0);
    assert_eq!(color.b, 0.5);
    assert_eq!(color.a, 1.0);

    Ok(())
}

#[test]
fn schema_rejects_wrong_arity_tuples() {
    let document = json!({ "m": [1.0, 2.0, 3.0] });
    let root = Node::root("model.json", &document);

    assert!(root.member("m").unwrap().expect_f32s::<16>().is_err());
    assert!(root.member("m").unwrap().expect_f32s::<3>().is_ok());
}
