//! Serde round-trip coverage for the serializable value types.

#![cfg(feature = "serde")]

use inkstream_core::*;

fn roundtrip<T>(value: &T)
where
    T: serde::Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let json = serde_json::to_string(value).expect("serialize failed");
    let restored: T = serde_json::from_str(&json).expect("deserialize failed");
    assert_eq!(*value, restored, "round-trip mismatch for JSON: {json}");
}

#[test]
fn serde_geometry() {
    roundtrip(&Point::new(3.5, -2.0));
    roundtrip(&Matrix::new(2.0, 0.0, 0.0, 3.0, 10.0, 20.0));
    roundtrip(&Vector::new(1.0, 2.0, 1.0));
    roundtrip(&Rect::new(0.0, 0.0, 612.0, 792.0));
}

#[test]
fn serde_color() {
    roundtrip(&Color::Gray(0.5));
    roundtrip(&Color::Rgb(1.0, 0.0, 0.0));
    roundtrip(&Color::Cmyk(0.1, 0.2, 0.3, 0.4));
    roundtrip(&Color::Other(vec![0.1, 0.2]));
}

#[test]
fn serde_path() {
    let mut builder = PathBuilder::new(Matrix::identity());
    builder.move_to(0.0, 0.0);
    builder.curve_to(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
    builder.close();
    roundtrip(&builder.take());
    roundtrip(&FillRule::EvenOdd);
    roundtrip(&PaintOp::FillAndStroke);
    roundtrip(&DashPattern::new(vec![3.0, 2.0], 1.0));
}

#[test]
fn serde_text_chunk() {
    roundtrip(&TextChunk::new(
        "Hello",
        Point::new(72.0, 700.0),
        Point::new(102.0, 700.0),
        6.0,
    ));
}
