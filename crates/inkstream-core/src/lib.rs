//! inkstream-core: Processor-independent data types and algorithms.
//!
//! This crate provides the foundational value types (matrices, vectors,
//! rectangles, colors, paths) and the pure text-assembly algorithm
//! (chunk ordering, gap thresholds, RTL reordering) used by the inkstream
//! content-stream processor. It has no knowledge of PDF syntax or of the
//! operator dispatch machinery.

pub mod chunk;
pub mod color;
pub mod error;
pub mod geometry;
pub mod path;

pub use chunk::{AssemblyOptions, RunDirection, TextChunk, assemble_text};
pub use color::Color;
pub use error::{ContentError, ProcessWarning, ProcessWarningCode, SetupError, StreamFault, StreamFaultKind};
pub use geometry::{Matrix, Point, Rect, Vector};
pub use path::{DashPattern, FillRule, PaintOp, Path, PathBuilder, PathSegment};
