//! inkstream: PDF content-stream processing.
//!
//! A content stream is tokenized into operations, dispatched through a
//! registry of operator handlers against a graphics-state stack, and
//! translated into immutable render events (text, images, paths, clip
//! changes) delivered to event listeners. The bundled listeners cover
//! location-based text extraction with region filtering and per-glyph
//! decomposition; everything outside the stream itself (fonts, XObjects,
//! external graphics states) is injected through the [`PageResources`]
//! trait, so no document object model is required.
//!
//! ```
//! use std::rc::Rc;
//! use inkstream::{ContentStreamProcessor, LocationTextExtraction, SimpleFont, SimpleResources};
//!
//! let mut resources = SimpleResources::new();
//! resources.add_font("F1", Rc::new(SimpleFont::new("Helvetica")));
//!
//! let mut extraction = LocationTextExtraction::new();
//! let mut processor = ContentStreamProcessor::new(&mut extraction);
//! processor
//!     .process(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET", Rc::new(resources))
//!     .unwrap();
//! assert_eq!(extraction.text(), "Hello");
//! ```

pub mod error;
pub mod events;
pub mod font;
pub mod listeners;
pub mod processor;
pub mod state;
pub mod text;
pub mod tokenizer;

pub use error::ProcessError;
pub use events::{
    ClippingPathInfo, EventListener, EventTypes, GlyphPos, ImageRenderInfo, MarkedContentRef,
    PathRenderInfo, RenderEvent, TextRenderInfo,
};
pub use font::{ExtGState, Font, Glyph, PageResources, SimpleFont, SimpleResources, XObject};
pub use listeners::{
    EventFilter, FilteredEventListener, GlyphEventListener, LocationTextExtraction,
    TextRegionFilter,
};
pub use processor::{ContentStreamProcessor, OperandShape, OperatorHandler, ProcessOptions};
pub use state::{GraphicsState, GraphicsStateStack, TextRenderMode};
pub use text::{TextObject, TjElement};
pub use tokenizer::{ContentTokenizer, InlineImage, Operand, Operation, tokenize};

pub use inkstream_core;
pub use inkstream_core::{
    AssemblyOptions, Color, ContentError, DashPattern, FillRule, Matrix, PaintOp, Path,
    PathSegment, Point, ProcessWarning, ProcessWarningCode, Rect, RunDirection, SetupError,
    StreamFault, StreamFaultKind, TextChunk, assemble_text,
};
