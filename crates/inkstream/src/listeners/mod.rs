//! Ready-made event listeners: location-based text extraction, region
//! and event-type filtering, and per-glyph decomposition.

mod filter;
mod glyph;
mod location;

pub use filter::{EventFilter, FilteredEventListener, TextRegionFilter};
pub use glyph::GlyphEventListener;
pub use location::LocationTextExtraction;
