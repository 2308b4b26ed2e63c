//! Render events and the listener seam.
//!
//! Handlers translate operations into immutable event records and hand
//! them to an [`EventListener`]. Every coordinate in an event is already
//! in user space; listeners never see the graphics state itself, so an
//! event stays valid after the state that produced it has been mutated
//! or restored.

use bitflags::bitflags;

use crate::state::TextRenderMode;
use inkstream_core::{Color, DashPattern, FillRule, Matrix, PaintOp, Path, Point};

bitflags! {
    /// Event categories a listener can subscribe to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventTypes: u32 {
        const TEXT = 1 << 0;
        const IMAGE = 1 << 1;
        const PATH = 1 << 2;
        const CLIP = 1 << 3;
        const BEGIN_TEXT = 1 << 4;
        const END_TEXT = 1 << 5;
    }
}

/// One entry of the marked-content stack active when an event fired,
/// outermost first.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkedContentRef {
    /// Tag name from `BMC`/`BDC`.
    pub tag: String,
    /// `/MCID` from the property dictionary, when present.
    pub mcid: Option<i64>,
    /// `/ActualText` replacement text, when present.
    pub actual_text: Option<String>,
    /// Sequence number unique per `BMC`/`BDC` in a processing pass.
    /// Lets a consumer emit an `/ActualText` replacement exactly once
    /// even when it spans several show operations.
    pub seq: u64,
}

/// Position and text of a single glyph within a shown string.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphPos {
    /// Unicode text for the glyph.
    pub text: String,
    /// Character code from the string bytes.
    pub code: u32,
    /// Baseline start in user space.
    pub start: Point,
    /// Baseline end in user space (start plus the glyph advance).
    pub end: Point,
}

/// A text-showing operation (`Tj`, `TJ`, `'`, `"`).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRenderInfo {
    /// Decoded Unicode text of the whole operation.
    pub text: String,
    /// Per-glyph breakdown, in string order.
    pub glyphs: Vec<GlyphPos>,
    /// Baseline start of the whole operation in user space, rise applied.
    pub start: Point,
    /// Baseline end of the whole operation in user space.
    pub end: Point,
    /// Width of a space glyph in user space at the active font and size.
    pub space_width: f64,
    /// Font resource name active at the time.
    pub font_name: String,
    /// Font size from `Tf`.
    pub font_size: f64,
    /// Text rendering mode; mode 3 and 7 text is delivered but invisible.
    pub render_mode: TextRenderMode,
    pub fill_color: Color,
    pub stroke_color: Color,
    /// Marked-content stack at the time of the operation, outermost first.
    pub marked_content: Vec<MarkedContentRef>,
}

impl TextRenderInfo {
    /// Split this operation into one event per glyph.
    ///
    /// Each returned record covers exactly one glyph, with its own
    /// baseline segment; styling and marked-content context are shared.
    pub fn chars(&self) -> Vec<TextRenderInfo> {
        self.glyphs
            .iter()
            .map(|g| TextRenderInfo {
                text: g.text.clone(),
                glyphs: vec![g.clone()],
                start: g.start,
                end: g.end,
                space_width: self.space_width,
                font_name: self.font_name.clone(),
                font_size: self.font_size,
                render_mode: self.render_mode,
                fill_color: self.fill_color.clone(),
                stroke_color: self.stroke_color.clone(),
                marked_content: self.marked_content.clone(),
            })
            .collect()
    }

    /// Innermost `/MCID`, when the operation is inside marked content.
    pub fn mcid(&self) -> Option<i64> {
        self.marked_content.iter().rev().find_map(|m| m.mcid)
    }
}

/// An image placement, either an XObject `Do` or an inline `BI..EI`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRenderInfo {
    /// CTM at placement time: maps the unit square onto the image area.
    pub ctm: Matrix,
    /// XObject resource name; `None` for inline images.
    pub name: Option<String>,
    /// Pixel dimensions, when known.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub marked_content: Vec<MarkedContentRef>,
}

/// A path-painting operation (`S`, `f`, `B`, `n`, and variants).
#[derive(Debug, Clone, PartialEq)]
pub struct PathRenderInfo {
    /// The painted path, in user space.
    pub path: Path,
    pub op: PaintOp,
    pub fill_rule: FillRule,
    pub line_width: f64,
    pub dash_pattern: DashPattern,
    pub stroke_color: Color,
    pub fill_color: Color,
    pub marked_content: Vec<MarkedContentRef>,
}

/// A clipping path change realized at the painting operator after `W`/`W*`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippingPathInfo {
    /// The new clipping path, in user space.
    pub path: Path,
    pub fill_rule: FillRule,
}

/// An immutable record of one rendering-relevant operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Text(TextRenderInfo),
    Image(ImageRenderInfo),
    Path(PathRenderInfo),
    Clip(ClippingPathInfo),
    /// A `BT` operator opened a text object.
    BeginText,
    /// An `ET` operator closed a text object.
    EndText,
}

impl RenderEvent {
    /// The single [`EventTypes`] flag this event belongs to.
    pub fn event_type(&self) -> EventTypes {
        match self {
            RenderEvent::Text(_) => EventTypes::TEXT,
            RenderEvent::Image(_) => EventTypes::IMAGE,
            RenderEvent::Path(_) => EventTypes::PATH,
            RenderEvent::Clip(_) => EventTypes::CLIP,
            RenderEvent::BeginText => EventTypes::BEGIN_TEXT,
            RenderEvent::EndText => EventTypes::END_TEXT,
        }
    }
}

/// Receives render events during a processing pass.
///
/// `supported_events` is consulted once per event; declaring a narrow set
/// lets the processor skip building events nobody wants.
pub trait EventListener {
    fn on_event(&mut self, event: &RenderEvent);

    fn supported_events(&self) -> EventTypes {
        EventTypes::all()
    }
}
