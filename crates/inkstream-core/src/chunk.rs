//! Text chunk ordering and assembly.
//!
//! A [`TextChunk`] is a contiguous run of glyphs produced by one
//! text-showing operation. Assembly sorts chunks into visual reading order
//! (top-to-bottom lines, left-to-right within a line unless a
//! right-to-left run direction applies), inserting spaces across
//! word-sized horizontal gaps and newlines across line-sized vertical
//! displacements.
//!
//! The thresholds are deliberately configurable: they are fractions of the
//! chunk's single-space width rather than hard-coded point values, because
//! the usable values depend on font size and tracking.

use unicode_bidi::{BidiClass, bidi_class};
use unicode_normalization::char::is_combining_mark;

use crate::geometry::Point;

/// Horizontal run direction applied when concatenating chunks on one line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunDirection {
    /// Always left to right.
    #[default]
    LeftToRight,
    /// Always right to left (forced, e.g. for known Hebrew/Arabic pages).
    RightToLeft,
    /// Right to left only for lines that contain strong RTL characters.
    Detect,
}

/// Thresholds for line grouping and word-gap detection.
///
/// Both ratios are multiplied by the chunk's single-space width to obtain
/// the actual distance in user-space units.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyOptions {
    /// A horizontal gap wider than `space_gap_ratio * space_width` gets a
    /// separating space.
    pub space_gap_ratio: f64,
    /// Chunks whose baselines differ vertically by no more than
    /// `line_tolerance_ratio * space_width` are on the same visual line;
    /// anything beyond gets a newline.
    pub line_tolerance_ratio: f64,
    /// Horizontal concatenation order.
    pub run_direction: RunDirection,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            space_gap_ratio: 0.5,
            line_tolerance_ratio: 0.7,
            run_direction: RunDirection::LeftToRight,
        }
    }
}

/// One run of glyphs on a single baseline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextChunk {
    /// Decoded text of the run.
    pub text: String,
    /// Baseline start in user space.
    pub start: Point,
    /// Baseline end in user space.
    pub end: Point,
    /// Width of a single space in this run's font, in user space.
    pub space_width: f64,
}

impl TextChunk {
    pub fn new(text: impl Into<String>, start: Point, end: Point, space_width: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            space_width,
        }
    }

    /// Whether this run occupies no horizontal extent (combining marks,
    /// zero-advance glyphs). Such chunks are merged into their predecessor
    /// instead of participating in gap/line decisions.
    pub fn is_zero_width(&self) -> bool {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        (dx * dx + dy * dy).sqrt() < 1e-6 || self.text.chars().all(is_combining_mark)
    }

    /// Whether the text contains strong right-to-left characters.
    pub fn has_rtl(&self) -> bool {
        self.text
            .chars()
            .any(|c| matches!(bidi_class(c), BidiClass::R | BidiClass::AL))
    }

    /// Effective space width, guarded against degenerate zero values.
    fn space_width_or_default(&self) -> f64 {
        if self.space_width > 1e-9 {
            self.space_width
        } else {
            1.0
        }
    }
}

/// Sort chunks into reading order and concatenate them into a string.
///
/// Zero-width chunks (combining marks) are first merged into the chunk
/// that preceded them in content-stream order, so a diacritic rendered at
/// a slightly different baseline cannot start a spurious line. The merged
/// chunks are then sorted by descending baseline y, then ascending x.
/// Ties in position keep their relative input order (stable sort), so
/// overprinted chunks come out in content-stream order.
pub fn assemble_text(chunks: &[TextChunk], opts: &AssemblyOptions) -> String {
    let mut merged: Vec<TextChunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if chunk.is_zero_width() {
            if let Some(prev) = merged.last_mut() {
                prev.text.push_str(&chunk.text);
                continue;
            }
        }
        merged.push(chunk.clone());
    }

    merged.sort_by(|a, b| {
        b.start
            .y
            .partial_cmp(&a.start.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.start
                    .x
                    .partial_cmp(&b.start.x)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });

    let mut result = String::new();
    let mut line: Vec<&TextChunk> = Vec::new();
    let mut line_y = f64::NAN;

    for chunk in &merged {
        let tolerance = opts.line_tolerance_ratio * chunk.space_width_or_default();
        let same_line = !line.is_empty() && (chunk.start.y - line_y).abs() <= tolerance;
        if !same_line && !line.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            emit_line(&mut result, &mut line, opts);
            line.clear();
        }
        if line.is_empty() {
            line_y = chunk.start.y;
        }
        line.push(chunk);
    }
    if !line.is_empty() {
        if !result.is_empty() {
            result.push('\n');
        }
        emit_line(&mut result, &mut line, opts);
    }
    result
}

/// Concatenate one visual line, inserting word gaps.
///
/// Chunks admitted to a line by the baseline tolerance may arrive out of
/// x order (the global sort ranks y first), so the line is re-sorted
/// horizontally before emission.
fn emit_line(out: &mut String, line: &mut Vec<&TextChunk>, opts: &AssemblyOptions) {
    line.sort_by(|a, b| {
        a.start
            .x
            .partial_cmp(&b.start.x)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let reverse = match opts.run_direction {
        RunDirection::LeftToRight => false,
        RunDirection::RightToLeft => true,
        RunDirection::Detect => line.iter().any(|c| c.has_rtl()),
    };

    let ordered: Box<dyn Iterator<Item = &&TextChunk> + '_> = if reverse {
        Box::new(line.iter().rev())
    } else {
        Box::new(line.iter())
    };

    let mut prev: Option<&TextChunk> = None;
    for &chunk in ordered {
        if let Some(p) = prev {
            let gap = if reverse {
                p.start.x - chunk.end.x
            } else {
                chunk.start.x - p.end.x
            };
            let threshold = opts.space_gap_ratio * chunk.space_width_or_default();
            if gap > threshold && !p.text.ends_with(' ') && !chunk.text.starts_with(' ') {
                out.push(' ');
            }
        }
        out.push_str(&chunk.text);
        prev = Some(chunk);
    }
}
