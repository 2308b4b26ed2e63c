//! Text object state and the show-text displacement math.
//!
//! A [`TextObject`] exists only between `BT` and `ET`: it owns the text
//! matrix and line matrix. Glyph positions are computed against the
//! text rendering matrix (text matrix × CTM), advancing the text matrix
//! by the standard displacement
//! `tx = ((w0 / 1000) * Tfs + Tc + Tw_if_space) * Th`.

use crate::events::{GlyphPos, TextRenderInfo};
use crate::font::Font;
use crate::state::GraphicsState;
use inkstream_core::{Matrix, Point};

/// Text matrix state between `BT` and `ET`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextObject {
    text_matrix: Matrix,
    line_matrix: Matrix,
}

impl Default for TextObject {
    fn default() -> Self {
        Self::new()
    }
}

impl TextObject {
    /// `BT` operator: both matrices start at identity.
    pub fn new() -> Self {
        Self {
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
        }
    }

    pub fn text_matrix(&self) -> &Matrix {
        &self.text_matrix
    }

    pub fn line_matrix(&self) -> &Matrix {
        &self.line_matrix
    }

    /// `Tm` operator: replace both matrices.
    pub fn set_matrix(&mut self, m: Matrix) {
        self.text_matrix = m;
        self.line_matrix = m;
    }

    /// `Td` operator: translate the line matrix, reset the text matrix to it.
    pub fn move_position(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translation(tx, ty).concat(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// `T*` operator: next line using the current leading.
    pub fn next_line(&mut self, leading: f64) {
        self.move_position(0.0, -leading);
    }

    /// Advance the text matrix horizontally after a glyph or adjustment.
    /// `tx` is in text space with horizontal scaling already applied.
    pub fn advance(&mut self, tx: f64) {
        self.text_matrix = Matrix::translation(tx, 0.0).concat(&self.text_matrix);
    }
}

/// One element of a `TJ` array operand.
#[derive(Debug, Clone, PartialEq)]
pub enum TjElement {
    /// String bytes to show.
    Bytes(Vec<u8>),
    /// Positioning adjustment in thousandths of text space; positive
    /// tightens (moves against writing direction).
    Adjustment(f64),
}

/// Displacement for one glyph of width `w0` (1/1000 units) under the
/// current text state.
fn glyph_displacement(gs: &GraphicsState, w0: f64, is_word_space: bool) -> f64 {
    let word_spacing = if is_word_space { gs.word_spacing } else { 0.0 };
    ((w0 / 1000.0) * gs.font_size + gs.char_spacing + word_spacing) * gs.h_scaling_normalized()
}

/// Show a string: decode `bytes` through `font`, advance the text matrix
/// glyph by glyph, and return the event record. Marked-content context is
/// left empty for the caller to fill in.
pub fn show_text(
    object: &mut TextObject,
    gs: &GraphicsState,
    font: &dyn Font,
    bytes: &[u8],
) -> TextRenderInfo {
    let decoded = font.decode(bytes);
    let mut glyphs = Vec::with_capacity(decoded.len());
    let mut text = String::new();

    let start = baseline_point(object, gs, 0.0);
    let space_tx = glyph_displacement(gs, font.space_width(), true);
    let space_end = baseline_point(object, gs, space_tx);
    let space_width = (space_end.x - start.x).hypot(space_end.y - start.y);

    for glyph in decoded {
        let tx = glyph_displacement(gs, glyph.width, glyph.is_word_space());
        let glyph_start = baseline_point(object, gs, 0.0);
        let glyph_end = baseline_point(object, gs, tx);
        object.advance(tx);

        text.push_str(&glyph.text);
        glyphs.push(GlyphPos {
            text: glyph.text,
            code: glyph.code,
            start: glyph_start,
            end: glyph_end,
        });
    }

    let end = baseline_point(object, gs, 0.0);

    TextRenderInfo {
        text,
        glyphs,
        start,
        end,
        space_width,
        font_name: gs.font_name.clone(),
        font_size: gs.font_size,
        render_mode: gs.render_mode,
        fill_color: gs.fill_color.clone(),
        stroke_color: gs.stroke_color.clone(),
        marked_content: Vec::new(),
    }
}

/// Apply a `TJ` numeric adjustment to the text position.
pub fn apply_adjustment(object: &mut TextObject, gs: &GraphicsState, adjustment: f64) {
    let tx = -(adjustment / 1000.0) * gs.font_size * gs.h_scaling_normalized();
    object.advance(tx);
}

/// Point at text-space offset `(tx, rise)` mapped through the text
/// rendering matrix into user space.
fn baseline_point(object: &TextObject, gs: &GraphicsState, tx: f64) -> Point {
    object
        .text_matrix()
        .concat(&gs.ctm)
        .transform_point(Point::new(tx, gs.rise))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::SimpleFont;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn state_with_font(size: f64) -> GraphicsState {
        let mut gs = GraphicsState::new();
        gs.font_name = "F1".to_string();
        gs.font_size = size;
        gs
    }

    // --- text object matrices ---

    #[test]
    fn td_is_relative_to_line_matrix() {
        let mut obj = TextObject::new();
        obj.move_position(100.0, 700.0);
        obj.move_position(0.0, -14.0);
        assert_eq!(obj.text_matrix().as_array(), [1.0, 0.0, 0.0, 1.0, 100.0, 686.0]);
        assert_eq!(obj.line_matrix(), obj.text_matrix());
    }

    #[test]
    fn tm_replaces_rather_than_concatenates() {
        let mut obj = TextObject::new();
        obj.set_matrix(Matrix::new(2.0, 0.0, 0.0, 2.0, 100.0, 200.0));
        obj.set_matrix(Matrix::translation(50.0, 60.0));
        assert_eq!(obj.text_matrix().as_array(), [1.0, 0.0, 0.0, 1.0, 50.0, 60.0]);
    }

    #[test]
    fn advance_moves_text_matrix_only() {
        let mut obj = TextObject::new();
        obj.move_position(72.0, 700.0);
        obj.advance(10.0);
        assert_eq!(obj.text_matrix().as_array()[4], 82.0);
        assert_eq!(obj.line_matrix().as_array()[4], 72.0);
    }

    #[test]
    fn next_line_uses_leading() {
        let mut obj = TextObject::new();
        obj.move_position(72.0, 700.0);
        obj.next_line(14.0);
        obj.next_line(14.0);
        assert_eq!(obj.text_matrix().as_array()[5], 672.0);
    }

    // --- show text ---

    #[test]
    fn show_text_advances_per_glyph() {
        let mut obj = TextObject::new();
        obj.move_position(72.0, 700.0);
        let gs = state_with_font(12.0);
        let font = SimpleFont::new("Helvetica");

        let info = show_text(&mut obj, &gs, &font, b"Hello");

        // 500/1000 * 12 = 6 units per glyph
        assert_eq!(info.glyphs.len(), 5);
        assert_eq!(info.text, "Hello");
        assert_approx(info.start.x, 72.0);
        assert_approx(info.start.y, 700.0);
        assert_approx(info.end.x, 102.0);
        assert_approx(info.glyphs[1].start.x, 78.0);
        assert_approx(info.glyphs[1].end.x, 84.0);
        assert_approx(info.space_width, 6.0);
    }

    #[test]
    fn char_and_word_spacing_included() {
        let mut obj = TextObject::new();
        let mut gs = state_with_font(10.0);
        gs.char_spacing = 1.0;
        gs.word_spacing = 2.0;
        let font = SimpleFont::new("F1");

        let info = show_text(&mut obj, &gs, &font, b"a b");

        // 'a': 5 + 1 = 6; ' ': 5 + 1 + 2 = 8; 'b': 6
        assert_approx(info.glyphs[0].end.x - info.glyphs[0].start.x, 6.0);
        assert_approx(info.glyphs[1].end.x - info.glyphs[1].start.x, 8.0);
        assert_approx(info.end.x, 20.0);
    }

    #[test]
    fn horizontal_scaling_compresses_advances() {
        let mut obj = TextObject::new();
        let mut gs = state_with_font(12.0);
        gs.h_scaling = 50.0;
        let font = SimpleFont::new("F1");

        let info = show_text(&mut obj, &gs, &font, b"ab");
        assert_approx(info.end.x, 6.0);
    }

    #[test]
    fn rise_lifts_the_baseline() {
        let mut obj = TextObject::new();
        obj.move_position(10.0, 100.0);
        let mut gs = state_with_font(12.0);
        gs.rise = 3.0;
        let font = SimpleFont::new("F1");

        let info = show_text(&mut obj, &gs, &font, b"x");
        assert_approx(info.start.y, 103.0);
        assert_approx(info.end.y, 103.0);
    }

    #[test]
    fn ctm_scales_user_space_positions() {
        let mut obj = TextObject::new();
        obj.move_position(10.0, 20.0);
        let mut gs = state_with_font(10.0);
        gs.concat_matrix(Matrix::scaling(2.0, 2.0));
        let font = SimpleFont::new("F1");

        let info = show_text(&mut obj, &gs, &font, b"a");
        assert_approx(info.start.x, 20.0);
        assert_approx(info.start.y, 40.0);
        // 5 text-space units scaled by 2
        assert_approx(info.end.x, 30.0);
        assert_approx(info.space_width, 10.0);
    }

    #[test]
    fn tj_adjustment_moves_against_writing_direction() {
        let mut obj = TextObject::new();
        let gs = state_with_font(10.0);

        // Positive adjustment tightens: -(200/1000)*10 = -2 units
        apply_adjustment(&mut obj, &gs, 200.0);
        assert_approx(obj.text_matrix().as_array()[4], -2.0);

        apply_adjustment(&mut obj, &gs, -500.0);
        assert_approx(obj.text_matrix().as_array()[4], 3.0);
    }

    #[test]
    fn empty_string_yields_empty_record() {
        let mut obj = TextObject::new();
        let gs = state_with_font(12.0);
        let font = SimpleFont::new("F1");

        let info = show_text(&mut obj, &gs, &font, b"");
        assert!(info.glyphs.is_empty());
        assert_eq!(info.start, info.end);
    }

    #[test]
    fn chars_endpoints_match_span() {
        let mut obj = TextObject::new();
        obj.move_position(72.0, 700.0);
        let gs = state_with_font(12.0);
        let font = SimpleFont::new("F1");

        let info = show_text(&mut obj, &gs, &font, b"abc");
        let chars = info.chars();
        assert_eq!(chars[0].start, info.start);
        assert_eq!(chars[2].end, info.end);
        for pair in chars.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }
}
