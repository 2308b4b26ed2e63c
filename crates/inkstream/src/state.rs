//! Graphics state and the q/Q save/restore stack.
//!
//! [`GraphicsState`] holds everything the `q` operator snapshots: the CTM,
//! colors, stroke parameters, the clipping path, and the text state
//! parameters that belong to the graphics state (character and word
//! spacing, horizontal scaling, leading, font selection, render mode,
//! rise). The text matrix itself does not live here; it belongs to the
//! BT/ET text object and is not saved by `q`.

use inkstream_core::{Color, DashPattern, Matrix, Path};

/// Text rendering mode set by the `Tr` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRenderMode {
    /// Fill glyphs (default).
    #[default]
    Fill = 0,
    /// Stroke glyph outlines.
    Stroke = 1,
    /// Fill then stroke.
    FillStroke = 2,
    /// Neither fill nor stroke: invisible text.
    Invisible = 3,
    /// Fill and add to the clipping path.
    FillClip = 4,
    /// Stroke and add to the clipping path.
    StrokeClip = 5,
    /// Fill, stroke, and add to the clipping path.
    FillStrokeClip = 6,
    /// Add to the clipping path only.
    Clip = 7,
}

impl TextRenderMode {
    /// Mode from the `Tr` integer operand; `None` outside 0..=7.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Fill),
            1 => Some(Self::Stroke),
            2 => Some(Self::FillStroke),
            3 => Some(Self::Invisible),
            4 => Some(Self::FillClip),
            5 => Some(Self::StrokeClip),
            6 => Some(Self::FillStrokeClip),
            7 => Some(Self::Clip),
            _ => None,
        }
    }

    /// Modes 3 and 7 leave no visible marks.
    pub fn is_invisible(self) -> bool {
        matches!(self, Self::Invisible | Self::Clip)
    }
}

/// The full graphics state snapshotted by `q` and restored by `Q`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    /// Current transformation matrix.
    pub ctm: Matrix,
    /// Stroking color.
    pub stroke_color: Color,
    /// Non-stroking (fill) color.
    pub fill_color: Color,
    /// Line width (`w`).
    pub line_width: f64,
    /// Line cap style (`J`).
    pub line_cap: i64,
    /// Line join style (`j`).
    pub line_join: i64,
    /// Miter limit (`M`).
    pub miter_limit: f64,
    /// Dash pattern (`d`).
    pub dash_pattern: DashPattern,
    /// Rendering intent name (`ri`).
    pub rendering_intent: String,
    /// Flatness tolerance (`i`).
    pub flatness: f64,
    /// Stroking alpha (`CA` via `gs`).
    pub stroke_alpha: f64,
    /// Non-stroking alpha (`ca` via `gs`).
    pub fill_alpha: f64,
    /// Active clipping path in user space, `None` for the unclipped page.
    pub clip_path: Option<Path>,

    // Text state parameters (PDF 32000-1 Table 52). These persist across
    // BT/ET and are saved by q like any other graphics state parameter.
    /// Character spacing (`Tc`).
    pub char_spacing: f64,
    /// Word spacing (`Tw`), applied at byte 32 in simple encodings.
    pub word_spacing: f64,
    /// Horizontal scaling (`Tz`) as a percentage, 100 = normal.
    pub h_scaling: f64,
    /// Text leading (`TL`).
    pub leading: f64,
    /// Font resource name selected by `Tf`, empty before any `Tf`.
    pub font_name: String,
    /// Font size selected by `Tf`.
    pub font_size: f64,
    /// Text rendering mode (`Tr`).
    pub render_mode: TextRenderMode,
    /// Text rise (`Ts`).
    pub rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsState {
    pub fn new() -> Self {
        Self {
            ctm: Matrix::identity(),
            stroke_color: Color::black(),
            fill_color: Color::black(),
            line_width: 1.0,
            line_cap: 0,
            line_join: 0,
            miter_limit: 10.0,
            dash_pattern: DashPattern::default(),
            rendering_intent: "RelativeColorimetric".to_string(),
            flatness: 1.0,
            stroke_alpha: 1.0,
            fill_alpha: 1.0,
            clip_path: None,
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scaling: 100.0,
            leading: 0.0,
            font_name: String::new(),
            font_size: 0.0,
            render_mode: TextRenderMode::default(),
            rise: 0.0,
        }
    }

    /// Horizontal scaling as a fraction (1.0 = 100%).
    pub fn h_scaling_normalized(&self) -> f64 {
        self.h_scaling / 100.0
    }

    /// `cm` operator: pre-concatenate a matrix onto the CTM.
    pub fn concat_matrix(&mut self, m: Matrix) {
        self.ctm = m.concat(&self.ctm);
    }
}

/// The q/Q stack: a current state plus saved snapshots.
#[derive(Debug, Clone, Default)]
pub struct GraphicsStateStack {
    current: GraphicsState,
    saved: Vec<GraphicsState>,
}

impl GraphicsStateStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a given initial state (e.g., a form XObject's inherited
    /// state).
    pub fn with_initial(state: GraphicsState) -> Self {
        Self {
            current: state,
            saved: Vec::new(),
        }
    }

    pub fn current(&self) -> &GraphicsState {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut GraphicsState {
        &mut self.current
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// `q` operator.
    pub fn save(&mut self) {
        self.saved.push(self.current.clone());
    }

    /// `Q` operator. Returns `false` on an unbalanced restore; the current
    /// state is then left unchanged.
    pub fn restore(&mut self) -> bool {
        match self.saved.pop() {
            Some(state) => {
                self.current = state;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkstream_core::Point;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-10,
            "expected {expected}, got {actual}"
        );
    }

    // --- defaults ---

    #[test]
    fn new_state_has_pdf_defaults() {
        let gs = GraphicsState::new();
        assert_eq!(gs.ctm, Matrix::identity());
        assert_eq!(gs.stroke_color, Color::black());
        assert_eq!(gs.fill_color, Color::black());
        assert_eq!(gs.line_width, 1.0);
        assert_eq!(gs.miter_limit, 10.0);
        assert!(gs.dash_pattern.is_solid());
        assert_eq!(gs.stroke_alpha, 1.0);
        assert!(gs.clip_path.is_none());
        assert_eq!(gs.h_scaling, 100.0);
        assert_eq!(gs.font_name, "");
        assert_eq!(gs.render_mode, TextRenderMode::Fill);
    }

    #[test]
    fn h_scaling_normalized_fraction() {
        let mut gs = GraphicsState::new();
        assert_approx(gs.h_scaling_normalized(), 1.0);
        gs.h_scaling = 50.0;
        assert_approx(gs.h_scaling_normalized(), 0.5);
    }

    // --- cm ---

    #[test]
    fn concat_matrix_is_cumulative() {
        let mut gs = GraphicsState::new();
        gs.concat_matrix(Matrix::scaling(2.0, 2.0));
        gs.concat_matrix(Matrix::translation(10.0, 20.0));

        // Later cm applies in the already-scaled system
        let p = gs.ctm.transform_point(Point::new(0.0, 0.0));
        assert_approx(p.x, 20.0);
        assert_approx(p.y, 40.0);
    }

    // --- q/Q ---

    #[test]
    fn save_restore_round_trips_full_state() {
        let mut stack = GraphicsStateStack::new();
        stack.current_mut().concat_matrix(Matrix::scaling(2.0, 2.0));
        stack.current_mut().line_width = 4.0;
        stack.current_mut().char_spacing = 0.5;
        stack.current_mut().font_name = "F1".to_string();
        stack.current_mut().font_size = 12.0;
        let before = stack.current().clone();

        stack.save();
        stack.current_mut().concat_matrix(Matrix::translation(5.0, 5.0));
        stack.current_mut().line_width = 0.1;
        stack.current_mut().char_spacing = 2.0;
        stack.current_mut().fill_color = Color::Rgb(1.0, 0.0, 0.0);
        stack.current_mut().render_mode = TextRenderMode::Invisible;
        assert_ne!(*stack.current(), before);

        assert!(stack.restore());
        assert_eq!(*stack.current(), before);
    }

    #[test]
    fn nested_save_restore() {
        let mut stack = GraphicsStateStack::new();
        stack.current_mut().stroke_color = Color::Rgb(1.0, 0.0, 0.0);
        stack.save();
        stack.current_mut().stroke_color = Color::Rgb(0.0, 0.0, 1.0);
        stack.save();
        stack.current_mut().stroke_color = Color::Rgb(0.0, 1.0, 0.0);
        assert_eq!(stack.depth(), 2);

        assert!(stack.restore());
        assert_eq!(stack.current().stroke_color, Color::Rgb(0.0, 0.0, 1.0));
        assert!(stack.restore());
        assert_eq!(stack.current().stroke_color, Color::Rgb(1.0, 0.0, 0.0));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn unbalanced_restore_returns_false_and_keeps_state() {
        let mut stack = GraphicsStateStack::new();
        stack.current_mut().line_width = 7.0;
        assert!(!stack.restore());
        assert_eq!(stack.current().line_width, 7.0);
    }

    #[test]
    fn with_initial_seeds_current_state() {
        let mut seed = GraphicsState::new();
        seed.ctm = Matrix::translation(100.0, 0.0);
        seed.font_size = 9.0;
        let stack = GraphicsStateStack::with_initial(seed.clone());
        assert_eq!(*stack.current(), seed);
    }

    // --- render mode ---

    #[test]
    fn render_mode_from_i64() {
        assert_eq!(TextRenderMode::from_i64(0), Some(TextRenderMode::Fill));
        assert_eq!(TextRenderMode::from_i64(3), Some(TextRenderMode::Invisible));
        assert_eq!(TextRenderMode::from_i64(7), Some(TextRenderMode::Clip));
        assert_eq!(TextRenderMode::from_i64(8), None);
        assert_eq!(TextRenderMode::from_i64(-1), None);
    }

    #[test]
    fn invisible_modes() {
        assert!(TextRenderMode::Invisible.is_invisible());
        assert!(TextRenderMode::Clip.is_invisible());
        assert!(!TextRenderMode::Fill.is_invisible());
        assert!(!TextRenderMode::StrokeClip.is_invisible());
    }
}
