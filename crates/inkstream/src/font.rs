//! Font and resource abstractions.
//!
//! The processor never reads a document's object tree. Everything it needs
//! from outside the content stream — fonts, external graphics states, and
//! XObjects — is injected through the [`PageResources`] trait. [`SimpleFont`]
//! and [`SimpleResources`] are table-driven implementations good enough for
//! tests and for callers that resolve resources ahead of time.

use std::collections::HashMap;
use std::rc::Rc;

use inkstream_core::{DashPattern, Matrix, Rect};

/// One decoded glyph from a shown string.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Character code as it appeared in the string bytes.
    pub code: u32,
    /// Unicode text for the glyph, possibly multiple chars (ligatures).
    pub text: String,
    /// Horizontal displacement in 1/1000 text space units.
    pub width: f64,
}

impl Glyph {
    /// Word spacing applies to the single-byte code 32 only.
    pub fn is_word_space(&self) -> bool {
        self.code == 32
    }
}

/// A font as the processor sees it: a decoder from string bytes to glyphs.
pub trait Font {
    /// Resource name or base font name, for diagnostics.
    fn name(&self) -> &str;

    /// Decode the bytes of a shown string into glyphs, in string order.
    fn decode(&self, bytes: &[u8]) -> Vec<Glyph>;

    /// Width of the space glyph in 1/1000 text space units. Used as the
    /// word-gap yardstick during text assembly.
    fn space_width(&self) -> f64 {
        500.0
    }
}

/// A single-byte font backed by a width table and a direct byte-to-char
/// mapping.
///
/// Bytes map to `char` by Latin-1 identity unless overridden. Widths
/// default to [`SimpleFont::DEFAULT_WIDTH`] unless set per code.
pub struct SimpleFont {
    name: String,
    widths: HashMap<u32, f64>,
    text_overrides: HashMap<u32, String>,
    default_width: f64,
}

impl SimpleFont {
    pub const DEFAULT_WIDTH: f64 = 500.0;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            widths: HashMap::new(),
            text_overrides: HashMap::new(),
            default_width: Self::DEFAULT_WIDTH,
        }
    }

    /// A font whose every glyph is `width` units wide.
    pub fn monospaced(name: impl Into<String>, width: f64) -> Self {
        let mut font = Self::new(name);
        font.default_width = width;
        font
    }

    pub fn set_width(&mut self, code: u32, width: f64) {
        self.widths.insert(code, width);
    }

    /// Override the Unicode text produced for a code.
    pub fn set_text(&mut self, code: u32, text: impl Into<String>) {
        self.text_overrides.insert(code, text.into());
    }

    pub fn width_of(&self, code: u32) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }
}

impl Font for SimpleFont {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        bytes
            .iter()
            .map(|&b| {
                let code = b as u32;
                let text = match self.text_overrides.get(&code) {
                    Some(t) => t.clone(),
                    // Latin-1 identity mapping
                    None => char::from(b).to_string(),
                };
                Glyph {
                    code,
                    text,
                    width: self.width_of(code),
                }
            })
            .collect()
    }

    fn space_width(&self) -> f64 {
        self.width_of(32)
    }
}

/// Parameters from an external graphics state dictionary applied by `gs`.
///
/// Only the parameters the processor models are represented; `None` leaves
/// the current value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtGState {
    /// `/LW`: line width.
    pub line_width: Option<f64>,
    /// `/D`: dash pattern.
    pub dash_pattern: Option<DashPattern>,
    /// `/CA`: stroking alpha.
    pub stroke_alpha: Option<f64>,
    /// `/ca`: non-stroking alpha.
    pub fill_alpha: Option<f64>,
    /// `/Font`: font resource name and size.
    pub font: Option<(String, f64)>,
}

/// An external object invocable by `Do`.
pub enum XObject {
    /// A sampled image; only its dimensions matter to listeners.
    Image {
        width: u32,
        height: u32,
    },
    /// A form: a nested content stream with its own matrix, bounding box,
    /// and optionally its own resources.
    Form {
        /// Form matrix mapping form space into the invoking space.
        matrix: Matrix,
        /// Bounding box in form space, if declared.
        bbox: Option<Rect>,
        /// The form's content stream bytes.
        content: Vec<u8>,
        /// Resources scoped to the form; the invoking resources apply
        /// when absent.
        resources: Option<Rc<dyn PageResources>>,
    },
}

/// Named resources visible to a content stream.
pub trait PageResources {
    fn font(&self, name: &str) -> Option<Rc<dyn Font>>;

    fn xobject(&self, name: &str) -> Option<Rc<XObject>>;

    fn ext_g_state(&self, name: &str) -> Option<ExtGState>;
}

/// Resources backed by plain hash maps.
#[derive(Default)]
pub struct SimpleResources {
    fonts: HashMap<String, Rc<dyn Font>>,
    xobjects: HashMap<String, Rc<XObject>>,
    ext_g_states: HashMap<String, ExtGState>,
}

impl SimpleResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_font(&mut self, name: impl Into<String>, font: Rc<dyn Font>) {
        self.fonts.insert(name.into(), font);
    }

    pub fn add_xobject(&mut self, name: impl Into<String>, xobject: XObject) {
        self.xobjects.insert(name.into(), Rc::new(xobject));
    }

    pub fn add_ext_g_state(&mut self, name: impl Into<String>, state: ExtGState) {
        self.ext_g_states.insert(name.into(), state);
    }
}

impl PageResources for SimpleResources {
    fn font(&self, name: &str) -> Option<Rc<dyn Font>> {
        self.fonts.get(name).cloned()
    }

    fn xobject(&self, name: &str) -> Option<Rc<XObject>> {
        self.xobjects.get(name).cloned()
    }

    fn ext_g_state(&self, name: &str) -> Option<ExtGState> {
        self.ext_g_states.get(name).cloned()
    }
}
