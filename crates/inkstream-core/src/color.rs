//! Device color values set by content-stream color operators.

/// A device color in one of the PDF device color models.
///
/// The generic `SC`/`SCN` operators infer the model from the component
/// count; unrecognized counts are preserved verbatim in [`Color::Other`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Color {
    /// DeviceGray, single component in [0, 1].
    Gray(f32),
    /// DeviceRGB.
    Rgb(f32, f32, f32),
    /// DeviceCMYK.
    Cmyk(f32, f32, f32, f32),
    /// Components from an unresolved color space.
    Other(Vec<f32>),
}

impl Color {
    /// Black in DeviceGray, the initial value for both fill and stroke color.
    pub fn black() -> Self {
        Color::Gray(0.0)
    }

    /// Infer a color from raw components by count (1 = gray, 3 = RGB,
    /// 4 = CMYK, anything else preserved as-is).
    pub fn from_components(components: &[f32]) -> Self {
        match components {
            [g] => Color::Gray(*g),
            [r, g, b] => Color::Rgb(*r, *g, *b),
            [c, m, y, k] => Color::Cmyk(*c, *m, *y, *k),
            other => Color::Other(other.to_vec()),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::black()
    }
}
