//! Vector path model and construction.
//!
//! Path construction operators accumulate segments in a [`PathBuilder`];
//! coordinates are transformed into user space through the CTM at
//! construction time, so a later CTM change cannot retroactively move
//! segments that were already appended.

use crate::geometry::{Matrix, Point, Rect};

/// One segment of a path, with all points in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathSegment {
    /// Begin a new subpath at the point.
    MoveTo(Point),
    /// Straight line to the point.
    LineTo(Point),
    /// Cubic Bezier with two control points and an endpoint.
    CurveTo(Point, Point, Point),
    /// Close the current subpath back to its starting point.
    Close,
}

/// A constructed path: a flat segment list in user space.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Path {
    pub segments: Vec<PathSegment>,
}

impl Path {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Bounding box over all segment points (control points included).
    ///
    /// Returns `None` for an empty path.
    pub fn bounding_box(&self) -> Option<Rect> {
        let mut bbox: Option<Rect> = None;
        let mut grow = |p: &Point| {
            let r = Rect::new(p.x, p.y, p.x, p.y);
            bbox = Some(match bbox {
                Some(b) => b.union(&r),
                None => r,
            });
        };
        for seg in &self.segments {
            match seg {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => grow(p),
                PathSegment::CurveTo(c1, c2, p) => {
                    grow(c1);
                    grow(c2);
                    grow(p);
                }
                PathSegment::Close => {}
            }
        }
        bbox
    }
}

/// Fill rule for path painting and clipping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FillRule {
    /// Nonzero winding number rule (default).
    #[default]
    NonZeroWinding,
    /// Even-odd rule.
    EvenOdd,
}

/// The paint operation applied when a path-painting operator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PaintOp {
    /// Path is stroked (S, s).
    Stroke,
    /// Path is filled (f, F, f*).
    Fill,
    /// Path is both filled and stroked (B, B*, b, b*).
    FillAndStroke,
    /// Path ends without marks (n) — used to realize a pending clip.
    NoPaint,
}

/// Stroke dash pattern set by the `d` operator.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DashPattern {
    pub dash_array: Vec<f64>,
    pub dash_phase: f64,
}

impl DashPattern {
    pub fn new(dash_array: Vec<f64>, dash_phase: f64) -> Self {
        Self {
            dash_array,
            dash_phase,
        }
    }

    /// An empty dash array means a solid line.
    pub fn is_solid(&self) -> bool {
        self.dash_array.is_empty()
    }
}

/// Accumulates path construction operators into a [`Path`].
#[derive(Debug, Clone)]
pub struct PathBuilder {
    segments: Vec<PathSegment>,
    ctm: Matrix,
    /// Start of the current subpath, for `v`/`y` degenerate cases and Close.
    current: Option<Point>,
}

impl PathBuilder {
    pub fn new(ctm: Matrix) -> Self {
        Self {
            segments: Vec::new(),
            ctm,
            current: None,
        }
    }

    /// Update the CTM used for subsequently constructed segments.
    pub fn set_ctm(&mut self, ctm: Matrix) {
        self.ctm = ctm;
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// `m` operator.
    pub fn move_to(&mut self, x: f64, y: f64) {
        let p = self.ctm.transform_point(Point::new(x, y));
        self.current = Some(p);
        self.segments.push(PathSegment::MoveTo(p));
    }

    /// `l` operator.
    pub fn line_to(&mut self, x: f64, y: f64) {
        let p = self.ctm.transform_point(Point::new(x, y));
        self.current = Some(p);
        self.segments.push(PathSegment::LineTo(p));
    }

    /// `c` operator: curve with explicit control points.
    pub fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        let c1 = self.ctm.transform_point(Point::new(x1, y1));
        let c2 = self.ctm.transform_point(Point::new(x2, y2));
        let p = self.ctm.transform_point(Point::new(x3, y3));
        self.current = Some(p);
        self.segments.push(PathSegment::CurveTo(c1, c2, p));
    }

    /// `v` operator: first control point is the current point.
    pub fn curve_to_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) {
        let c1 = self.current.unwrap_or(Point::new(0.0, 0.0));
        let c2 = self.ctm.transform_point(Point::new(x2, y2));
        let p = self.ctm.transform_point(Point::new(x3, y3));
        self.current = Some(p);
        self.segments.push(PathSegment::CurveTo(c1, c2, p));
    }

    /// `y` operator: second control point is the endpoint.
    pub fn curve_to_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) {
        let c1 = self.ctm.transform_point(Point::new(x1, y1));
        let p = self.ctm.transform_point(Point::new(x3, y3));
        self.current = Some(p);
        self.segments.push(PathSegment::CurveTo(c1, p, p));
    }

    /// `re` operator: closed rectangle subpath.
    pub fn rectangle(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.move_to(x, y);
        self.line_to(x + w, y);
        self.line_to(x + w, y + h);
        self.line_to(x, y + h);
        self.close();
    }

    /// `h` operator.
    pub fn close(&mut self) {
        self.segments.push(PathSegment::Close);
    }

    /// Take the accumulated path, leaving the builder empty for the next one.
    pub fn take(&mut self) -> Path {
        self.current = None;
        Path {
            segments: std::mem::take(&mut self.segments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_transforms_at_construction_time() {
        let mut b = PathBuilder::new(Matrix::translation(100.0, 200.0));
        b.move_to(0.0, 0.0);
        // CTM changes after the first segment was constructed
        b.set_ctm(Matrix::identity());
        b.line_to(10.0, 0.0);
        let path = b.take();
        assert_eq!(
            path.segments,
            vec![
                PathSegment::MoveTo(Point::new(100.0, 200.0)),
                PathSegment::LineTo(Point::new(10.0, 0.0)),
            ]
        );
    }

    #[test]
    fn rectangle_is_closed_subpath() {
        let mut b = PathBuilder::new(Matrix::identity());
        b.rectangle(10.0, 20.0, 100.0, 50.0);
        let path = b.take();
        assert_eq!(path.segments.len(), 5);
        assert_eq!(path.segments[0], PathSegment::MoveTo(Point::new(10.0, 20.0)));
        assert_eq!(path.segments[4], PathSegment::Close);
    }

    #[test]
    fn take_empties_the_builder() {
        let mut b = PathBuilder::new(Matrix::identity());
        b.move_to(1.0, 2.0);
        let first = b.take();
        assert_eq!(first.segments.len(), 1);
        assert!(b.is_empty());
        assert!(b.take().is_empty());
    }

    #[test]
    fn curve_variants_fill_in_control_points() {
        let mut b = PathBuilder::new(Matrix::identity());
        b.move_to(0.0, 0.0);
        b.curve_to_v(5.0, 5.0, 10.0, 0.0);
        b.curve_to_y(15.0, 5.0, 20.0, 0.0);
        let path = b.take();
        assert_eq!(
            path.segments[1],
            PathSegment::CurveTo(
                Point::new(0.0, 0.0),
                Point::new(5.0, 5.0),
                Point::new(10.0, 0.0)
            )
        );
        assert_eq!(
            path.segments[2],
            PathSegment::CurveTo(
                Point::new(15.0, 5.0),
                Point::new(20.0, 0.0),
                Point::new(20.0, 0.0)
            )
        );
    }

    #[test]
    fn bounding_box_covers_all_points() {
        let mut b = PathBuilder::new(Matrix::identity());
        b.move_to(10.0, 10.0);
        b.line_to(50.0, -5.0);
        b.curve_to(60.0, 80.0, 70.0, 0.0, 20.0, 30.0);
        let bbox = b.take().bounding_box().unwrap();
        assert_eq!(bbox, Rect::new(10.0, -5.0, 70.0, 80.0));
    }

    #[test]
    fn empty_path_has_no_bounding_box() {
        assert!(Path::default().bounding_box().is_none());
    }

    #[test]
    fn dash_pattern_solid() {
        assert!(DashPattern::default().is_solid());
        assert!(!DashPattern::new(vec![3.0, 2.0], 0.0).is_solid());
    }
}
