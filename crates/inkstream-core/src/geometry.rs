//! Affine geometry primitives for content-stream processing.
//!
//! Provides [`Matrix`] (2D affine transform in PDF row-vector convention),
//! [`Vector`] (homogeneous coordinates for baseline math), [`Point`], and
//! [`Rect`] (PDF user space, y axis pointing up).

/// Determinant magnitude below which a matrix is treated as non-invertible.
const DET_EPSILON: f64 = 1e-12;

/// A 2D point in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A 2D affine transformation matrix.
///
/// Stores the six live elements of the 3x3 matrix used throughout PDF:
///
/// ```text
/// | a b 0 |
/// | c d 0 |
/// | e f 1 |
/// ```
///
/// Row vectors multiply from the left, so a point transforms as
/// `(x', y') = (a*x + c*y + e, b*x + d*y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// The identity transform.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// A pure translation by `(tx, ty)`.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// A pure scaling by `(sx, sy)`.
    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Matrix product `self × other`.
    ///
    /// In the row-vector convention this applies `self` first, then `other`,
    /// which matches PDF concatenation: the `cm` operand matrix is
    /// `operand.concat(&ctm)`.
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Transform a point through this matrix.
    pub fn transform_point(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    /// The determinant of the 2x2 linear part.
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Compute the inverse transform.
    ///
    /// Returns `None` when the determinant is effectively zero. Callers are
    /// expected to skip the operation that needed the inverse rather than
    /// propagate NaNs.
    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det.abs() < DET_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        Some(Matrix {
            a: self.d * inv_det,
            b: -self.b * inv_det,
            c: -self.c * inv_det,
            d: self.a * inv_det,
            e: (self.c * self.f - self.d * self.e) * inv_det,
            f: (self.b * self.e - self.a * self.f) * inv_det,
        })
    }

    /// Whether the matrix has an inverse.
    pub fn is_invertible(&self) -> bool {
        self.determinant().abs() >= DET_EPSILON
    }

    /// The six elements as an array `[a, b, c, d, e, f]`.
    pub fn as_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

/// A homogeneous row vector `(x, y, z)`.
///
/// Baseline endpoints are represented as vectors with `z = 1` and
/// transformed by multiplying against a [`Matrix`] (see [`Vector::cross`]).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Vector-matrix product (row vector times matrix).
    pub fn cross(&self, m: &Matrix) -> Vector {
        Vector {
            x: self.x * m.a + self.y * m.c + self.z * m.e,
            y: self.x * m.b + self.y * m.d + self.z * m.f,
            z: self.z,
        }
    }

    /// Component-wise subtraction.
    pub fn subtract(&self, other: &Vector) -> Vector {
        Vector {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    /// Dot product over the x/y components.
    pub fn dot(&self, other: &Vector) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Euclidean length over the x/y components.
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// An axis-aligned rectangle in PDF user space (y up).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    /// Lower-left x.
    pub llx: f64,
    /// Lower-left y.
    pub lly: f64,
    /// Upper-right x.
    pub urx: f64,
    /// Upper-right y.
    pub ury: f64,
}

impl Rect {
    /// Create a rectangle, normalizing swapped corners.
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self {
            llx: llx.min(urx),
            lly: lly.min(ury),
            urx: llx.max(urx),
            ury: lly.max(ury),
        }
    }

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// Whether the point lies inside or on the boundary.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.llx && x <= self.urx && y >= self.lly && y <= self.ury
    }

    /// Whether two rectangles overlap (boundary contact counts).
    pub fn intersects(&self, other: &Rect) -> bool {
        self.llx <= other.urx && other.llx <= self.urx && self.lly <= other.ury && other.lly <= self.ury
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            llx: self.llx.min(other.llx),
            lly: self.lly.min(other.lly),
            urx: self.urx.max(other.urx),
            ury: self.ury.max(other.ury),
        }
    }
}
