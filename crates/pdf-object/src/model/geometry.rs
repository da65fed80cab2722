//! Rectangles and matrices stored as number arrays.

use crate::model::{Array, Obj};

/// A rectangle `[x0 y0 x1 y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Rect { x0, y0, x1, y1 }
    }

    /// Orders the corners so that `x0 <= x1` and `y0 <= y1`.
    pub fn normalized(self) -> Self {
        Rect {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

/// An affine transform `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Matrix { a, b, c, d, e, f }
    }

    /// Returns the transform that applies `self` first and `other` second.
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

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}

impl Obj {
    /// Reads a four-number array as a normalized rectangle. Anything that
    /// is not an array gives the empty rectangle; missing entries read as 0.
    pub fn to_rect(&self) -> Rect {
        let Some(array) = self.as_array() else {
            return Rect::default();
        };
        Rect::new(
            array.get_real(0),
            array.get_real(1),
            array.get_real(2),
            array.get_real(3),
        )
        .normalized()
    }

    /// Reads a six-number array as a matrix. Anything that is not an array
    /// gives the identity.
    pub fn to_matrix(&self) -> Matrix {
        let Some(array) = self.as_array() else {
            return Matrix::IDENTITY;
        };
        Matrix::new(
            array.get_real(0),
            array.get_real(1),
            array.get_real(2),
            array.get_real(3),
            array.get_real(4),
            array.get_real(5),
        )
    }

    pub fn new_rect(rect: Rect) -> Obj {
        Obj::Array(Array::from_rect(rect))
    }

    pub fn new_matrix(matrix: Matrix) -> Obj {
        Obj::Array(Array::from_matrix(matrix))
    }
}

impl Array {
    pub fn from_rect(rect: Rect) -> Array {
        [rect.x0, rect.y0, rect.x1, rect.y1]
            .into_iter()
            .map(Obj::Real)
            .collect()
    }

    pub fn from_matrix(m: Matrix) -> Array {
        [m.a, m.b, m.c, m.d, m.e, m.f]
            .into_iter()
            .map(Obj::Real)
            .collect()
    }
}
