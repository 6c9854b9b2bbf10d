//! Row-major 2-D arrays of decoded values and coordinates.

use std::ops::{Add, Div, Mul, Sub};

/// A `rows × cols` grid of `f64`, stored row-major (row `j`, column `i`).
///
/// Missing grid points are `NaN`; the statistics below skip them.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Field {
    /// Wraps `data` as a `(rows, cols)` array. Returns `None` if the length disagrees with the shape.
    pub fn new((rows, cols): (usize, usize), data: Vec<f64>) -> Option<Self> {
        if rows.checked_mul(cols)? != data.len() {
            return None;
        }
        Some(Self { data, rows, cols })
    }

    pub fn from_fn((rows, cols): (usize, usize), mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for j in 0..rows {
            for i in 0..cols {
                data.push(f(j, i));
            }
        }
        Self { data, rows, cols }
    }

    pub fn filled((rows, cols): (usize, usize), value: f64) -> Self {
        Self { data: vec![value; rows * cols], rows, cols }
    }

    /// `(rows, cols)`, i.e. `(Nj, Ni)` for a message's values.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.data.get(row * self.cols + col).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.rows {
            return None;
        }
        Some(&self.data[row * self.cols..(row + 1) * self.cols])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn map(&self, mut f: impl FnMut(f64) -> f64) -> Field {
        Field {
            data: self.data.iter().map(|v| f(*v)).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Same data laid out as `(rows, cols)`; `None` when the sizes differ.
    pub fn reshape(self, shape: (usize, usize)) -> Option<Field> {
        Field::new(shape, self.data)
    }

    pub fn min(&self) -> Option<f64> {
        self.present().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.present().reduce(f64::max)
    }

    pub fn mean(&self) -> Option<f64> {
        let (sum, count) = self.present().fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    pub fn count_missing(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }

    fn present(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied().filter(|v| !v.is_nan())
    }
}

macro_rules! scalar_op_impl {
    ($trait:ident, $method:ident, $op:tt) => {
        impl $trait<f64> for Field {
            type Output = Field;

            fn $method(mut self, rhs: f64) -> Field {
                self.data.iter_mut().for_each(|v| *v = *v $op rhs);
                self
            }
        }

        impl $trait<f64> for &Field {
            type Output = Field;

            fn $method(self, rhs: f64) -> Field {
                self.map(|v| v $op rhs)
            }
        }
    }
}

scalar_op_impl! { Add, add, + }
scalar_op_impl! { Sub, sub, - }
scalar_op_impl! { Mul, mul, * }
scalar_op_impl! { Div, div, / }
