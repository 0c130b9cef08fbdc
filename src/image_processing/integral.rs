//! Summed-area tables over a luminance buffer
//!
//! Both tables are built in a single row-major pass with the usual 2D prefix
//! recurrence, so any rectangle sum costs four lookups afterwards.

use super::geometry::Rectangle;

/// Sum and sum-of-squares tables for one canvas resolution
#[derive(Debug, Clone, Default)]
pub struct IntegralTables {
    width: u32,
    height: u32,
    sum: Vec<f64>,
    squares: Vec<f64>,
}

impl IntegralTables {
    /// Build the tables for a row-major `width * height` buffer.
    ///
    /// A buffer whose length does not match the dimensions produces empty
    /// tables, which answer every query with 0.
    pub fn new(width: u32, height: u32, data: &[f64]) -> Self {
        let w = width as usize;
        let h = height as usize;

        if w == 0 || h == 0 || data.len() != w * h {
            return Self::default();
        }

        let mut sum = vec![0.0; w * h];
        let mut squares = vec![0.0; w * h];

        for y in 0..h {
            for x in 0..w {
                let idx = y * w + x;
                let value = data[idx];

                sum[idx] = value;
                squares[idx] = value * value;

                if x > 0 {
                    sum[idx] += sum[idx - 1];
                    squares[idx] += squares[idx - 1];
                }
                if y > 0 {
                    sum[idx] += sum[idx - w];
                    squares[idx] += squares[idx - w];
                }
                if x > 0 && y > 0 {
                    sum[idx] -= sum[idx - w - 1];
                    squares[idx] -= squares[idx - w - 1];
                }
            }
        }

        Self {
            width,
            height,
            sum,
            squares,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.sum.is_empty()
    }

    /// Sum of the values inside a (possibly fractional) rectangle.
    ///
    /// Corners are clamped to the buffer and truncated to whole pixels; the
    /// far corner is inclusive (`x + width - 1`).
    pub fn rect_sum(&self, x: f64, y: f64, width: f64, height: f64) -> f64 {
        self.lookup(&self.sum, x, y, width, height)
    }

    /// Sum of the squared values inside a rectangle, same clamping as [`rect_sum`](Self::rect_sum)
    pub fn rect_square_sum(&self, x: f64, y: f64, width: f64, height: f64) -> f64 {
        self.lookup(&self.squares, x, y, width, height)
    }

    /// Integer convenience over [`rect_sum`](Self::rect_sum)
    pub fn sum(&self, rect: &Rectangle) -> f64 {
        self.rect_sum(
            rect.x as f64,
            rect.y as f64,
            rect.width as f64,
            rect.height as f64,
        )
    }

    fn lookup(&self, table: &[f64], x: f64, y: f64, width: f64, height: f64) -> f64 {
        if table.is_empty() || !(width > 0.0) || !(height > 0.0) {
            return 0.0;
        }

        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;

        let x1 = x.min(max_x).max(0.0) as usize;
        let y1 = y.min(max_y).max(0.0) as usize;
        let x2 = (x + width - 1.0).min(max_x).max(0.0) as usize;
        let y2 = (y + height - 1.0).min(max_y).max(0.0) as usize;

        if x2 < x1 || y2 < y1 {
            return 0.0;
        }

        let w = self.width as usize;
        let mut total = table[y2 * w + x2];

        if x1 > 0 {
            total -= table[y2 * w + (x1 - 1)];
        }
        if y1 > 0 {
            total -= table[(y1 - 1) * w + x2];
        }
        if x1 > 0 && y1 > 0 {
            total += table[(y1 - 1) * w + (x1 - 1)];
        }

        total
    }
}
