use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in canvas pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rectangle {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Region of the working canvas that cropping must try to keep.
///
/// Edges are inclusive and may lie outside the canvas: a zone built around a
/// face near the border extends past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeZone {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl SafeZone {
    /// Build a zone from a detection in source space, padded by half the
    /// detection's own size on every side and mapped to the working canvas.
    ///
    /// `x_ratio`/`y_ratio` are `source / canvas` for each axis.
    pub fn from_detection(detection: &Rectangle, x_ratio: f64, y_ratio: f64) -> Self {
        let half_w = (detection.width as f64 / 2.0).ceil();
        let half_h = (detection.height as f64 / 2.0).ceil();

        let left = detection.x as f64 - half_w;
        let right = detection.x as f64 + detection.width as f64 + half_w;
        let top = detection.y as f64 - half_h;
        let bottom = detection.y as f64 + detection.height as f64 + half_h;

        Self {
            left: (left / x_ratio).round() as i32,
            right: (right / x_ratio).round() as i32,
            top: (top / y_ratio).round() as i32,
            bottom: (bottom / y_ratio).round() as i32,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Top-left corner of the crop window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CropOffset {
    pub x: u32,
    pub y: u32,
}

impl CropOffset {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}
