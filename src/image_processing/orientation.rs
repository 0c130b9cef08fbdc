use anyhow::{Context, Result};
use exif::{In, Reader, Tag, Value};
use image::{imageops, RgbImage};
use std::path::Path;

/// EXIF orientation values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExifOrientation {
    /// No orientation specified or undefined
    #[default]
    Undefined = 0,
    /// Normal orientation (0 degrees)
    TopLeft = 1,
    /// Horizontally flipped
    TopRight = 2,
    /// Rotated 180 degrees
    BottomRight = 3,
    /// Vertically flipped
    BottomLeft = 4,
    /// Mirrored along the main diagonal
    LeftTop = 5,
    /// Needs a 90 degree clockwise turn
    RightTop = 6,
    /// Mirrored along the anti-diagonal
    RightBottom = 7,
    /// Needs a 90 degree counter-clockwise turn
    LeftBottom = 8,
}

impl From<u32> for ExifOrientation {
    fn from(value: u32) -> Self {
        match value {
            1 => ExifOrientation::TopLeft,
            2 => ExifOrientation::TopRight,
            3 => ExifOrientation::BottomRight,
            4 => ExifOrientation::BottomLeft,
            5 => ExifOrientation::LeftTop,
            6 => ExifOrientation::RightTop,
            7 => ExifOrientation::RightBottom,
            8 => ExifOrientation::LeftBottom,
            _ => ExifOrientation::Undefined,
        }
    }
}

impl ExifOrientation {
    pub fn description(&self) -> &'static str {
        match self {
            ExifOrientation::Undefined => "Undefined",
            ExifOrientation::TopLeft => "Normal",
            ExifOrientation::TopRight => "Horizontally flipped",
            ExifOrientation::BottomRight => "Rotated 180°",
            ExifOrientation::BottomLeft => "Vertically flipped",
            ExifOrientation::LeftTop => "Transposed",
            ExifOrientation::RightTop => "Rotated 90° CW",
            ExifOrientation::RightBottom => "Transversed",
            ExifOrientation::LeftBottom => "Rotated 90° CCW",
        }
    }

    /// Whether pixel data must be transformed before use
    pub fn needs_transform(&self) -> bool {
        !matches!(self, ExifOrientation::Undefined | ExifOrientation::TopLeft)
    }

    /// Whether applying the orientation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(
            self,
            ExifOrientation::LeftTop
                | ExifOrientation::RightTop
                | ExifOrientation::RightBottom
                | ExifOrientation::LeftBottom
        )
    }
}

/// Read the EXIF orientation tag from an image file
pub fn read_exif_orientation(image_path: &Path) -> Result<ExifOrientation> {
    let file = std::fs::File::open(image_path).with_context(|| {
        format!(
            "Failed to open image for EXIF reading: {}",
            image_path.display()
        )
    })?;

    let mut buf_reader = std::io::BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut buf_reader)
        .context("Failed to read EXIF data")?;

    if let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) {
        if let Value::Short(values) = &field.value {
            if let Some(&orientation_value) = values.first() {
                return Ok(ExifOrientation::from(orientation_value as u32));
            }
        }
    }

    Ok(ExifOrientation::Undefined)
}

/// Transform pixel data so it displays upright for the given orientation
pub fn apply_rotation(img: &RgbImage, orientation: ExifOrientation) -> RgbImage {
    match orientation {
        ExifOrientation::Undefined | ExifOrientation::TopLeft => img.clone(),
        ExifOrientation::TopRight => imageops::flip_horizontal(img),
        ExifOrientation::BottomRight => imageops::rotate180(img),
        ExifOrientation::BottomLeft => imageops::flip_vertical(img),
        ExifOrientation::LeftTop => imageops::flip_horizontal(&imageops::rotate90(img)),
        ExifOrientation::RightTop => imageops::rotate90(img),
        ExifOrientation::RightBottom => imageops::flip_horizontal(&imageops::rotate270(img)),
        ExifOrientation::LeftBottom => imageops::rotate270(img),
    }
}
