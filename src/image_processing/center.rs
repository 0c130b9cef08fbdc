use anyhow::Result;

use super::geometry::CropOffset;
use super::{CropContext, CropStrategy};

/// Centre the crop window, truncating odd surpluses toward the top-left
pub fn center_offset(width: u32, height: u32, target_width: u32, target_height: u32) -> CropOffset {
    CropOffset::new(
        width.saturating_sub(target_width) / 2,
        height.saturating_sub(target_height) / 2,
    )
}

pub struct CenterStrategy;

impl CropStrategy for CenterStrategy {
    fn special_offset(
        &mut self,
        ctx: &CropContext,
        target_width: u32,
        target_height: u32,
    ) -> Result<CropOffset> {
        let (width, height) = ctx.image.dimensions();
        Ok(center_offset(width, height, target_width, target_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_offset() {
        assert_eq!(center_offset(200, 150, 100, 100), CropOffset::new(50, 25));
        assert_eq!(center_offset(101, 100, 100, 100), CropOffset::new(0, 0));
        assert_eq!(center_offset(103, 100, 100, 100), CropOffset::new(1, 0));
        assert_eq!(center_offset(50, 50, 100, 100), CropOffset::new(0, 0));
    }
}
