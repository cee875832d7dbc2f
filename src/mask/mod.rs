// mask - Foreground bounding box and crop extraction
//
// The bounding box is computed once per cutout and applied to the color and
// the mask together, so every foreground-derived buffer starts from the same
// window.

use tracing::debug;

use crate::buffer::{ImageBuffer, Quantity};
use crate::error::{CompositeError, Result};

/// Tightest rectangle around the non-zero mask entries (bounds inclusive)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub row_min: usize,
    pub row_max: usize,
    pub col_min: usize,
    pub col_max: usize,
}

impl BoundingBox {
    pub fn height(&self) -> usize { self.row_max - self.row_min + 1 }
    pub fn width(&self) -> usize { self.col_max - self.col_min + 1 }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_min..=self.row_max).contains(&row) && (self.col_min..=self.col_max).contains(&col)
    }

    pub fn crop(&self, buf: &ImageBuffer) -> ImageBuffer {
        buf.crop(self.row_min, self.col_min, self.height(), self.width())
    }
}

/// Cropped foreground rescaled for inference
#[derive(Clone, Debug)]
pub struct ForegroundCrop {
    pub image: ImageBuffer,
    pub mask: ImageBuffer,
    pub bbox: BoundingBox,
}

pub fn bbox(mask: &ImageBuffer) -> Result<BoundingBox> {
    mask.require_quantity("bbox", Quantity::Mask)?;

    let mut found: Option<BoundingBox> = None;
    for row in 0..mask.height() {
        for col in 0..mask.width() {
            if mask.get(row, col, 0) <= 0.0 { continue; }
            found = Some(match found {
                None => BoundingBox { row_min: row, row_max: row, col_min: col, col_max: col },
                Some(b) => BoundingBox {
                    row_min: b.row_min,
                    row_max: row,
                    col_min: b.col_min.min(col),
                    col_max: b.col_max.max(col),
                },
            });
        }
    }

    found.ok_or_else(|| {
        CompositeError::DegenerateMask(format!(
            "no non-zero pixels in {}x{} mask",
            mask.height(),
            mask.width()
        ))
    })
}

/// Crop `image` and `mask` to the mask's bounding box, then rescale both so
/// the longer edge is `target_max_edge`.
pub fn crop_and_rescale(image: &ImageBuffer, mask: &ImageBuffer, target_max_edge: usize) -> Result<ForegroundCrop> {
    image.require_extent("crop_and_rescale", mask)?;
    if target_max_edge == 0 {
        return Err(CompositeError::DegenerateMask("target edge of zero pixels".into()));
    }

    let bbox = bbox(mask)?;
    let image = bbox.crop(image).resize_to_max_edge(target_max_edge);
    let mask = bbox.crop(mask).resize_to_max_edge(target_max_edge);
    debug!(?bbox, height = image.height(), width = image.width(), "cropped foreground");

    Ok(ForegroundCrop { image, mask, bbox })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ColorSpace;

    fn mask_with(height: usize, width: usize, on: &[(usize, usize)]) -> ImageBuffer {
        ImageBuffer::from_fn(height, width, Quantity::Mask, ColorSpace::Linear, |r, c, _| {
            if on.contains(&(r, c)) { 0.7 } else { 0.0 }
        })
    }

    #[test]
    fn bbox_is_tight() {
        let on = [(2, 5), (4, 1), (6, 3)];
        let mask = mask_with(9, 8, &on);
        let b = bbox(&mask).unwrap();
        assert_eq!(b, BoundingBox { row_min: 2, row_max: 6, col_min: 1, col_max: 5 });
        assert!(b.row_min <= b.row_max && b.col_min <= b.col_max);
        for &(r, c) in &on {
            assert!(b.contains(r, c));
        }
        // Every edge touches a pixel, so no smaller rectangle would do
        assert!(on.iter().any(|&(r, _)| r == b.row_min));
        assert!(on.iter().any(|&(r, _)| r == b.row_max));
        assert!(on.iter().any(|&(_, c)| c == b.col_min));
        assert!(on.iter().any(|&(_, c)| c == b.col_max));
    }

    #[test]
    fn bbox_single_pixel() {
        let b = bbox(&mask_with(5, 5, &[(3, 3)])).unwrap();
        assert_eq!((b.height(), b.width()), (1, 1));
    }

    #[test]
    fn empty_mask_is_degenerate() {
        let mask = ImageBuffer::filled(6, 6, Quantity::Mask, ColorSpace::Linear, 0.0);
        assert!(matches!(bbox(&mask), Err(CompositeError::DegenerateMask(_))));
    }

    #[test]
    fn bbox_requires_mask() {
        let depth = ImageBuffer::filled(2, 2, Quantity::Depth, ColorSpace::Linear, 1.0);
        assert!(bbox(&depth).is_err());
    }

    #[test]
    fn rescale_preserves_aspect() {
        let image = ImageBuffer::filled(200, 400, Quantity::Color, ColorSpace::Gamma, 0.3);
        let mask = ImageBuffer::filled(200, 400, Quantity::Mask, ColorSpace::Linear, 1.0);
        let crop = crop_and_rescale(&image, &mask, 100).unwrap();
        assert_eq!((crop.image.height(), crop.image.width()), (50, 100));
        assert_eq!((crop.mask.height(), crop.mask.width()), (50, 100));
    }

    #[test]
    fn crop_uses_bbox_window() {
        let image = ImageBuffer::from_fn(10, 10, Quantity::Color, ColorSpace::Gamma, |r, c, _| {
            (r * 10 + c) as f32
        });
        let mask = mask_with(10, 10, &[(2, 3), (5, 8)]);
        let crop = crop_and_rescale(&image, &mask, 6).unwrap();
        assert_eq!(crop.bbox.height(), 4);
        assert_eq!(crop.bbox.width(), 6);
        assert_eq!((crop.image.height(), crop.image.width()), (4, 6));
        assert_eq!(crop.image.get(0, 0, 0), 23.0);
    }
}
