// composite - Alpha blending of foreground patches into a canvas
//
//   out[p] = m[p] * src[p] + (1 - m[p]) * dst[p]   inside the footprint
//   out[p] = dst[p]                                 elsewhere
//
// The footprint is clamped to the destination. `Compositor` pins one
// placement and one mask so every physical quantity (color, depth, shading,
// normals) is blended over exactly the same foreground region.

use tracing::debug;

use crate::buffer::{ColorSpace, ImageBuffer, Quantity};
use crate::error::{CompositeError, Result};

/// Top-left corner of a patch inside the canvas, in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Placement {
    pub top: usize,
    pub left: usize,
}

impl Placement {
    pub fn new(top: usize, left: usize) -> Self {
        Self { top, left }
    }

    /// From fractions of the canvas height and width (truncated)
    pub fn from_relative(top_left: [f32; 2], canvas_height: usize, canvas_width: usize) -> Self {
        Self {
            top: (top_left[0].max(0.0) * canvas_height as f32) as usize,
            left: (top_left[1].max(0.0) * canvas_width as f32) as usize,
        }
    }
}

/// Overlap of a `height x width` patch at `placement` with `canvas`:
/// patch rows/cols `0..rows`, `0..cols`
fn footprint(canvas: &ImageBuffer, placement: Placement, height: usize, width: usize) -> (usize, usize) {
    let rows = height.min(canvas.height().saturating_sub(placement.top));
    let cols = width.min(canvas.width().saturating_sub(placement.left));
    (rows, cols)
}

fn check_pair(stage: &'static str, dst: &ImageBuffer, src: &ImageBuffer) -> Result<()> {
    if dst.quantity() != src.quantity() {
        return Err(CompositeError::color_space(stage, dst.quantity(), src.quantity()));
    }
    if dst.space() != src.space() {
        return Err(CompositeError::color_space(stage, dst.space(), src.space()));
    }
    Ok(())
}

/// Blend `src` over `dst` at `placement`, weighted by `src_mask`
pub fn composite(dst: &ImageBuffer, placement: Placement, src: &ImageBuffer, src_mask: &ImageBuffer) -> Result<ImageBuffer> {
    check_pair("composite", dst, src)?;
    src_mask.require_quantity("composite", Quantity::Mask)?;
    src.require_extent("composite", src_mask)?;

    let mut out = dst.clone();
    let (rows, cols) = footprint(dst, placement, src.height(), src.width());
    for r in 0..rows {
        for c in 0..cols {
            let m = src_mask.get(r, c, 0);
            let s = src.pixel(r, c);
            let d = out.pixel_mut(placement.top + r, placement.left + c);
            for (d, &s) in d.iter_mut().zip(s) {
                *d = m * s + (1.0 - m) * *d;
            }
        }
    }
    Ok(out)
}

/// Overwrite the footprint of `dst` with `src` (no blending)
pub fn paste(dst: &ImageBuffer, placement: Placement, src: &ImageBuffer) -> Result<ImageBuffer> {
    check_pair("paste", dst, src)?;

    let mut out = dst.clone();
    let (rows, cols) = footprint(dst, placement, src.height(), src.width());
    for r in 0..rows {
        for c in 0..cols {
            out.pixel_mut(placement.top + r, placement.left + c).copy_from_slice(src.pixel(r, c));
        }
    }
    Ok(out)
}

/// One placement and one mask shared by every blended quantity
pub struct Compositor<'a> {
    placement: Placement,
    mask: &'a ImageBuffer,
}

impl<'a> Compositor<'a> {
    pub fn new(placement: Placement, mask: &'a ImageBuffer) -> Result<Self> {
        mask.require_quantity("compositor", Quantity::Mask)?;
        Ok(Self { placement, mask })
    }

    /// Blend `src` (at mask resolution) into `dst`
    pub fn blend(&self, dst: &ImageBuffer, src: &ImageBuffer) -> Result<ImageBuffer> {
        debug!(quantity = %src.quantity(), top = self.placement.top, left = self.placement.left, "compositing");
        composite(dst, self.placement, src, self.mask)
    }

    /// The mask pasted into an empty canvas of the given size
    pub fn full_mask(&self, height: usize, width: usize) -> Result<ImageBuffer> {
        let canvas = ImageBuffer::filled(height, width, Quantity::Mask, ColorSpace::Linear, 0.0);
        paste(&canvas, self.placement, self.mask)
    }

    /// `src` pasted into a zero canvas of the given size
    pub fn full(&self, src: &ImageBuffer, height: usize, width: usize) -> Result<ImageBuffer> {
        src.require_extent("full canvas", self.mask)?;
        let canvas = ImageBuffer::filled(height, width, src.quantity(), src.space(), 0.0);
        paste(&canvas, self.placement, src)
    }
}
