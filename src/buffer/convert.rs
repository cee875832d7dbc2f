// convert.rs - Bridges to the `image` crate (decode, encode, PNG)

use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};

use super::{ColorSpace, ImageBuffer, Quantity};
use crate::error::{CompositeError, Result};

impl ImageBuffer {
    /// Decoded image as a gamma-encoded color buffer in [0, 1]
    pub fn from_dynamic_rgb(img: &DynamicImage) -> Result<ImageBuffer> {
        let rgb = img.to_rgb32f();
        let (w, h) = rgb.dimensions();
        ImageBuffer::new(h as usize, w as usize, Quantity::Color, ColorSpace::Gamma, rgb.into_raw())
    }

    /// Split an RGBA cutout into its color and alpha mask
    pub fn split_rgba(img: &DynamicImage) -> Result<(ImageBuffer, ImageBuffer)> {
        let rgba = img.to_rgba32f();
        let (w, h) = rgba.dimensions();
        let (h, w) = (h as usize, w as usize);
        let mut color = Vec::with_capacity(h * w * 3);
        let mut alpha = Vec::with_capacity(h * w);
        for p in rgba.pixels() {
            color.extend_from_slice(&p.0[..3]);
            alpha.push(p.0[3]);
        }
        Ok((
            ImageBuffer::new(h, w, Quantity::Color, ColorSpace::Gamma, color)?,
            ImageBuffer::new(h, w, Quantity::Mask, ColorSpace::Linear, alpha)?,
        ))
    }

    pub fn open_rgb(path: &Path) -> Result<ImageBuffer> {
        Self::from_dynamic_rgb(&image::open(path)?)
    }

    pub fn open_rgba(path: &Path) -> Result<(ImageBuffer, ImageBuffer)> {
        Self::split_rgba(&image::open(path)?)
    }

    /// 8-bit rendering for inspection.
    /// Normals map to `(n + 1) / 2`, depth is min-max normalized, everything
    /// else is clamped to [0, 1]. No color space conversion is applied.
    pub fn to_dynamic(&self) -> Result<DynamicImage> {
        let encoded: Vec<u8> = match self.quantity {
            Quantity::Normals => self.data.iter().map(|&v| to_u8((v + 1.0) * 0.5)).collect(),
            Quantity::Depth => {
                let (lo, hi) = self
                    .data
                    .iter()
                    .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
                let range = (hi - lo).max(1e-6);
                self.data.iter().map(|&v| to_u8((v - lo) / range)).collect()
            }
            _ => self.data.iter().map(|&v| to_u8(v)).collect(),
        };

        let (w, h) = (self.width as u32, self.height as u32);
        let malformed = || CompositeError::shape("png encode", self.dims(), self.dims());
        match self.channels() {
            3 => RgbImage::from_raw(w, h, encoded).map(DynamicImage::ImageRgb8).ok_or_else(malformed),
            _ => GrayImage::from_raw(w, h, encoded).map(DynamicImage::ImageLuma8).ok_or_else(malformed),
        }
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.to_dynamic()?.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn split_rgba_separates_alpha() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(1, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(2, 1, Rgba([0, 0, 255, 0]));
        let (color, mask) = ImageBuffer::split_rgba(&DynamicImage::ImageRgba8(img)).unwrap();

        assert_eq!((color.height(), color.width()), (2, 3));
        assert_eq!(color.space(), ColorSpace::Gamma);
        assert_eq!(color.pixel(0, 1), &[1.0, 0.0, 0.0]);
        assert_eq!(mask.quantity(), Quantity::Mask);
        assert_eq!(mask.get(0, 1, 0), 1.0);
        assert_eq!(mask.get(1, 2, 0), 0.0);
    }

    #[test]
    fn normals_encode_around_mid_gray() {
        let n = ImageBuffer::filled(1, 1, Quantity::Normals, ColorSpace::Linear, 0.0);
        let img = n.to_dynamic().unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [128, 128, 128]);
    }

    #[test]
    fn depth_is_normalized() {
        let d = ImageBuffer::from_fn(1, 3, Quantity::Depth, ColorSpace::Linear, |_, c, _| {
            10.0 + c as f32 * 5.0
        });
        let img = d.to_dynamic().unwrap().to_luma8();
        assert_eq!(img.into_raw(), vec![0, 128, 255]);
    }
}
