// heuristic.rs - Deterministic stand-ins for the inference collaborators
//
// No networks involved: depth is a vertical gradient, shading follows
// luminance, normals come from luminance treated as a height field. Good
// enough to drive the whole pipeline offline and in tests.

use super::{Decomposition, IntrinsicModels, Reshading};
use crate::buffer::{ColorSpace, ImageBuffer, Quantity};
use crate::composite::{Placement, composite};
use crate::error::Result;
use crate::lighting::shade;
use crate::reshade::ReshadingInputs;
use crate::shading::{invert_buffer, uninvert_buffer};

#[derive(Clone, Debug)]
pub struct HeuristicModels {
    /// Gradient gain when turning luminance into surface slope
    pub relief: f32,
}

impl Default for HeuristicModels {
    fn default() -> Self {
        Self { relief: 8.0 }
    }
}

fn luminance(image: &ImageBuffer) -> Vec<f32> {
    image
        .data()
        .chunks(3)
        .map(|p| 0.2126 * p[0] + 0.7152 * p[1] + 0.0722 * p[2])
        .collect()
}

impl IntrinsicModels for HeuristicModels {
    /// Far at the top, near at the bottom
    fn estimate_depth(&mut self, image: &ImageBuffer) -> Result<ImageBuffer> {
        let h = image.height().max(1) as f32;
        Ok(ImageBuffer::from_fn(
            image.height(),
            image.width(),
            Quantity::Depth,
            ColorSpace::Linear,
            |y, _, _| y as f32 / h,
        ))
    }

    /// Shading in [1, 2] keeps inverse shading inside [0, 0.5]
    fn decompose(&mut self, image: &ImageBuffer) -> Result<Decomposition> {
        let lum = luminance(image);
        let w = image.width();
        let shading = ImageBuffer::from_fn(image.height(), w, Quantity::Shading, ColorSpace::Linear, |r, c, _| {
            1.0 + lum[r * w + c].clamp(0.0, 1.0)
        });
        let albedo = image.combine("heuristic decomposition", &shading, Quantity::Albedo, |v, s| v / s)?;
        let inv_shading = invert_buffer(&shading)?;
        Ok(Decomposition { inv_shading, albedo })
    }

    /// Central differences of the luminance height field
    fn estimate_normals(&mut self, image: &ImageBuffer) -> Result<ImageBuffer> {
        let (h, w) = (image.height(), image.width());
        let height = luminance(image);
        let at = |y: usize, x: usize| height[y.min(h - 1) * w + x.min(w - 1)];

        Ok(ImageBuffer::from_fn(h, w, Quantity::Normals, ColorSpace::Linear, |y, x, ch| {
            // Edges reuse their inner neighbour's slope
            let (xl, xr) = (x.saturating_sub(1), (x + 1).min(w - 1));
            let (yu, yd) = (y.saturating_sub(1), (y + 1).min(h - 1));
            let dzdx = (at(y, xr) - at(y, xl)) * self.relief / (xr - xl).max(1) as f32;
            let dzdy = (at(yd, x) - at(yu, x)) * self.relief / (yd - yu).max(1) as f32;

            // Normal = normalize(-dzdx, -dzdy, 1.0)
            let len = (dzdx * dzdx + dzdy * dzdy + 1.0).sqrt();
            [-dzdx / len, -dzdy / len, 1.0 / len][ch]
        }))
    }

    /// Re-derives the composite's albedo; no actual harmonization
    fn harmonize_albedo(
        &mut self,
        composite: &ImageBuffer,
        _mask: &ImageBuffer,
        inv_shading: &ImageBuffer,
    ) -> Result<ImageBuffer> {
        let shading = uninvert_buffer(inv_shading)?;
        composite
            .to_linear()?
            .combine("heuristic harmonizer", &shading, Quantity::Albedo, |c, s| c / s)?
            .to_gamma()
    }

    /// Relights the foreground with the fitted light model
    fn reshade(&mut self, inputs: &ReshadingInputs<'_>) -> Result<Reshading> {
        let shading = uninvert_buffer(&shade(inputs.normals, &inputs.light)?)?;
        let relit = inputs
            .albedo
            .combine("heuristic reshading", &shading, Quantity::Color, |a, s| a * s)?;
        let composite = composite(inputs.composite, Placement::default(), &relit, inputs.mask)?;
        Ok(Reshading { composite, reshading: Some(shading) })
    }
}
