// reshade - Reshading synthesizer adapter
//
// Assembles the seven aligned canvas buffers for the reshading network and
// validates its result. Nothing is resampled here: every input must already
// sit on the composite's pixel grid.

use tracing::info;

use crate::buffer::{ColorSpace, ImageBuffer, Quantity};
use crate::error::Result;
use crate::lighting::LightCoeffs;
use crate::models::{IntrinsicModels, Reshading, check_output};

/// Canvas-resolution inputs of the reshading network
#[derive(Clone, Copy, Debug)]
pub struct ReshadingInputs<'a> {
    /// Harmonized composite, linear
    pub composite: &'a ImageBuffer,
    /// Full-canvas foreground mask
    pub mask: &'a ImageBuffer,
    pub inv_shading: &'a ImageBuffer,
    pub depth: &'a ImageBuffer,
    pub normals: &'a ImageBuffer,
    /// Harmonized albedo, linear
    pub albedo: &'a ImageBuffer,
    pub light: LightCoeffs,
}

impl ReshadingInputs<'_> {
    /// Every buffer on the composite's grid, with the expected tags
    pub fn validate(&self) -> Result<()> {
        const STAGE: &str = "reshade";
        let checks: [(&ImageBuffer, Quantity, ColorSpace); 6] = [
            (self.composite, Quantity::Color, ColorSpace::Linear),
            (self.mask, Quantity::Mask, ColorSpace::Linear),
            (self.inv_shading, Quantity::InverseShading, ColorSpace::Linear),
            (self.depth, Quantity::Depth, ColorSpace::Linear),
            (self.normals, Quantity::Normals, ColorSpace::Linear),
            (self.albedo, Quantity::Albedo, ColorSpace::Linear),
        ];
        for (buf, quantity, space) in checks {
            buf.require_quantity(STAGE, quantity)?;
            buf.require_space(STAGE, space)?;
            self.composite.require_extent(STAGE, buf)?;
        }
        Ok(())
    }
}

pub fn reshade<M: IntrinsicModels + ?Sized>(models: &mut M, inputs: &ReshadingInputs<'_>) -> Result<Reshading> {
    inputs.validate()?;

    info!(light = ?inputs.light.as_array(), "running reshading");
    let out = models.reshade(inputs)?;
    check_output("reshading", &out.composite, inputs.composite, Quantity::Color, ColorSpace::Linear)?;
    if let Some(shading) = &out.reshading {
        check_output("reshading", shading, inputs.composite, Quantity::Shading, ColorSpace::Linear)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositeError;
    use crate::models::HeuristicModels;

    struct Canvas {
        composite: ImageBuffer,
        mask: ImageBuffer,
        inv_shading: ImageBuffer,
        depth: ImageBuffer,
        normals: ImageBuffer,
        albedo: ImageBuffer,
    }

    fn canvas(h: usize, w: usize) -> Canvas {
        Canvas {
            composite: ImageBuffer::filled(h, w, Quantity::Color, ColorSpace::Linear, 0.3),
            mask: ImageBuffer::from_fn(h, w, Quantity::Mask, ColorSpace::Linear, |r, _, _| {
                if r < h / 2 { 1.0 } else { 0.0 }
            }),
            inv_shading: ImageBuffer::filled(h, w, Quantity::InverseShading, ColorSpace::Linear, 0.2),
            depth: ImageBuffer::filled(h, w, Quantity::Depth, ColorSpace::Linear, 0.5),
            normals: ImageBuffer::from_fn(h, w, Quantity::Normals, ColorSpace::Linear, |_, _, ch| {
                [0.0, 0.0, 1.0][ch]
            }),
            albedo: ImageBuffer::filled(h, w, Quantity::Albedo, ColorSpace::Linear, 0.5),
        }
    }

    fn light() -> LightCoeffs {
        LightCoeffs { direction: [0.0, 0.0, 0.25], ambient: 0.25 }
    }

    #[test]
    fn relights_only_inside_mask() {
        let c = canvas(6, 4);
        let inputs = ReshadingInputs {
            composite: &c.composite,
            mask: &c.mask,
            inv_shading: &c.inv_shading,
            depth: &c.depth,
            normals: &c.normals,
            albedo: &c.albedo,
            light: light(),
        };
        let out = reshade(&mut HeuristicModels::default(), &inputs).unwrap();

        // inv = 0.5 -> shading 2.0, albedo 0.5 -> 1.0 inside the mask
        for r in 0..6 {
            let expected = if r < 3 { 1.0 } else { 0.3 };
            assert!((out.composite.get(r, 1, 0) - expected).abs() < 1e-5, "row {r}");
        }
        assert!(out.reshading.is_some());
    }

    #[test]
    fn rejects_misaligned_buffer() {
        let c = canvas(6, 4);
        let depth = ImageBuffer::filled(6, 5, Quantity::Depth, ColorSpace::Linear, 0.5);
        let inputs = ReshadingInputs {
            composite: &c.composite,
            mask: &c.mask,
            inv_shading: &c.inv_shading,
            depth: &depth,
            normals: &c.normals,
            albedo: &c.albedo,
            light: light(),
        };
        assert!(matches!(
            reshade(&mut HeuristicModels::default(), &inputs),
            Err(CompositeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_gamma_albedo() {
        let c = canvas(4, 4);
        let gamma = c.albedo.to_gamma().unwrap();
        let inputs = ReshadingInputs {
            composite: &c.composite,
            mask: &c.mask,
            inv_shading: &c.inv_shading,
            depth: &c.depth,
            normals: &c.normals,
            albedo: &gamma,
            light: light(),
        };
        assert!(matches!(
            reshade(&mut HeuristicModels::default(), &inputs),
            Err(CompositeError::InvalidColorSpace { .. })
        ));
    }
}
