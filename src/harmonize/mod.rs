// harmonize - Albedo harmonizer adapter
//
// The harmonizer returns albedo in gamma space. It is linearized here, then
// multiplied back with the composite's own shading to give the harmonized
// composite. The naive albedo (composite / shading) is kept for comparison.

use tracing::info;

use crate::buffer::{ColorSpace, ImageBuffer, Quantity};
use crate::error::Result;
use crate::models::{IntrinsicModels, check_output};
use crate::shading::uninvert_buffer;

#[derive(Clone, Debug)]
pub struct Harmonized {
    /// Harmonized albedo, linear
    pub albedo: ImageBuffer,
    /// `composite^GAMMA / shading` before harmonization, linear
    pub original_albedo: ImageBuffer,
    /// `albedo * shading`, linear
    pub composite: ImageBuffer,
}

/// Harmonize the albedo of a naive composite.
///
/// `composite` is the gamma-encoded blend, `mask` the full-canvas foreground
/// mask and `inv_shading` the composited inverse shading.
pub fn harmonize_albedo<M: IntrinsicModels + ?Sized>(
    models: &mut M,
    composite: &ImageBuffer,
    mask: &ImageBuffer,
    inv_shading: &ImageBuffer,
) -> Result<Harmonized> {
    composite.require_quantity("harmonize", Quantity::Color)?;
    composite.require_space("harmonize", ColorSpace::Gamma)?;
    mask.require_quantity("harmonize", Quantity::Mask)?;
    composite.require_extent("harmonize", mask)?;
    composite.require_extent("harmonize", inv_shading)?;
    let shading = uninvert_buffer(inv_shading)?;

    info!("harmonizing albedo");
    let harmonized = models.harmonize_albedo(composite, mask, inv_shading)?;
    check_output("albedo", &harmonized, composite, Quantity::Albedo, ColorSpace::Gamma)?;
    let albedo = harmonized.to_linear()?;

    let original_albedo = composite
        .to_linear()?
        .combine("original albedo", &shading, Quantity::Albedo, |c, s| c / s)?;
    let composite = albedo.combine("harmonized composite", &shading, Quantity::Color, |a, s| a * s)?;

    Ok(Harmonized { albedo, original_albedo, composite })
}
