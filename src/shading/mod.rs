// shading - Gamma constant and the inverted-shading convention
//
// Decomposition models store shading inverted so albedo recovery never
// divides by a value near zero:
//   shading     = 1 / (1 - inv_shading)
//   inv_shading = 1 - 1 / shading

use crate::buffer::{ColorSpace, ImageBuffer, Quantity};
use crate::error::Result;

/// Display gamma, `linear = encoded^GAMMA`
pub const GAMMA: f32 = 2.2;

/// Headroom below 1.0 where `uninvert` clamps its input
pub const INV_SHADING_EPS: f32 = 1e-4;

#[inline]
pub fn invert(shading: f32) -> f32 {
    1.0 - 1.0 / shading
}

/// Recover shading from its inverted form. Undefined at 1.0, so the input
/// is clamped to `1 - INV_SHADING_EPS`.
#[inline]
pub fn uninvert(inv_shading: f32) -> f32 {
    1.0 / (1.0 - inv_shading.min(1.0 - INV_SHADING_EPS))
}

/// Inverse-shading buffer to direct shading
pub fn uninvert_buffer(inv: &ImageBuffer) -> Result<ImageBuffer> {
    inv.require_quantity("uninvert", Quantity::InverseShading)?;
    inv.require_space("uninvert", ColorSpace::Linear)?;
    inv.map(Quantity::Shading, uninvert)
}

/// Direct shading buffer to its inverted form
pub fn invert_buffer(shading: &ImageBuffer) -> Result<ImageBuffer> {
    shading.require_quantity("invert", Quantity::Shading)?;
    shading.require_space("invert", ColorSpace::Linear)?;
    shading.map(Quantity::InverseShading, invert)
}
