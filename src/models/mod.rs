// models - Capability interface over the five inference collaborators
//
// The compositing core only sees `IntrinsicModels`. `OnnxModels` runs real
// networks through ONNX Runtime, `HeuristicModels` is a deterministic
// model-free stand-in. Every result is validated before it reaches a later
// stage: malformed output is an `ExternalModel` failure.

mod heuristic;
mod onnx;

pub use heuristic::HeuristicModels;
pub use onnx::OnnxModels;

use tracing::debug;

use crate::buffer::{ColorSpace, ImageBuffer, Quantity};
use crate::error::{CompositeError, Result};
use crate::reshade::ReshadingInputs;

/// Intrinsic decomposition of one image
#[derive(Clone, Debug)]
pub struct Decomposition {
    pub inv_shading: ImageBuffer,
    pub albedo: ImageBuffer,
}

/// Reshading network result
#[derive(Clone, Debug)]
pub struct Reshading {
    pub composite: ImageBuffer,
    pub reshading: Option<ImageBuffer>,
}

pub trait IntrinsicModels {
    /// Monotonic, unitless depth (H x W)
    fn estimate_depth(&mut self, image: &ImageBuffer) -> Result<ImageBuffer>;

    /// Inverse shading and linear albedo of a linear image
    fn decompose(&mut self, image: &ImageBuffer) -> Result<Decomposition>;

    /// Unit normals in a camera-relative frame (H x W x 3)
    fn estimate_normals(&mut self, image: &ImageBuffer) -> Result<ImageBuffer>;

    /// Harmonized albedo, gamma encoded
    fn harmonize_albedo(
        &mut self,
        composite: &ImageBuffer,
        mask: &ImageBuffer,
        inv_shading: &ImageBuffer,
    ) -> Result<ImageBuffer>;

    fn reshade(&mut self, inputs: &ReshadingInputs<'_>) -> Result<Reshading>;
}

/// Check a collaborator result against the grid and tags it must have
pub(crate) fn check_output(
    model: &'static str,
    out: &ImageBuffer,
    like: &ImageBuffer,
    quantity: Quantity,
    space: ColorSpace,
) -> Result<()> {
    if out.height() != like.height() || out.width() != like.width() {
        return Err(CompositeError::external(
            model,
            format!("returned {}, expected {}x{}", out.dims(), like.height(), like.width()),
        ));
    }
    if out.quantity() != quantity {
        return Err(CompositeError::external(
            model,
            format!("returned {} where {} was expected", out.quantity(), quantity),
        ));
    }
    if out.space() != space {
        return Err(CompositeError::external(
            model,
            format!("returned {} values where {} was expected", out.space(), space),
        ));
    }
    if out.data().iter().any(|v| !v.is_finite()) {
        return Err(CompositeError::external(model, "returned non-finite values"));
    }
    Ok(())
}

pub fn estimate_depth<M: IntrinsicModels + ?Sized>(models: &mut M, image: &ImageBuffer) -> Result<ImageBuffer> {
    debug!(height = image.height(), width = image.width(), "running depth estimation");
    let depth = models.estimate_depth(image)?;
    check_output("depth", &depth, image, Quantity::Depth, ColorSpace::Linear)?;
    Ok(depth)
}

/// Decompose a linear image. Passing a gamma-encoded image is rejected.
pub fn decompose<M: IntrinsicModels + ?Sized>(models: &mut M, image: &ImageBuffer) -> Result<Decomposition> {
    image.require_quantity("decompose", Quantity::Color)?;
    image.require_space("decompose", ColorSpace::Linear)?;
    debug!(height = image.height(), width = image.width(), "running intrinsic decomposition");
    let out = models.decompose(image)?;
    check_output("intrinsic", &out.inv_shading, image, Quantity::InverseShading, ColorSpace::Linear)?;
    check_output("intrinsic", &out.albedo, image, Quantity::Albedo, ColorSpace::Linear)?;
    Ok(out)
}

pub fn estimate_normals<M: IntrinsicModels + ?Sized>(models: &mut M, image: &ImageBuffer) -> Result<ImageBuffer> {
    debug!(height = image.height(), width = image.width(), "running normals estimation");
    let normals = models.estimate_normals(image)?;
    check_output("normals", &normals, image, Quantity::Normals, ColorSpace::Linear)?;
    Ok(normals)
}
