// intrinsic-composite - Physically-aware cutout compositing
//
// Places a foreground cutout onto a background and harmonizes the result
// using per-pixel intrinsic buffers (albedo, shading, depth, normals) from
// external inference models: every buffer is composited under one shared
// placement, albedo is harmonized, a first-order light model is fitted to
// the background, and the composite is reshaded under that light.

pub mod buffer;
pub mod composite;
pub mod config;
pub mod error;
pub mod export;
pub mod harmonize;
pub mod lighting;
pub mod mask;
pub mod models;
pub mod pipeline;
pub mod reshade;
pub mod shading;

pub use buffer::{ColorSpace, Dims, ImageBuffer, Quantity};
pub use composite::{Compositor, Placement, composite, paste};
pub use config::{JobConfig, ModelPaths, PipelineConfig};
pub use error::{CompositeError, Result};
pub use lighting::{LightCoeffs, LightFit, LightFitConfig, fit_light, shade};
pub use mask::{BoundingBox, ForegroundCrop, bbox, crop_and_rescale};
pub use models::{HeuristicModels, IntrinsicModels, OnnxModels};
pub use pipeline::{PipelineOutput, run, run_job};
