// error.rs - Error kinds raised at pipeline stage boundaries
//
// Precondition failures (mask, shape, color space, light fit) are detected
// where they would otherwise corrupt downstream buffers. Model failures are
// never retried.

use std::fmt::Display;

use thiserror::Error;

use crate::buffer::Dims;

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("degenerate mask: {0}")]
    DegenerateMask(String),

    #[error("shape mismatch in {stage}: expected {expected}, found {found}")]
    ShapeMismatch { stage: &'static str, expected: Dims, found: Dims },

    #[error("invalid color space in {stage}: expected {expected}, found {found}")]
    InvalidColorSpace { stage: &'static str, expected: String, found: String },

    #[error("singular light fit: {0}")]
    SingularLightFit(String),

    #[error("{model} model failed: {reason}")]
    ExternalModel { model: &'static str, reason: String },

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl CompositeError {
    /// Wrap a collaborator failure
    pub fn external(model: &'static str, reason: impl Display) -> Self {
        Self::ExternalModel { model, reason: reason.to_string() }
    }

    pub fn shape(stage: &'static str, expected: Dims, found: Dims) -> Self {
        Self::ShapeMismatch { stage, expected, found }
    }

    pub fn color_space(stage: &'static str, expected: impl Display, found: impl Display) -> Self {
        Self::InvalidColorSpace {
            stage,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompositeError>;
