// buffer - Multi-channel float images tagged with what they hold
//
// Every buffer carries its physical quantity (which fixes the channel count)
// and its color space. Stages check these tags at their boundaries instead
// of assuming them; converting between gamma and linear is always explicit.

mod convert;
mod resample;

use std::fmt;

use crate::error::{CompositeError, Result};
use crate::shading::GAMMA;

pub use resample::fit_max_edge;

/// Encoding of the stored values
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    /// Display-nonlinear encoding, `linear = value^GAMMA`
    Gamma,
    /// Proportional to physical intensity (also used for non-color data)
    Linear,
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorSpace::Gamma => write!(f, "gamma"),
            ColorSpace::Linear => write!(f, "linear"),
        }
    }
}

/// Physical quantity stored per pixel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantity {
    Color,
    Albedo,
    Normals,
    Mask,
    Depth,
    /// Shading stored as `invert(shading)`
    InverseShading,
    Shading,
}

impl Quantity {
    pub fn channels(self) -> usize {
        match self {
            Quantity::Color | Quantity::Albedo | Quantity::Normals => 3,
            Quantity::Mask | Quantity::Depth | Quantity::InverseShading | Quantity::Shading => 1,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::Color => "color",
            Quantity::Albedo => "albedo",
            Quantity::Normals => "normals",
            Quantity::Mask => "mask",
            Quantity::Depth => "depth",
            Quantity::InverseShading => "inverse shading",
            Quantity::Shading => "shading",
        };
        f.write_str(name)
    }
}

/// Spatial extents plus channel count
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dims {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.height, self.width, self.channels)
    }
}

/// Row-major interleaved float image
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuffer {
    height: usize,
    width: usize,
    quantity: Quantity,
    space: ColorSpace,
    data: Vec<f32>,
}

impl ImageBuffer {
    pub fn new(
        height: usize,
        width: usize,
        quantity: Quantity,
        space: ColorSpace,
        data: Vec<f32>,
    ) -> Result<Self> {
        let channels = quantity.channels();
        if data.len() != height * width * channels {
            return Err(CompositeError::shape(
                "buffer construction",
                Dims { height, width, channels },
                Dims { height: data.len() / (width * channels).max(1), width, channels },
            ));
        }
        Ok(Self { height, width, quantity, space, data })
    }

    pub fn filled(height: usize, width: usize, quantity: Quantity, space: ColorSpace, value: f32) -> Self {
        let data = vec![value; height * width * quantity.channels()];
        Self { height, width, quantity, space, data }
    }

    /// Build from a per-sample function `f(row, col, channel)`
    pub fn from_fn(
        height: usize,
        width: usize,
        quantity: Quantity,
        space: ColorSpace,
        mut f: impl FnMut(usize, usize, usize) -> f32,
    ) -> Self {
        let channels = quantity.channels();
        let mut data = Vec::with_capacity(height * width * channels);
        for row in 0..height {
            for col in 0..width {
                for ch in 0..channels {
                    data.push(f(row, col, ch));
                }
            }
        }
        Self { height, width, quantity, space, data }
    }

    pub fn height(&self) -> usize { self.height }
    pub fn width(&self) -> usize { self.width }
    pub fn channels(&self) -> usize { self.quantity.channels() }
    pub fn quantity(&self) -> Quantity { self.quantity }
    pub fn space(&self) -> ColorSpace { self.space }
    pub fn data(&self) -> &[f32] { &self.data }

    pub fn dims(&self) -> Dims {
        Dims { height: self.height, width: self.width, channels: self.channels() }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, ch: usize) -> f32 {
        self.data[(row * self.width + col) * self.channels() + ch]
    }

    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> &[f32] {
        let c = self.channels();
        let start = (row * self.width + col) * c;
        &self.data[start..start + c]
    }

    #[inline]
    pub(crate) fn pixel_mut(&mut self, row: usize, col: usize) -> &mut [f32] {
        let c = self.channels();
        let start = (row * self.width + col) * c;
        &mut self.data[start..start + c]
    }

    // ========================================================================
    // Stage boundary checks
    // ========================================================================

    /// Fail unless `other` covers the same pixel grid
    pub fn require_extent(&self, stage: &'static str, other: &ImageBuffer) -> Result<()> {
        if self.height != other.height || self.width != other.width {
            return Err(CompositeError::shape(
                stage,
                Dims { channels: other.channels(), ..self.dims() },
                other.dims(),
            ));
        }
        Ok(())
    }

    pub fn require_quantity(&self, stage: &'static str, quantity: Quantity) -> Result<()> {
        if self.quantity != quantity {
            return Err(CompositeError::color_space(stage, quantity, self.quantity));
        }
        Ok(())
    }

    pub fn require_space(&self, stage: &'static str, space: ColorSpace) -> Result<()> {
        if self.space != space {
            return Err(CompositeError::color_space(stage, space, self.space));
        }
        Ok(())
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    /// Gamma-encoded to linear: `v^GAMMA`
    pub fn to_linear(&self) -> Result<ImageBuffer> {
        self.require_space("to_linear", ColorSpace::Gamma)?;
        let mut out = self.map(self.quantity, |v| v.max(0.0).powf(GAMMA))?;
        out.space = ColorSpace::Linear;
        Ok(out)
    }

    /// Linear to gamma-encoded: `v^(1/GAMMA)`
    pub fn to_gamma(&self) -> Result<ImageBuffer> {
        self.require_space("to_gamma", ColorSpace::Linear)?;
        let mut out = self.map(self.quantity, |v| v.max(0.0).powf(1.0 / GAMMA))?;
        out.space = ColorSpace::Gamma;
        Ok(out)
    }

    /// Per-sample map into a quantity with the same channel count
    pub fn map(&self, quantity: Quantity, f: impl Fn(f32) -> f32) -> Result<ImageBuffer> {
        if quantity.channels() != self.channels() {
            return Err(CompositeError::shape(
                "map",
                self.dims(),
                Dims { height: self.height, width: self.width, channels: quantity.channels() },
            ));
        }
        Ok(ImageBuffer {
            height: self.height,
            width: self.width,
            quantity,
            space: self.space,
            data: self.data.iter().map(|&v| f(v)).collect(),
        })
    }

    /// Combine with `other` sample by sample; a single-channel `other`
    /// broadcasts over every channel of `self`.
    pub fn combine(
        &self,
        stage: &'static str,
        other: &ImageBuffer,
        quantity: Quantity,
        f: impl Fn(f32, f32) -> f32,
    ) -> Result<ImageBuffer> {
        self.require_extent(stage, other)?;
        let c = self.channels();
        let oc = other.channels();
        if (oc != c && oc != 1) || quantity.channels() != c {
            return Err(CompositeError::shape(stage, self.dims(), other.dims()));
        }
        let data = self
            .data
            .iter()
            .enumerate()
            .map(|(i, &a)| {
                let b = if oc == 1 { other.data[i / c] } else { other.data[i] };
                f(a, b)
            })
            .collect();
        Ok(ImageBuffer { height: self.height, width: self.width, quantity, space: self.space, data })
    }

    /// Mean over channels per pixel
    pub fn mean_channels(&self) -> Vec<f32> {
        let c = self.channels() as f32;
        self.data.chunks(self.channels()).map(|p| p.iter().sum::<f32>() / c).collect()
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    /// Copy of the `height x width` window at (`top`, `left`), clamped to bounds
    pub fn crop(&self, top: usize, left: usize, height: usize, width: usize) -> ImageBuffer {
        let bottom = (top + height).min(self.height);
        let right = (left + width).min(self.width);
        let (top, left) = (top.min(bottom), left.min(right));
        let c = self.channels();
        let mut data = Vec::with_capacity((bottom - top) * (right - left) * c);
        for row in top..bottom {
            let start = (row * self.width + left) * c;
            let end = (row * self.width + right) * c;
            data.extend_from_slice(&self.data[start..end]);
        }
        ImageBuffer {
            height: bottom - top,
            width: right - left,
            quantity: self.quantity,
            space: self.space,
            data,
        }
    }

    /// Uniform rescale so the longer edge equals `max_edge`
    pub fn resize_to_max_edge(&self, max_edge: usize) -> ImageBuffer {
        let (h, w) = fit_max_edge(self.height, self.width, max_edge);
        self.resize(h, w)
    }
}
