// onnx.rs - Collaborators backed by ONNX Runtime sessions
//
// Tensor contract (NCHW, f32):
//   depth      1x3x256x256 ImageNet-normalized      -> any 2D map, min-max normalized
//   normals    1x3x384x384 in [0, 1]                -> 1x3xHxW in [0, 1], mapped to 2n - 1
//   intrinsic  1x3xHxW linear                       -> [1x1xHxW inv shading, 1x3xHxW albedo]
//   albedo     1x5xHxW composite | mask | inv shd   -> 1x3xHxW gamma albedo
//   reshading  1x12xHxW composite | mask | inv shd | depth | normals | albedo, 1x4 light
//              -> [1x3xHxW composite, optional 1x1xHxW reshading]
// Outputs at another resolution are resampled back to the input grid.

use std::path::Path;

use ndarray::{Array2, Array4};
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::{Decomposition, IntrinsicModels, Reshading};
use crate::buffer::{ColorSpace, ImageBuffer, Quantity};
use crate::config::ModelPaths;
use crate::error::{CompositeError, Result};
use crate::reshade::ReshadingInputs;

// ImageNet normalization constants
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

const DEPTH_SIZE: usize = 256;
const NORMALS_SIZE: usize = 384;

/// Flattened output tensor
struct RawTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl RawTensor {
    /// (channels, height, width) of a 4D, 3D or 2D output
    fn planes(&self, model: &'static str) -> Result<(usize, usize, usize)> {
        let s = &self.shape;
        match s.len() {
            4 => Ok((s[1], s[2], s[3])),
            3 => Ok((s[0], s[1], s[2])),
            2 => Ok((1, s[0], s[1])),
            _ => Err(CompositeError::external(model, format!("unexpected output shape {s:?}"))),
        }
    }

    /// Planes `first..first + quantity.channels()` as an interleaved buffer
    fn to_buffer(
        &self,
        model: &'static str,
        first: usize,
        quantity: Quantity,
        space: ColorSpace,
    ) -> Result<ImageBuffer> {
        let (c, h, w) = self.planes(model)?;
        if first + quantity.channels() > c || h == 0 || w == 0 {
            return Err(CompositeError::external(
                model,
                format!("output {:?} lacks {} planes from {first}", self.shape, quantity),
            ));
        }
        Ok(ImageBuffer::from_fn(h, w, quantity, space, |y, x, ch| {
            self.data[(first + ch) * h * w + y * w + x]
        }))
    }
}

/// Stack buffers' channels into a 1xCxHxW tensor, mapping each sample
/// with `f(channel, value)`
fn to_tensor(buffers: &[&ImageBuffer], f: impl Fn(usize, f32) -> f32) -> Array4<f32> {
    let (h, w) = (buffers[0].height(), buffers[0].width());
    let total: usize = buffers.iter().map(|b| b.channels()).sum();
    let mut input = Array4::<f32>::zeros((1, total, h, w));
    let mut plane = 0;
    for b in buffers {
        for y in 0..h {
            for x in 0..w {
                for (ch, &v) in b.pixel(y, x).iter().enumerate() {
                    input[[0, plane + ch, y, x]] = f(plane + ch, v);
                }
            }
        }
        plane += b.channels();
    }
    input
}

fn open_session(model: &'static str, path: &Path) -> Result<Session> {
    if !path.exists() {
        return Err(CompositeError::external(model, format!("model not found at {}", path.display())));
    }
    info!(model, path = %path.display(), "loading ONNX model");
    Session::builder()
        .and_then(|builder| builder.commit_from_file(path))
        .map_err(|e| CompositeError::external(model, e))
}

fn input_name(session: &Session, index: usize, fallback: &str) -> String {
    session.inputs.get(index).map(|i| i.name.clone()).unwrap_or_else(|| fallback.into())
}

/// Run a single-input session and collect every output
fn run(model: &'static str, session: &mut Session, input: Array4<f32>) -> Result<Vec<RawTensor>> {
    let name = input_name(session, 0, "input");
    let count = session.outputs.len();
    let value = Value::from_array(input).map_err(|e| CompositeError::external(model, e))?;
    let outputs = session
        .run(ort::inputs![name => value])
        .map_err(|e| CompositeError::external(model, e))?;

    let mut tensors = Vec::with_capacity(count);
    for i in 0..count {
        let arr = outputs[i].try_extract_array::<f32>().map_err(|e| CompositeError::external(model, e))?;
        tensors.push(RawTensor { shape: arr.shape().to_vec(), data: arr.iter().copied().collect() });
    }
    Ok(tensors)
}

fn first_output(model: &'static str, mut tensors: Vec<RawTensor>) -> Result<RawTensor> {
    if tensors.is_empty() {
        return Err(CompositeError::external(model, "session produced no outputs"));
    }
    Ok(tensors.swap_remove(0))
}

pub struct OnnxModels {
    depth: Session,
    intrinsic: Session,
    normals: Session,
    albedo: Session,
    reshading: Session,
}

impl OnnxModels {
    /// Open all five sessions up front; any failure is fatal
    pub fn load(paths: &ModelPaths) -> Result<Self> {
        Ok(Self {
            depth: open_session("depth", &paths.resolve(&paths.depth))?,
            intrinsic: open_session("intrinsic", &paths.resolve(&paths.intrinsic))?,
            normals: open_session("normals", &paths.resolve(&paths.normals))?,
            albedo: open_session("albedo", &paths.resolve(&paths.albedo))?,
            reshading: open_session("reshading", &paths.resolve(&paths.reshading))?,
        })
    }
}

impl IntrinsicModels for OnnxModels {
    fn estimate_depth(&mut self, image: &ImageBuffer) -> Result<ImageBuffer> {
        let resized = image.resize(DEPTH_SIZE, DEPTH_SIZE);
        let input = to_tensor(&[&resized], |c, v| (v - MEAN[c]) / STD[c]);
        let out = first_output("depth", run("depth", &mut self.depth, input)?)?;

        let raw = out.to_buffer("depth", 0, Quantity::Depth, ColorSpace::Linear)?;
        let (min_d, max_d) = raw
            .data()
            .iter()
            .fold((f32::MAX, f32::MIN), |(mn, mx), &v| (mn.min(v), mx.max(v)));
        let range = (max_d - min_d).max(1e-6);
        debug!(min_d, max_d, "depth range");

        Ok(raw
            .map(Quantity::Depth, |v| (v - min_d) / range)?
            .resize(image.height(), image.width()))
    }

    fn decompose(&mut self, image: &ImageBuffer) -> Result<Decomposition> {
        let input = to_tensor(&[image], |_, v| v);
        let outputs = run("intrinsic", &mut self.intrinsic, input)?;
        if outputs.len() < 2 {
            return Err(CompositeError::external(
                "intrinsic",
                format!("expected inverse shading and albedo outputs, got {}", outputs.len()),
            ));
        }
        let inv_shading = outputs[0]
            .to_buffer("intrinsic", 0, Quantity::InverseShading, ColorSpace::Linear)?
            .resize(image.height(), image.width());
        let albedo = outputs[1]
            .to_buffer("intrinsic", 0, Quantity::Albedo, ColorSpace::Linear)?
            .resize(image.height(), image.width());
        Ok(Decomposition { inv_shading, albedo })
    }

    fn estimate_normals(&mut self, image: &ImageBuffer) -> Result<ImageBuffer> {
        let resized = image.resize(NORMALS_SIZE, NORMALS_SIZE);
        let input = to_tensor(&[&resized], |_, v| v.clamp(0.0, 1.0));
        let out = first_output("normals", run("normals", &mut self.normals, input)?)?;

        let normals = out
            .to_buffer("normals", 0, Quantity::Normals, ColorSpace::Linear)?
            .map(Quantity::Normals, |v| v * 2.0 - 1.0)?
            .resize(image.height(), image.width());

        // Resampling shortens normals, restore unit length
        Ok(ImageBuffer::from_fn(
            normals.height(),
            normals.width(),
            Quantity::Normals,
            ColorSpace::Linear,
            |y, x, ch| {
                let n = normals.pixel(y, x);
                let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
                if len > 1e-6 { n[ch] / len } else { 0.0 }
            },
        ))
    }

    fn harmonize_albedo(
        &mut self,
        composite: &ImageBuffer,
        mask: &ImageBuffer,
        inv_shading: &ImageBuffer,
    ) -> Result<ImageBuffer> {
        let input = to_tensor(&[composite, mask, inv_shading], |_, v| v);
        let out = first_output("albedo", run("albedo", &mut self.albedo, input)?)?;
        Ok(out
            .to_buffer("albedo", 0, Quantity::Albedo, ColorSpace::Gamma)?
            .resize(composite.height(), composite.width()))
    }

    fn reshade(&mut self, inputs: &ReshadingInputs<'_>) -> Result<Reshading> {
        const MODEL: &str = "reshading";
        let image = to_tensor(
            &[inputs.composite, inputs.mask, inputs.inv_shading, inputs.depth, inputs.normals, inputs.albedo],
            |_, v| v,
        );
        let light = Array2::from_shape_vec((1, 4), inputs.light.as_array().to_vec())
            .map_err(|e| CompositeError::external(MODEL, e))?;

        let image_name = input_name(&self.reshading, 0, "image");
        let light_name = input_name(&self.reshading, 1, "light");
        let count = self.reshading.outputs.len();
        let image_val = Value::from_array(image).map_err(|e| CompositeError::external(MODEL, e))?;
        let light_val = Value::from_array(light).map_err(|e| CompositeError::external(MODEL, e))?;
        let outputs = self
            .reshading
            .run(ort::inputs![image_name => image_val, light_name => light_val])
            .map_err(|e| CompositeError::external(MODEL, e))?;

        let mut tensors = Vec::with_capacity(count);
        for i in 0..count {
            let arr = outputs[i].try_extract_array::<f32>().map_err(|e| CompositeError::external(MODEL, e))?;
            tensors.push(RawTensor { shape: arr.shape().to_vec(), data: arr.iter().copied().collect() });
        }
        drop(outputs);

        let (h, w) = (inputs.composite.height(), inputs.composite.width());
        let composite = tensors
            .first()
            .ok_or_else(|| CompositeError::external(MODEL, "session produced no outputs"))?
            .to_buffer(MODEL, 0, Quantity::Color, ColorSpace::Linear)?
            .resize(h, w);
        let reshading = match tensors.get(1) {
            Some(t) => Some(t.to_buffer(MODEL, 0, Quantity::Shading, ColorSpace::Linear)?.resize(h, w)),
            None => None,
        };
        Ok(Reshading { composite, reshading })
    }
}
