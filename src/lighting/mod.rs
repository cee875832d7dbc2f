// lighting - First-order light estimation from shading and normals
//
// Model: inv_shading[p] ~= cx*nx + cy*ny + cz*nz + c0
//
// Solved as linear least squares over the valid pixels of a downsampled
// background. The 4x4 normal equations are accumulated in f64 and solved by
// SVD so rank deficiency (colinear normals, too few pixels) is detected
// rather than producing garbage coefficients.

use nalgebra::{Matrix4, SVD, Vector4};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::buffer::{ColorSpace, ImageBuffer, Quantity, fit_max_edge};
use crate::error::{CompositeError, Result};

/// Normals shorter than this carry no direction and are skipped
const MIN_NORMAL_LENGTH: f32 = 1e-6;

/// Relative aspect difference tolerated between fit inputs
const ASPECT_TOLERANCE: f64 = 0.02;

/// Directional (x, y, z) plus ambient term
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightCoeffs {
    pub direction: [f32; 3],
    pub ambient: f32,
}

impl LightCoeffs {
    pub fn as_array(&self) -> [f32; 4] {
        let [x, y, z] = self.direction;
        [x, y, z, self.ambient]
    }

    /// Predicted inverse shading for a unit normal
    #[inline]
    pub fn eval(&self, n: &[f32]) -> f32 {
        self.direction[0] * n[0] + self.direction[1] * n[1] + self.direction[2] * n[2] + self.ambient
    }
}

/// Valid-pixel policy and solver tolerances
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightFitConfig {
    /// Longest edge the inputs are reduced to before fitting
    pub max_edge: usize,
    /// Pixels within this radius of an invalid pixel are also dropped
    pub erode_radius: usize,
    /// Guide pixels with mean intensity outside this range are dropped
    pub min_guide_luminance: f32,
    pub max_guide_luminance: f32,
    /// Smallest accepted ratio of singular values of the normal equations
    pub rank_tolerance: f64,
}

impl Default for LightFitConfig {
    fn default() -> Self {
        Self {
            max_edge: 512,
            erode_radius: 1,
            min_guide_luminance: 0.05,
            max_guide_luminance: 0.95,
            rank_tolerance: 1e-9,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LightFit {
    pub coeffs: LightCoeffs,
    /// Fitted inverse shading over the downsampled normals (informational)
    pub visualization: ImageBuffer,
    /// Pixels that entered the fit
    pub samples: usize,
}

fn same_aspect(a: &ImageBuffer, b: &ImageBuffer) -> bool {
    let lhs = (a.height() * b.width()) as f64;
    let rhs = (b.height() * a.width()) as f64;
    (lhs - rhs).abs() <= ASPECT_TOLERANCE * lhs.max(rhs)
}

/// Per-pixel validity: non-degenerate normal and a well-exposed guide pixel
fn validity(normals: &ImageBuffer, guide: &ImageBuffer, cfg: &LightFitConfig) -> Vec<bool> {
    let lum = guide.mean_channels();
    (0..normals.height() * normals.width())
        .map(|i| {
            let (r, c) = (i / normals.width(), i % normals.width());
            let n = normals.pixel(r, c);
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            len.is_finite()
                && len >= MIN_NORMAL_LENGTH
                && lum[i] >= cfg.min_guide_luminance
                && lum[i] <= cfg.max_guide_luminance
        })
        .collect()
}

/// Keep a pixel only if its whole (2r+1)^2 neighbourhood is valid
fn erode(valid: &[bool], height: usize, width: usize, radius: usize) -> Vec<bool> {
    if radius == 0 {
        return valid.to_vec();
    }
    let r = radius as isize;
    (0..height * width)
        .map(|i| {
            let (y, x) = ((i / width) as isize, (i % width) as isize);
            (-r..=r).all(|dy| {
                (-r..=r).all(|dx| {
                    let (sy, sx) = (y + dy, x + dx);
                    sy >= 0
                        && sx >= 0
                        && (sy as usize) < height
                        && (sx as usize) < width
                        && valid[sy as usize * width + sx as usize]
                })
            })
        })
        .collect()
}

/// Fit light coefficients to a background's inverse shading and normals.
/// `guide` is the background color image used to reject badly exposed pixels.
pub fn fit_light(
    inv_shading: &ImageBuffer,
    normals: &ImageBuffer,
    guide: &ImageBuffer,
    cfg: &LightFitConfig,
) -> Result<LightFit> {
    inv_shading.require_quantity("fit_light", Quantity::InverseShading)?;
    inv_shading.require_space("fit_light", ColorSpace::Linear)?;
    normals.require_quantity("fit_light", Quantity::Normals)?;
    guide.require_quantity("fit_light", Quantity::Color)?;
    for other in [normals, guide] {
        if !same_aspect(inv_shading, other) {
            return Err(CompositeError::shape("fit_light", inv_shading.dims(), other.dims()));
        }
    }

    // Downsample only: the smallest input bounds the fit grid
    let inputs = [inv_shading, normals, guide];
    let min_h = inputs.iter().map(|b| b.height()).min().unwrap_or(0);
    let min_w = inputs.iter().map(|b| b.width()).min().unwrap_or(0);
    let (h, w) = if min_h.max(min_w) > cfg.max_edge {
        fit_max_edge(min_h, min_w, cfg.max_edge)
    } else {
        (min_h, min_w)
    };
    let shd = inv_shading.resize(h, w);
    let nrm = normals.resize(h, w);
    let guide = guide.resize(h, w);

    let valid = erode(&validity(&nrm, &guide, cfg), h, w, cfg.erode_radius);

    // Normal equations: (A^T A) c = A^T b with rows [n, 1]
    let mut ata = Matrix4::<f64>::zeros();
    let mut atb = Vector4::<f64>::zeros();
    let mut samples = 0usize;
    for (i, _) in valid.iter().enumerate().filter(|(_, v)| **v) {
        let (r, c) = (i / w, i % w);
        let n = nrm.pixel(r, c);
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        let row = Vector4::new(
            (n[0] / len) as f64,
            (n[1] / len) as f64,
            (n[2] / len) as f64,
            1.0,
        );
        ata += row * row.transpose();
        atb += row * shd.get(r, c, 0) as f64;
        samples += 1;
    }

    if samples < 4 {
        return Err(CompositeError::SingularLightFit(format!(
            "{samples} valid pixels, at least 4 required"
        )));
    }

    let svd = SVD::new(ata, true, true);
    let (smin, smax) = svd
        .singular_values
        .iter()
        .fold((f64::MAX, 0.0f64), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    if smax <= 0.0 || smin / smax < cfg.rank_tolerance {
        return Err(CompositeError::SingularLightFit(format!(
            "normal equations rank deficient (singular value ratio {:.3e})",
            if smax > 0.0 { smin / smax } else { 0.0 }
        )));
    }
    let x = svd
        .solve(&atb, 0.0)
        .map_err(|e| CompositeError::SingularLightFit(e.to_string()))?;

    let coeffs = LightCoeffs {
        direction: [x[0] as f32, x[1] as f32, x[2] as f32],
        ambient: x[3] as f32,
    };
    info!(?coeffs, samples, "fitted light coefficients");

    let visualization = shade(&nrm, &coeffs)?.map(Quantity::InverseShading, |v| v.clamp(0.0, 1.0))?;
    debug!(height = h, width = w, "light fit visualization ready");

    Ok(LightFit { coeffs, visualization, samples })
}

/// Evaluate the light model over a normal map, giving predicted inverse
/// shading. Degenerate normals evaluate to the ambient term alone.
pub fn shade(normals: &ImageBuffer, coeffs: &LightCoeffs) -> Result<ImageBuffer> {
    normals.require_quantity("shade", Quantity::Normals)?;
    Ok(ImageBuffer::from_fn(
        normals.height(),
        normals.width(),
        Quantity::InverseShading,
        ColorSpace::Linear,
        |r, c, _| {
            let n = normals.pixel(r, c);
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            if len < MIN_NORMAL_LENGTH {
                coeffs.ambient
            } else {
                coeffs.eval(&[n[0] / len, n[1] / len, n[2] / len])
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_normals(size: usize) -> ImageBuffer {
        // Hemisphere facing the camera; corners fall back to a tilted normal
        ImageBuffer::from_fn(size, size, Quantity::Normals, ColorSpace::Linear, |r, c, ch| {
            let x = (c as f32 + 0.5) / size as f32 * 2.0 - 1.0;
            let y = (r as f32 + 0.5) / size as f32 * 2.0 - 1.0;
            let z = (1.0 - x * x - y * y).max(0.05).sqrt();
            let len = (x * x + y * y + z * z).sqrt();
            [x / len, y / len, z / len][ch]
        })
    }

    fn guide(h: usize, w: usize) -> ImageBuffer {
        ImageBuffer::filled(h, w, Quantity::Color, ColorSpace::Gamma, 0.5)
    }

    fn exact_config() -> LightFitConfig {
        LightFitConfig { erode_radius: 0, ..Default::default() }
    }

    #[test]
    fn recovers_known_coefficients() {
        let truth = LightCoeffs { direction: [0.3, -0.2, 0.6], ambient: 0.15 };
        let normals = sphere_normals(48);
        let shd = shade(&normals, &truth).unwrap();

        let fit = fit_light(&shd, &normals, &guide(48, 48), &exact_config()).unwrap();
        assert_eq!(fit.samples, 48 * 48);
        for (got, want) in fit.coeffs.as_array().iter().zip(truth.as_array()) {
            assert!((got - want).abs() < 1e-4, "{got} vs {want}");
        }
    }

    #[test]
    fn ignores_zero_length_normals() {
        let truth = LightCoeffs { direction: [-0.4, 0.1, 0.5], ambient: 0.2 };
        let base = sphere_normals(32);
        let normals = ImageBuffer::from_fn(32, 32, Quantity::Normals, ColorSpace::Linear, |r, c, ch| {
            if r < 8 { 0.0 } else { base.get(r, c, ch) }
        });
        // Garbage shading where normals are missing must not leak into the fit
        let shd = ImageBuffer::from_fn(32, 32, Quantity::InverseShading, ColorSpace::Linear, |r, c, _| {
            if r < 8 { 42.0 } else { truth.eval(base.pixel(r, c)) }
        });

        let fit = fit_light(&shd, &normals, &guide(32, 32), &exact_config()).unwrap();
        assert_eq!(fit.samples, 24 * 32);
        for (got, want) in fit.coeffs.as_array().iter().zip(truth.as_array()) {
            assert!((got - want).abs() < 1e-4);
        }
    }

    #[test]
    fn erosion_shrinks_valid_region() {
        let valid = vec![true; 25];
        let eroded = erode(&valid, 5, 5, 1);
        assert_eq!(eroded.iter().filter(|v| **v).count(), 9);
    }

    #[test]
    fn colinear_normals_are_singular() {
        let normals = ImageBuffer::from_fn(16, 16, Quantity::Normals, ColorSpace::Linear, |_, _, ch| {
            [0.0, 0.0, 1.0][ch]
        });
        let shd = ImageBuffer::filled(16, 16, Quantity::InverseShading, ColorSpace::Linear, 0.3);
        assert!(matches!(
            fit_light(&shd, &normals, &guide(16, 16), &exact_config()),
            Err(CompositeError::SingularLightFit(_))
        ));
    }

    #[test]
    fn overexposed_guide_leaves_nothing_to_fit() {
        let normals = sphere_normals(16);
        let shd = ImageBuffer::filled(16, 16, Quantity::InverseShading, ColorSpace::Linear, 0.3);
        let bright = ImageBuffer::filled(16, 16, Quantity::Color, ColorSpace::Gamma, 1.0);
        assert!(matches!(
            fit_light(&shd, &normals, &bright, &exact_config()),
            Err(CompositeError::SingularLightFit(_))
        ));
    }

    #[test]
    fn downsamples_large_inputs() {
        let truth = LightCoeffs { direction: [0.1, 0.2, 0.4], ambient: 0.05 };
        let normals = sphere_normals(64);
        let shd = shade(&normals, &truth).unwrap();
        let cfg = LightFitConfig { max_edge: 32, ..exact_config() };

        let fit = fit_light(&shd, &normals, &guide(64, 64), &cfg).unwrap();
        assert_eq!((fit.visualization.height(), fit.visualization.width()), (32, 32));
        // Averaged normals are slightly off the sphere, allow a loose match
        for (got, want) in fit.coeffs.as_array().iter().zip(truth.as_array()) {
            assert!((got - want).abs() < 0.05, "{got} vs {want}");
        }
    }

    #[test]
    fn smaller_inputs_bound_the_fit_grid() {
        let truth = LightCoeffs { direction: [0.2, 0.1, 0.5], ambient: 0.1 };
        let shd = shade(&sphere_normals(64), &truth).unwrap();
        let normals = sphere_normals(32);

        let fit = fit_light(&shd, &normals, &guide(32, 32), &exact_config()).unwrap();
        assert_eq!((fit.visualization.height(), fit.visualization.width()), (32, 32));
        assert_eq!(fit.samples, 32 * 32);
        for (got, want) in fit.coeffs.as_array().iter().zip(truth.as_array()) {
            assert!((got - want).abs() < 0.05, "{got} vs {want}");
        }
    }

    #[test]
    fn rejects_mismatched_aspect() {
        let normals = sphere_normals(16);
        let shd = ImageBuffer::filled(16, 32, Quantity::InverseShading, ColorSpace::Linear, 0.3);
        assert!(matches!(
            fit_light(&shd, &normals, &guide(16, 32), &exact_config()),
            Err(CompositeError::ShapeMismatch { .. })
        ));
    }
}
