// resample.rs - Antialiased separable resampling
//
// Triangle filter whose support widens by the downscale factor, so shrinking
// averages over the source footprint instead of aliasing. Upscaling reduces
// to bilinear. Values are never clamped (normals and depth keep their range).

use super::ImageBuffer;

/// Output size whose longer edge equals `max_edge`, aspect preserved
/// (each edge truncated, never below one pixel)
pub fn fit_max_edge(height: usize, width: usize, max_edge: usize) -> (usize, usize) {
    let longest = height.max(width).max(1);
    let scale = max_edge as f64 / longest as f64;
    let h = ((height as f64 * scale) as usize).max(1);
    let w = ((width as f64 * scale) as usize).max(1);
    (h, w)
}

/// Source taps for one output sample
struct Taps {
    start: usize,
    weights: Vec<f32>,
}

fn compute_taps(src_len: usize, dst_len: usize) -> Vec<Taps> {
    let scale = dst_len as f64 / src_len as f64;
    let filter_scale = (1.0 / scale).max(1.0);
    let support = filter_scale;

    (0..dst_len)
        .map(|i| {
            let center = (i as f64 + 0.5) / scale - 0.5;
            let lo = (center - support).floor().max(0.0) as usize;
            let hi = ((center + support).ceil() as usize).min(src_len - 1);

            let mut weights: Vec<f32> = (lo..=hi)
                .map(|j| (1.0 - (j as f64 - center).abs() / filter_scale).max(0.0) as f32)
                .collect();
            let sum: f32 = weights.iter().sum();
            if sum > 0.0 {
                weights.iter_mut().for_each(|w| *w /= sum);
            } else {
                // Center fell outside the source, use the nearest edge sample
                let nearest = center.round().clamp(0.0, (src_len - 1) as f64) as usize;
                weights = vec![0.0; hi - lo + 1];
                weights[nearest.clamp(lo, hi) - lo] = 1.0;
            }
            Taps { start: lo, weights }
        })
        .collect()
}

impl ImageBuffer {
    /// Resample to `height x width`
    pub fn resize(&self, height: usize, width: usize) -> ImageBuffer {
        if height == self.height && width == self.width {
            return self.clone();
        }
        if self.height == 0 || self.width == 0 || height == 0 || width == 0 {
            return ImageBuffer::filled(height, width, self.quantity, self.space, 0.0);
        }

        let c = self.channels();

        // Horizontal pass: (src_h x dst_w)
        let taps_x = compute_taps(self.width, width);
        let mut tmp = vec![0.0f32; self.height * width * c];
        for y in 0..self.height {
            let row = &self.data[y * self.width * c..(y + 1) * self.width * c];
            for (x, t) in taps_x.iter().enumerate() {
                let out = &mut tmp[(y * width + x) * c..(y * width + x + 1) * c];
                for (k, &w) in t.weights.iter().enumerate() {
                    let src = (t.start + k) * c;
                    for ch in 0..c {
                        out[ch] += row[src + ch] * w;
                    }
                }
            }
        }

        // Vertical pass: (dst_h x dst_w)
        let taps_y = compute_taps(self.height, height);
        let mut data = vec![0.0f32; height * width * c];
        for (y, t) in taps_y.iter().enumerate() {
            for (k, &w) in t.weights.iter().enumerate() {
                let src_row = &tmp[(t.start + k) * width * c..(t.start + k + 1) * width * c];
                let dst_row = &mut data[y * width * c..(y + 1) * width * c];
                for (d, s) in dst_row.iter_mut().zip(src_row) {
                    *d += s * w;
                }
            }
        }

        ImageBuffer { height, width, quantity: self.quantity, space: self.space, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ColorSpace, Quantity};

    #[test]
    fn fit_max_edge_preserves_aspect() {
        assert_eq!(fit_max_edge(200, 400, 100), (50, 100));
        assert_eq!(fit_max_edge(400, 200, 100), (100, 50));
        assert_eq!(fit_max_edge(683, 1024, 512), (341, 512));
        assert_eq!(fit_max_edge(1, 1000, 10), (1, 10));
    }

    #[test]
    fn constant_image_stays_constant() {
        let img = ImageBuffer::filled(37, 53, Quantity::Normals, ColorSpace::Linear, -0.25);
        for (h, w) in [(10, 14), (80, 120), (37, 9)] {
            let out = img.resize(h, w);
            assert_eq!((out.height(), out.width(), out.channels()), (h, w, 3));
            assert!(out.data().iter().all(|v| (v + 0.25).abs() < 1e-5));
        }
    }

    #[test]
    fn downscale_averages_instead_of_sampling() {
        // Alternating columns: point sampling would return 0 or 1, a
        // footprint average lands near the middle.
        let img = ImageBuffer::from_fn(8, 64, Quantity::Mask, ColorSpace::Linear, |_, c, _| {
            (c % 2) as f32
        });
        let out = img.resize(8, 8);
        for &v in out.data() {
            assert!((v - 0.5).abs() < 0.1, "got {v}");
        }
    }

    #[test]
    fn same_size_is_identity() {
        let img = ImageBuffer::from_fn(5, 7, Quantity::Depth, ColorSpace::Linear, |r, c, _| {
            (r * 7 + c) as f32
        });
        assert_eq!(img.resize(5, 7), img);
    }
}
