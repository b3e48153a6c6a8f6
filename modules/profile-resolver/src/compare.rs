//! Visual similarity between two logo images.
//!
//! Both images are flattened onto white, converted to grayscale and
//! resampled to a fixed square, so the score ignores file format, scale and
//! aspect ratio. The score blends the correlation of raw intensities with the
//! correlation of edge magnitudes; the edge term keeps two logos with the same
//! overall brightness but different shapes apart.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

use crate::error::{ResolverError, Result};

const SIDE: u32 = 48;

/// Images whose intensity spread is below this are treated as flat colour.
const FLAT_STD_DEV: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct LogoFingerprint {
    intensity: Vec<f64>,
    gradient: Vec<f64>,
    mean: f64,
    flat: bool,
}

impl LogoFingerprint {
    /// Decode `bytes` (PNG, JPEG, GIF, ICO, WebP...) into a fingerprint.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ResolverError::DecodeFailure("empty image".to_string()));
        }
        let decoded =
            image::load_from_memory(bytes).map_err(|e| ResolverError::DecodeFailure(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        if rgba.width() == 0 || rgba.height() == 0 {
            return Err(ResolverError::DecodeFailure("zero-sized image".to_string()));
        }

        let gray = GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let [r, g, b, a] = rgba.get_pixel(x, y).0;
            let alpha = a as f64 / 255.0;
            let over_white = |c: u8| c as f64 * alpha + 255.0 * (1.0 - alpha);
            let luma = 0.299 * over_white(r) + 0.587 * over_white(g) + 0.114 * over_white(b);
            Luma([luma.round().clamp(0.0, 255.0) as u8])
        });
        let small = imageops::resize(&gray, SIDE, SIDE, FilterType::Triangle);

        let intensity: Vec<f64> = small.pixels().map(|p| p.0[0] as f64).collect();
        let gradient = edge_magnitudes(&intensity);
        let mean = intensity.iter().sum::<f64>() / intensity.len() as f64;
        let variance =
            intensity.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / intensity.len() as f64;

        Ok(Self {
            intensity,
            gradient,
            mean,
            flat: variance.sqrt() < FLAT_STD_DEV,
        })
    }

    /// Score in [0, 1]; 1 means visually identical. Symmetric in its arguments.
    pub fn similarity(&self, other: &Self) -> f64 {
        let score = match (self.flat, other.flat) {
            (true, true) => 1.0 - (self.mean - other.mean).abs() / 255.0,
            (true, false) | (false, true) => 0.0,
            (false, false) => {
                let rho_intensity = pearson(&self.intensity, &other.intensity).max(0.0);
                let rho_gradient = pearson(&self.gradient, &other.gradient).max(0.0);
                0.5 * rho_intensity + 0.5 * rho_gradient
            }
        };
        score.clamp(0.0, 1.0)
    }
}

/// Compare two encoded images. `None` when either side fails to decode.
pub fn similarity(a: &[u8], b: &[u8]) -> Option<f64> {
    let a = LogoFingerprint::from_bytes(a).ok()?;
    let b = LogoFingerprint::from_bytes(b).ok()?;
    Some(a.similarity(&b))
}

/// Forward-difference |dx| + |dy|, zero past the right and bottom edges.
fn edge_magnitudes(pixels: &[f64]) -> Vec<f64> {
    let side = SIDE as usize;
    let mut out = Vec::with_capacity(pixels.len());
    for y in 0..side {
        for x in 0..side {
            let here = pixels[y * side + x];
            let dx = if x + 1 < side { pixels[y * side + x + 1] - here } else { 0.0 };
            let dy = if y + 1 < side { pixels[(y + 1) * side + x] - here } else { 0.0 };
            out.push(dx.abs() + dy.abs());
        }
    }
    out
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}
