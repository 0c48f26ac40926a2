use hashbrown::HashMap;
use log::warn;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

/// Window a float slice into `u8` using the 1st/99th percentiles, falling
/// back to min/max and finally to all-zero when the data is degenerate.
pub fn normalize_to_u8(slice: ArrayView2<'_, f32>) -> Array2<u8> {
    let mut finite: Vec<f32> = slice.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Array2::zeros(slice.raw_dim());
    }
    finite.sort_unstable_by(f32::total_cmp);

    let percentile = |q: f64| {
        let pos = (finite.len() - 1) as f64 * q;
        finite[pos.round() as usize]
    };
    let mut vmin = percentile(0.01);
    let mut vmax = percentile(0.99);
    if vmax <= vmin {
        vmin = finite[0];
        vmax = finite[finite.len() - 1];
        if vmax <= vmin {
            return Array2::zeros(slice.raw_dim());
        }
    }

    let span = vmax - vmin;
    slice.mapv(|v| {
        if !v.is_finite() {
            return 0;
        }
        let t = ((v - vmin) / span).clamp(0.0, 1.0);
        (t * 255.0) as u8
    })
}

/// Blend the label mask over a grayscale base, returning a packed RGB
/// buffer (`H * W * 3`). Label 0 passes the base through untouched.
/// Rows blend in parallel.
pub fn compose_overlay(
    base: &Array2<u8>,
    mask: Option<&Array2<u8>>,
    colors: &HashMap<u8, (u8, u8, u8)>,
    alpha: f32,
) -> Vec<u8> {
    let (h, w) = base.dim();
    let mask = match mask {
        Some(m) if m.dim() != base.dim() => {
            warn!(
                "overlay mask shape {:?} does not match base {:?}; skipping overlay",
                m.dim(),
                base.dim()
            );
            None
        }
        other => other,
    };

    let mut out = vec![0u8; h * w * 3];
    out.par_chunks_mut(w * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w {
                let gray = base[[y, x]];
                let mut pixel = [gray, gray, gray];
                if let Some(mask) = mask {
                    let value = mask[[y, x]];
                    if value != 0 {
                        if let Some(&(r, g, b)) = colors.get(&value) {
                            pixel = [
                                blend(gray, r, alpha),
                                blend(gray, g, alpha),
                                blend(gray, b, alpha),
                            ];
                        }
                    }
                }
                row[x * 3..x * 3 + 3].copy_from_slice(&pixel);
            }
        });
    out
}

fn blend(base: u8, color: u8, alpha: f32) -> u8 {
    (base as f32 * (1.0 - alpha) + color as f32 * alpha).clamp(0.0, 255.0) as u8
}

/// Replicate a grayscale slice into the packed RGB layout the model input
/// expects.
pub fn gray_to_rgb(gray: &Array2<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(gray.len() * 3);
    for &g in gray.iter() {
        out.extend_from_slice(&[g, g, g]);
    }
    out
}
