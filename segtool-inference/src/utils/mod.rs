use ndarray::Array2;
use rayon::prelude::*;

pub mod graph;

/// Bilinear resize. Used both to bring slices up to the encoder's input
/// resolution and to bring low-res mask logits back to slice size.
pub fn linear_interpolate(input: Array2<f32>, new_shape: (usize, usize)) -> Array2<f32> {
    let (old_height, old_width) = input.dim();
    let (new_height, new_width) = new_shape;
    if old_height == 0 || old_width == 0 || new_height == 0 || new_width == 0 {
        return Array2::zeros(new_shape);
    }
    if (old_height, old_width) == new_shape {
        return input;
    }

    let mut data = vec![0f32; new_height * new_width];
    data.par_chunks_mut(new_width)
        .enumerate()
        .for_each(|(i, row)| {
            let y = (i as f32) / (new_height as f32) * (old_height as f32 - 1.0);
            let y0 = y.floor() as usize;
            let y1 = y.ceil() as usize;
            let dy = y - y0 as f32;

            for (j, out) in row.iter_mut().enumerate() {
                let x = (j as f32) / (new_width as f32) * (old_width as f32 - 1.0);
                let x0 = x.floor() as usize;
                let x1 = x.ceil() as usize;
                let dx = x - x0 as f32;

                let p00 = input[[y0, x0]];
                let p01 = input[[y0, x1]];
                let p10 = input[[y1, x0]];
                let p11 = input[[y1, x1]];

                *out = p00 * (1.0 - dx) * (1.0 - dy)
                    + p01 * dx * (1.0 - dy)
                    + p10 * (1.0 - dx) * dy
                    + p11 * dx * dy;
            }
        });

    Array2::from_shape_vec((new_height, new_width), data).expect("sized above")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn identity_resize_is_passthrough() {
        let input = array![[1f32, 2.0], [3.0, 4.0]];
        let out = linear_interpolate(input.clone(), (2, 2));
        assert_eq!(out, input);
    }

    #[test]
    fn upscale_interpolates_between_samples() {
        let input = array![[0f32, 1.0]];
        let out = linear_interpolate(input, (1, 4));
        assert_eq!(out[[0, 0]], 0.0);
        assert!(out[[0, 1]] > 0.0 && out[[0, 1]] < out[[0, 2]]);
        assert!(out[[0, 3]] < 1.0); // endpoint maps short of the last sample
    }

    #[test]
    fn constant_field_stays_constant() {
        let input = Array2::from_elem((3, 5), 7.5f32);
        let out = linear_interpolate(input, (9, 11));
        assert!(out.iter().all(|&v| (v - 7.5).abs() < 1e-6));
    }

    #[test]
    fn empty_target_yields_zeros() {
        let input = array![[1f32]];
        let out = linear_interpolate(input, (0, 4));
        assert_eq!(out.dim(), (0, 4));
    }
}
