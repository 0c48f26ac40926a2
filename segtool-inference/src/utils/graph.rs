use ndarray::{Array2, Array3};
use num::Num;

/// Side length of the square input space the prompt encoder works in.
pub const PROMPT_SPACE: f32 = 1024.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point<T: Num> {
    pub x: T,
    pub y: T,
}

/// Axis-aligned box in pixel coordinates, corners inclusive.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PromptBox<T: Num> {
    pub x0: T,
    pub y0: T,
    pub x1: T,
    pub y1: T,
}

impl PromptBox<f32> {
    pub fn from_xyxy(xyxy: [i64; 4]) -> Self {
        PromptBox {
            x0: xyxy[0] as f32,
            y0: xyxy[1] as f32,
            x1: xyxy[2] as f32,
            y1: xyxy[3] as f32,
        }
    }
}

#[derive(Clone, Debug)]
pub enum SamPrompt<T: Num> {
    Box(PromptBox<T>),
    Point(Point<T>),
    Both(Point<T>, PromptBox<T>),
}

/// Map prompt geometry from image pixels into the model's prompt space.
///
/// Returns the `(1, N, 2)` coordinate tensor and the `(1, N)` label
/// tensor the decoder expects. Box corners carry the top-left/bottom-right
/// labels (2/3); a bare point carries label 1 plus the `[0, 0]`/-1 padding
/// pair the prompt encoder requires when no box is present.
pub fn embed_coords(
    prompt: &SamPrompt<f32>,
    image_size: (usize, usize),
) -> (Array3<f32>, Array2<f32>) {
    let (width, height) = image_size;
    let sx = PROMPT_SPACE / width.max(1) as f32;
    let sy = PROMPT_SPACE / height.max(1) as f32;

    let (coords, labels): (Vec<[f32; 2]>, Vec<f32>) = match prompt {
        SamPrompt::Box(b) => (
            vec![[b.x0 * sx, b.y0 * sy], [b.x1 * sx, b.y1 * sy]],
            vec![2.0, 3.0],
        ),
        SamPrompt::Point(p) => (vec![[p.x * sx, p.y * sy], [0.0, 0.0]], vec![1.0, -1.0]),
        SamPrompt::Both(p, b) => (
            vec![
                [p.x * sx, p.y * sy],
                [b.x0 * sx, b.y0 * sy],
                [b.x1 * sx, b.y1 * sy],
            ],
            vec![1.0, 2.0, 3.0],
        ),
    };

    let n = labels.len();
    let mut coord_tensor = Array3::<f32>::zeros((1, n, 2));
    for (i, [x, y]) in coords.into_iter().enumerate() {
        coord_tensor[[0, i, 0]] = x;
        coord_tensor[[0, i, 1]] = y;
    }
    let label_tensor =
        Array2::from_shape_vec((1, n), labels).expect("label count matches coords");

    (coord_tensor, label_tensor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_corners_scale_into_prompt_space() {
        let prompt = SamPrompt::Box(PromptBox::from_xyxy([0, 0, 256, 128]));
        let (coords, labels) = embed_coords(&prompt, (512, 256));

        assert_eq!(coords.dim(), (1, 2, 2));
        assert_eq!(coords[[0, 0, 0]], 0.0);
        assert_eq!(coords[[0, 1, 0]], 512.0); // 256 / 512 * 1024
        assert_eq!(coords[[0, 1, 1]], 512.0); // 128 / 256 * 1024
        assert_eq!(labels[[0, 0]], 2.0);
        assert_eq!(labels[[0, 1]], 3.0);
    }

    #[test]
    fn bare_point_gets_padding_pair() {
        let prompt = SamPrompt::Point(Point { x: 10.0, y: 10.0 });
        let (coords, labels) = embed_coords(&prompt, (1024, 1024));

        assert_eq!(coords.dim(), (1, 2, 2));
        assert_eq!(coords[[0, 0, 0]], 10.0);
        assert_eq!(labels[[0, 0]], 1.0);
        assert_eq!(labels[[0, 1]], -1.0);
    }

    #[test]
    fn combined_prompt_orders_point_first() {
        let prompt = SamPrompt::Both(
            Point { x: 1.0, y: 1.0 },
            PromptBox::from_xyxy([0, 0, 2, 2]),
        );
        let (coords, labels) = embed_coords(&prompt, (1024, 1024));
        assert_eq!(coords.dim(), (1, 3, 2));
        assert_eq!(labels[[0, 0]], 1.0);
        assert_eq!(labels[[0, 2]], 3.0);
    }
}
