use ndarray::Array4;

pub mod image_inference;

/// Result of running the image encoder once. The decoder can be prompted
/// against it any number of times.
pub struct SamEncoderOutput {
    pub(super) embeddings: Array4<f32>,
    /// `(width, height)` of the slice that was encoded.
    pub(super) origin_size: (usize, usize),
}

impl SamEncoderOutput {
    pub fn origin_size(&self) -> (usize, usize) {
        self.origin_size
    }
}
