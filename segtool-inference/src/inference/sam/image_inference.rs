use std::cmp::Ordering;
use std::path::Path;

use anyhow::{ensure, Result};
use bitvec::vec::BitVec;
use log::info;
use ndarray::{array, s, Array2, Array4, Ix4};
use ort::inputs;
use ort::value::{Tensor, TensorRef};
use parking_lot::Mutex;

use crate::engine::inference_engine::{ExecutionProvider, OnnxSession};
use crate::inference::sam::SamEncoderOutput;
use crate::utils::graph::{embed_coords, SamPrompt};
use crate::utils::linear_interpolate;

/// Encoder input resolution.
const INPUT_SIZE: usize = 1024;
/// Grid the decoder emits mask logits on.
const LOW_RES: usize = 256;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

pub trait SamImageInference {
    /// Run the image encoder over a packed RGB slice of the given
    /// `(width, height)`. The result can be decoded against repeatedly.
    fn encode_image(&self, rgb: &[u8], size: (usize, usize)) -> Result<SamEncoderOutput>;

    /// Decode one prompt against an encoded slice into a boolean mask,
    /// one bit per pixel in row-major slice order.
    fn inference_frame(
        &self,
        prompt: SamPrompt<f32>,
        encoded: &SamEncoderOutput,
    ) -> Result<BitVec>;
}

pub struct SamImageSession {
    image_encoder: Mutex<OnnxSession>,
    image_decoder: Mutex<OnnxSession>,
}

impl SamImageSession {
    /// Load `image_encoder.onnx` and `image_decoder.onnx` from a model
    /// directory. Missing files fail here, not at first use.
    pub fn new(folder_path: impl AsRef<Path>, executor: ExecutionProvider) -> Result<Self> {
        let image_encoder = OnnxSession::new(
            folder_path.as_ref().join("image_encoder.onnx"),
            executor,
        )?;
        let image_decoder = OnnxSession::new(
            folder_path.as_ref().join("image_decoder.onnx"),
            executor,
        )?;
        info!("SAM image session ready ({})", executor.describe());

        Ok(Self {
            image_encoder: Mutex::new(image_encoder),
            image_decoder: Mutex::new(image_decoder),
        })
    }

    pub fn executor(&self) -> ExecutionProvider {
        self.image_encoder.lock().executor()
    }
}

impl SamImageInference for SamImageSession {
    fn encode_image(&self, rgb: &[u8], size: (usize, usize)) -> Result<SamEncoderOutput> {
        let tensor = prepare_input(rgb, size)?;

        let mut encoder = self.image_encoder.lock();
        let outputs = encoder.run(inputs!["input_image" => Tensor::from_array(tensor)?])?;
        let embeddings = outputs["image_embeddings"]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?
            .to_owned();

        Ok(SamEncoderOutput {
            embeddings,
            origin_size: size,
        })
    }

    fn inference_frame(
        &self,
        prompt: SamPrompt<f32>,
        encoded: &SamEncoderOutput,
    ) -> Result<BitVec> {
        let (point_coords, point_labels) = embed_coords(&prompt, encoded.origin_size);
        let mask_input = Array4::<f32>::zeros((1, 1, LOW_RES, LOW_RES));

        let low_res = {
            let mut decoder = self.image_decoder.lock();
            let outputs = decoder.run(inputs![
                "image_embeddings" => TensorRef::from_array_view(encoded.embeddings.view())?,

                "point_coords"    => Tensor::from_array(point_coords)?,
                "point_labels"    => Tensor::from_array(point_labels)?,
                "mask_input"      => Tensor::from_array(mask_input)?,
                "has_mask_input"  => Tensor::from_array(array![0f32])?,

                "orig_im_size"    => Tensor::from_array(array![LOW_RES as i64, LOW_RES as i64])?,
            ])?;

            let masks = outputs["masks"]
                .try_extract_array::<f32>()?
                .into_dimensionality::<Ix4>()?;
            let iou_predictions = outputs["iou_predictions"].try_extract_array::<f32>()?;
            let best = iou_predictions
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
                .map(|(index, _)| index)
                .unwrap_or(0);
            masks.slice(s![0, best, .., ..]).to_owned()
        };

        let (width, height) = encoded.origin_size;
        info!(
            "resizing mask from {:?} to {}x{}",
            low_res.dim(),
            height,
            width
        );
        let sized = linear_interpolate(low_res, (height, width));

        let mut mask = BitVec::with_capacity(sized.len());
        sized.iter().for_each(|&logit| {
            mask.push(logit > 0f32);
        });
        Ok(mask)
    }
}

/// Resize a packed RGB slice to the encoder resolution and normalize
/// with the ImageNet statistics the model was trained with.
fn prepare_input(rgb: &[u8], (width, height): (usize, usize)) -> Result<Array4<f32>> {
    ensure!(
        rgb.len() == width * height * 3,
        "rgb buffer of {} bytes does not match {}x{}",
        rgb.len(),
        width,
        height
    );

    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for channel in 0..3 {
        let plane = Array2::from_shape_fn((height, width), |(y, x)| {
            rgb[(y * width + x) * 3 + channel] as f32 / 255.0
        });
        let plane = linear_interpolate(plane, (INPUT_SIZE, INPUT_SIZE));
        let plane = plane.mapv(|v| (v - MEAN[channel]) / STD[channel]);
        tensor.slice_mut(s![0, channel, .., ..]).assign(&plane);
    }
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_input_normalizes_each_channel() {
        // mid-gray everywhere: value 128/255 minus channel mean over std
        let rgb = vec![128u8; 4 * 4 * 3];
        let tensor = prepare_input(&rgb, (4, 4)).unwrap();
        assert_eq!(tensor.dim(), (1, 3, INPUT_SIZE, INPUT_SIZE));
        for channel in 0..3 {
            let expected = (128.0 / 255.0 - MEAN[channel]) / STD[channel];
            let got = tensor[[0, channel, 0, 0]];
            assert!((got - expected).abs() < 1e-5, "channel {channel}");
        }
    }

    #[test]
    fn prepare_input_rejects_short_buffer() {
        assert!(prepare_input(&[0u8; 10], (4, 4)).is_err());
    }

    #[test]
    fn missing_model_directory_fails_at_load() {
        let result = SamImageSession::new("nonexistent_dir", ExecutionProvider::Cpu);
        assert!(result.is_err());
    }
}
