//! ONNX Runtime plumbing for the Segment-Anything encoder/decoder pair.

pub mod engine;
pub mod inference;
pub mod utils;
