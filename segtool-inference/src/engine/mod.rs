pub mod inference_engine;
