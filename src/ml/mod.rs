pub mod ml_model;
pub mod inference;

pub use ml_model::{GestureNet, ModelConfig, pixel_buffer_to_input};
pub use inference::{InferenceEngine, export_untrained_model, load_classifier};
