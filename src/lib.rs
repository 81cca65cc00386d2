//! Football tactical advice from a hosted Llama 3 model.
//!
//! One pass: load `HF_API_KEY`, bind a text-generation pipeline to
//! the model, ask a fixed two-turn question, print the answer.

pub mod error;
pub mod config;
pub mod providers;
pub mod request;
pub mod tokenizer;
pub mod client;
pub mod tactical;

pub use client::{
  pipeline, DeviceMap, ModelKwargs, Task, TextGenerationPipeline,
  TextGenerator, TorchDtype
};
pub use config::{EndpointConfig, HuggingFaceConfig};
pub use error::Error;
pub use request::{ChatMessage, GenerationOutput, GenerationParams, Role};
pub use tokenizer::Tokenizer;
