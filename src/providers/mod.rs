//! Inference provider implementations

pub mod huggingface;

pub use huggingface::HuggingFaceClient;
