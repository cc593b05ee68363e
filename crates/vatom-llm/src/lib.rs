//! Generative text collaborator.
//!
//! [`TextGenerator`] is the seam the detection stage talks to;
//! [`OllamaClient`] implements it against an Ollama-compatible chat API.

pub mod error;
pub mod generator;
pub mod ollama;

pub use error::{LlmError, LlmResult};
pub use generator::TextGenerator;
pub use ollama::{OllamaClient, OllamaConfig};
