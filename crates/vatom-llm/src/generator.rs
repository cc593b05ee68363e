//! Text generation trait.

use async_trait::async_trait;

use crate::error::LlmResult;

/// Produces model output constrained to JSON.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` (with an optional system prompt) and return the trimmed
    /// response text. The text is expected, not guaranteed, to be JSON.
    async fn generate_json(&self, prompt: &str, system: Option<&str>) -> LlmResult<String>;
}
