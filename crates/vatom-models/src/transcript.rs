//! Timed transcript segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One line of timed transcript text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start_ms: i64, end_ms: i64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Render as a `[start-end] text` line for prompting.
    pub fn to_prompt_line(&self) -> String {
        format!("[{}-{}] {}", self.start_ms, self.end_ms, self.text)
    }
}
