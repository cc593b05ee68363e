//! Highlight (moment) models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::VideoId;

/// A validated highlight proposed by the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HighlightCandidate {
    pub start_ms: i64,
    pub end_ms: i64,
    pub title: String,
}

impl HighlightCandidate {
    pub fn new(start_ms: i64, end_ms: i64, title: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            title: title.into(),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// A persisted, ranked highlight of a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Highlight {
    pub id: String,

    pub video_id: VideoId,

    /// 1-indexed position in start order
    pub rank: u32,

    pub start_ms: i64,

    pub end_ms: i64,

    pub title: String,

    pub created_at: DateTime<Utc>,
}
