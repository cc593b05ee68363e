//! Rendered clip asset models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};
use crate::VideoId;

/// Frame orientation of a rendered clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Direct sub-clip of the source
    Horizontal,
    /// 9:16 center crop of the horizontal clip
    Vertical,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }

    pub fn parse(s: &str) -> ModelResult<Self> {
        match s {
            "horizontal" => Ok(Orientation::Horizontal),
            "vertical" => Ok(Orientation::Vertical),
            other => Err(ModelError::UnknownOrientation(other.to_string())),
        }
    }

    /// Output filename for a highlight of the given rank.
    pub fn file_name(&self, rank: u32) -> String {
        format!("{}_{}.mp4", rank, self.as_str())
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rendered file for one highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipAsset {
    pub id: String,
    pub video_id: VideoId,
    pub highlight_id: String,
    pub orientation: Orientation,
    pub file_path: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_file_names() {
        assert_eq!(Orientation::Horizontal.file_name(1), "1_horizontal.mp4");
        assert_eq!(Orientation::Vertical.file_name(3), "3_vertical.mp4");
    }

    #[test]
    fn test_orientation_parse() {
        assert_eq!(Orientation::parse("vertical").unwrap(), Orientation::Vertical);
        assert!(Orientation::parse("square").is_err());
    }
}
