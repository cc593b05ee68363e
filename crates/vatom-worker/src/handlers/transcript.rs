//! Transcript document parsing.
//!
//! A transcript is a JSON array of `{ "start_ms", "end_ms", "text" }`
//! objects. Times may be fractional and are floored to whole milliseconds.

use serde_json::Value;
use vatom_models::TranscriptSegment;

use crate::error::{WorkerError, WorkerResult};

/// Parse and validate a transcript document.
///
/// Returns segments sorted by start time. Overlapping segments are rejected;
/// touching segments (`end == next start`) are fine.
pub fn parse_transcript(raw: &str) -> WorkerResult<Vec<TranscriptSegment>> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| WorkerError::invalid_transcript(format!("not valid JSON: {}", e)))?;

    let Value::Array(items) = value else {
        return Err(WorkerError::invalid_transcript(
            "transcript JSON must be an array",
        ));
    };

    let mut segments = items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_segment(index, item))
        .collect::<WorkerResult<Vec<_>>>()?;

    segments.sort_by_key(|s| s.start_ms);

    for pair in segments.windows(2) {
        if pair[1].start_ms < pair[0].end_ms {
            return Err(WorkerError::invalid_transcript(format!(
                "segments overlap at {}ms..{}ms and {}ms..{}ms",
                pair[0].start_ms, pair[0].end_ms, pair[1].start_ms, pair[1].end_ms
            )));
        }
    }

    Ok(segments)
}

fn parse_segment(index: usize, item: &Value) -> WorkerResult<TranscriptSegment> {
    let Value::Object(fields) = item else {
        return Err(WorkerError::invalid_transcript(format!(
            "segment {} is not an object",
            index
        )));
    };

    let start = finite_number(fields.get("start_ms"))
        .ok_or_else(|| invalid(index, "has invalid start_ms"))?;
    let end = finite_number(fields.get("end_ms"))
        .ok_or_else(|| invalid(index, "has invalid end_ms"))?;
    let text = fields
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(index, "has invalid text"))?
        .trim();

    if text.is_empty() {
        return Err(invalid(index, "has empty text"));
    }
    if start < 0.0 {
        return Err(invalid(index, "has negative start_ms"));
    }

    let start_ms = start.floor() as i64;
    let end_ms = end.floor() as i64;
    if end_ms <= start_ms {
        return Err(invalid(index, "end_ms must be > start_ms"));
    }

    Ok(TranscriptSegment::new(start_ms, end_ms, text))
}

/// A JSON number that fits a finite `f64`.
pub(crate) fn finite_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn invalid(index: usize, problem: &str) -> WorkerError {
    WorkerError::invalid_transcript(format!("segment {} {}", index, problem))
}
