//! `DETECT_MOMENTS`: ask the language model for ranked highlights.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use vatom_llm::TextGenerator;
use vatom_models::{HighlightCandidate, TranscriptSegment, VideoId};

use super::transcript::finite_number;
use super::StageContext;
use crate::error::{WorkerError, WorkerResult};

pub const MIN_HIGHLIGHTS: usize = 3;
pub const MAX_HIGHLIGHTS: usize = 5;

const SYSTEM_PROMPT: &str = "You are an assistant that selects highlight moments from a transcript. \
Return only strict JSON with no extra commentary. \
Avoid intro/outro when possible and pick meaningful topic changes.";

const RESPONSE_SHAPE: &str =
    r#"{ "moments": [ { "start_ms": number, "end_ms": number, "title": string } ] }"#;

/// Shape the model must answer with.
#[derive(Debug, Deserialize, JsonSchema)]
#[allow(dead_code)]
struct MomentsResponse {
    moments: Vec<HighlightCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectReport {
    /// Valid candidates returned by the model
    pub candidates: usize,
    /// Highlight rows written
    pub highlights: usize,
    /// Whether the corrective round-trip was needed
    pub repaired: bool,
}

/// Detect highlights for a video from its stored transcript.
pub async fn detect_moments(ctx: &StageContext, video_id: &VideoId) -> WorkerResult<DetectReport> {
    let segments = ctx.transcripts.list(video_id).await?;
    if segments.is_empty() {
        return Err(WorkerError::NoTranscript(video_id.clone()));
    }

    let transcript = render_transcript(&segments);
    let (candidates, repaired) = request_highlights(ctx.generator.as_ref(), &transcript).await?;
    let written = ctx.highlights.save_detected(video_id, &candidates).await?;

    info!(
        video_id = %video_id,
        candidates = candidates.len(),
        highlights = written,
        repaired,
        "Detected highlights"
    );

    Ok(DetectReport {
        candidates: candidates.len(),
        highlights: written,
        repaired,
    })
}

/// One `[start-end] text` line per segment.
pub fn render_transcript(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(TranscriptSegment::to_prompt_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Query the model, with exactly one repair round-trip on an unusable answer.
///
/// Returns the validated candidates and whether the repair pass was used.
pub async fn request_highlights(
    generator: &dyn TextGenerator,
    transcript: &str,
) -> WorkerResult<(Vec<HighlightCandidate>, bool)> {
    let first = generator
        .generate_json(&detection_prompt(transcript), Some(SYSTEM_PROMPT))
        .await?;

    match parse_response(&first).and_then(|value| validate_highlights(&value)) {
        Ok(candidates) => Ok((candidates, false)),
        Err(e) => {
            warn!(error = %e, "Highlight response rejected, requesting a corrected answer");
            let second = generator
                .generate_json(&repair_prompt(&first), Some(SYSTEM_PROMPT))
                .await?;
            let candidates = parse_response(&second).and_then(|value| validate_highlights(&value))?;
            Ok((candidates, true))
        }
    }
}

fn detection_prompt(transcript: &str) -> String {
    [
        "Given the transcript below, select 3 to 5 highlight-worthy moments.",
        "Avoid intro/outro when possible. Aim for 20-60 second clips.",
        "Return STRICT JSON only in this schema:",
        RESPONSE_SHAPE,
        "Transcript:",
        transcript,
    ]
    .join("\n")
}

fn repair_prompt(previous: &str) -> String {
    let schema = serde_json::to_string_pretty(&schemars::schema_for!(MomentsResponse))
        .unwrap_or_default();
    [
        "Fix the JSON to match this schema exactly:",
        RESPONSE_SHAPE,
        "JSON Schema:",
        schema.as_str(),
        "Return ONLY valid JSON.",
        "Here is the previous response:",
        previous,
    ]
    .join("\n")
}

/// Extract a JSON value from model output.
///
/// Accepts bare JSON, a fenced code block, or JSON surrounded by prose
/// (the span from the first `{` to the last `}`).
pub fn parse_response(text: &str) -> WorkerResult<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let unfenced = strip_code_fence(trimmed);
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) else {
        return Err(WorkerError::invalid_highlights("no JSON object found in response"));
    };
    if end <= start {
        return Err(WorkerError::invalid_highlights("no JSON object found in response"));
    }

    serde_json::from_str(&unfenced[start..=end])
        .map_err(|e| WorkerError::invalid_highlights(format!("malformed JSON: {}", e)))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Validate a `{ "moments": [...] }` value into sorted candidates.
pub fn validate_highlights(value: &Value) -> WorkerResult<Vec<HighlightCandidate>> {
    let moments = value
        .get("moments")
        .and_then(Value::as_array)
        .ok_or_else(|| WorkerError::invalid_highlights("response must include a moments array"))?;

    if !(MIN_HIGHLIGHTS..=MAX_HIGHLIGHTS).contains(&moments.len()) {
        return Err(WorkerError::invalid_highlights(format!(
            "expected {} to {} moments, got {}",
            MIN_HIGHLIGHTS,
            MAX_HIGHLIGHTS,
            moments.len()
        )));
    }

    let mut candidates = moments
        .iter()
        .enumerate()
        .map(|(index, moment)| validate_moment(index, moment))
        .collect::<WorkerResult<Vec<_>>>()?;

    candidates.sort_by_key(|c| c.start_ms);
    Ok(candidates)
}

fn validate_moment(index: usize, moment: &Value) -> WorkerResult<HighlightCandidate> {
    let invalid = |problem: &str| {
        WorkerError::invalid_highlights(format!("moment {} has invalid {}", index, problem))
    };

    if !moment.is_object() {
        return Err(WorkerError::invalid_highlights(format!(
            "moment {} is not an object",
            index
        )));
    }

    let start = finite_number(moment.get("start_ms"))
        .filter(|n| *n >= 0.0)
        .ok_or_else(|| invalid("start_ms"))?;
    let end = finite_number(moment.get("end_ms"))
        .filter(|n| *n > start)
        .ok_or_else(|| invalid("end_ms"))?;
    let title = moment
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| invalid("title"))?;

    let start_ms = start.floor() as i64;
    let end_ms = end.floor() as i64;
    if end_ms <= start_ms {
        return Err(invalid("end_ms"));
    }

    Ok(HighlightCandidate::new(start_ms, end_ms, title))
}
