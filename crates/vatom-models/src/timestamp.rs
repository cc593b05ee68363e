//! Millisecond timestamp formatting.

/// Format milliseconds as `HH:MM:SS.mmm`, the form FFmpeg accepts for `-ss`/`-to`.
///
/// Negative input clamps to zero.
///
/// # Examples
/// ```
/// use vatom_models::timestamp::ms_to_timestamp;
/// assert_eq!(ms_to_timestamp(61_500), "00:01:01.500");
/// assert_eq!(ms_to_timestamp(3_600_000), "01:00:00.000");
/// ```
pub fn ms_to_timestamp(ms: i64) -> String {
    let total_ms = ms.max(0);
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}
