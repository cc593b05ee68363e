//! Clip extraction and vertical reframing arguments.

use std::path::Path;

use vatom_models::ms_to_timestamp;

use crate::command::FfmpegCommand;

/// Center-crop to 9:16 at full height, then scale to 1080x1920.
pub const VERTICAL_FILTER: &str = "crop=ih*9/16:ih:(iw-ih*9/16)/2:0,scale=1080:1920";

const VIDEO_CODEC: &str = "libx264";
const PRESET: &str = "veryfast";
const CRF: u8 = 23;
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "128k";

fn encode(cmd: FfmpegCommand) -> FfmpegCommand {
    cmd.video_codec(VIDEO_CODEC)
        .preset(PRESET)
        .crf(CRF)
        .audio_codec(AUDIO_CODEC)
        .audio_bitrate(AUDIO_BITRATE)
}

/// Re-encode `[start_ms, end_ms)` of `input` into `output`.
pub fn extract_clip_command(
    input: impl AsRef<Path>,
    start_ms: i64,
    end_ms: i64,
    output: impl AsRef<Path>,
) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(input, output)
        .seek(ms_to_timestamp(start_ms))
        .until(ms_to_timestamp(end_ms));
    encode(cmd)
}

/// Reframe a horizontal clip to 1080x1920 portrait.
pub fn vertical_command(input: impl AsRef<Path>, output: impl AsRef<Path>) -> FfmpegCommand {
    encode(FfmpegCommand::new(input, output).video_filter(VERTICAL_FILTER))
}
