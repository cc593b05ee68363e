//! FFmpeg CLI wrapper for clip rendering.
//!
//! This crate provides:
//! - An FFmpeg command builder and runner that captures stderr on failure
//! - Argument sets for sub-clip extraction and 9:16 vertical reframing
//! - The [`Transcoder`] trait used by the render stage, with an FFmpeg implementation

pub mod clip;
pub mod command;
pub mod error;
pub mod transcoder;

pub use clip::{extract_clip_command, vertical_command, VERTICAL_FILTER};
pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use transcoder::{FfmpegTranscoder, Transcoder};
pub use vatom_models::ms_to_timestamp;
