//! Transcoding collaborator used by the render stage.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::clip::{extract_clip_command, vertical_command};
use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};

/// Produces the two derived files of a highlight.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Cut `[start_ms, end_ms)` of `input` into `output`.
    async fn extract_clip(
        &self,
        input: &Path,
        start_ms: i64,
        end_ms: i64,
        output: &Path,
    ) -> MediaResult<()>;

    /// Reframe `input` to vertical 9:16 into `output`.
    async fn make_vertical(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// [`Transcoder`] backed by the FFmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
}

impl FfmpegTranscoder {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

async fn prepare_output(input: &Path, output: &Path) -> MediaResult<()> {
    if !tokio::fs::try_exists(input).await? {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_clip(
        &self,
        input: &Path,
        start_ms: i64,
        end_ms: i64,
        output: &Path,
    ) -> MediaResult<()> {
        if start_ms < 0 || end_ms <= start_ms {
            return Err(MediaError::InvalidRange { start_ms, end_ms });
        }
        prepare_output(input, output).await?;

        self.runner
            .run(&extract_clip_command(input, start_ms, end_ms, output))
            .await?;

        info!(output = %output.display(), start_ms, end_ms, "Extracted clip");
        Ok(())
    }

    async fn make_vertical(&self, input: &Path, output: &Path) -> MediaResult<()> {
        prepare_output(input, output).await?;

        self.runner.run(&vertical_command(input, output)).await?;

        info!(output = %output.display(), "Rendered vertical clip");
        Ok(())
    }
}
