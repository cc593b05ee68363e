//! `RENDER_CLIPS`: cut a horizontal and a vertical clip per highlight.

use std::path::Path;

use serde::Serialize;
use tracing::{error, info};
use vatom_models::{Highlight, Orientation, VideoId};

use super::StageContext;
use crate::error::{WorkerError, WorkerResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderReport {
    /// Highlights with both files rendered
    pub rendered: usize,
    /// Clip asset rows written
    pub assets: usize,
    /// Files that failed to render
    pub failed: usize,
    pub had_failures: bool,
}

impl RenderReport {
    /// Files attempted: successes plus failures.
    pub fn attempted(&self) -> usize {
        self.assets + self.failed
    }
}

/// Render every highlight of a video.
///
/// Prior clip assets are cleared first. Per highlight the horizontal clip is
/// cut from the source and the vertical clip is reframed from the horizontal
/// one; a failed horizontal clip skips the vertical step. Individual failures
/// are logged and counted in the report rather than returned.
pub async fn render_clips(ctx: &StageContext, video_id: &VideoId) -> WorkerResult<RenderReport> {
    let video = ctx.videos.require(video_id).await?;
    if video.is_source_pending() {
        return Err(WorkerError::SourcePending(video_id.clone()));
    }

    let highlights = ctx.highlights.list(video_id).await?;
    let source = ctx.resolver.resolve_media(&video.source_path).await?;

    if highlights.is_empty() {
        info!(video_id = %video_id, "No highlights to render");
        return Ok(RenderReport::default());
    }

    let video_dir = ctx.output_dir.join(video_id.as_str());
    tokio::fs::create_dir_all(&video_dir).await?;

    ctx.clips.delete_for_video(video_id).await?;

    let mut report = RenderReport::default();
    for highlight in &highlights {
        render_highlight(ctx, source.path(), &video_dir, highlight, &mut report).await;
    }
    report.had_failures = report.failed > 0;

    info!(
        video_id = %video_id,
        highlights = highlights.len(),
        rendered = report.rendered,
        failed = report.failed,
        "Rendered clips"
    );
    Ok(report)
}

async fn render_highlight(
    ctx: &StageContext,
    source: &Path,
    video_dir: &Path,
    highlight: &Highlight,
    report: &mut RenderReport,
) {
    let horizontal = video_dir.join(Orientation::Horizontal.file_name(highlight.rank));
    let vertical = video_dir.join(Orientation::Vertical.file_name(highlight.rank));

    let result = async {
        ctx.transcoder
            .extract_clip(source, highlight.start_ms, highlight.end_ms, &horizontal)
            .await?;
        ctx.clips
            .insert(highlight, Orientation::Horizontal, &path_string(&horizontal))
            .await?;
        Ok::<_, WorkerError>(())
    }
    .await;

    if let Err(e) = result {
        error!(rank = highlight.rank, error = %e, "Failed to create horizontal clip");
        report.failed += 1;
        return;
    }
    report.assets += 1;

    let result = async {
        ctx.transcoder.make_vertical(&horizontal, &vertical).await?;
        ctx.clips
            .insert(highlight, Orientation::Vertical, &path_string(&vertical))
            .await?;
        Ok::<_, WorkerError>(())
    }
    .await;

    match result {
        Ok(()) => {
            report.assets += 1;
            report.rendered += 1;
        }
        Err(e) => {
            error!(rank = highlight.rank, error = %e, "Failed to create vertical clip");
            report.failed += 1;
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
