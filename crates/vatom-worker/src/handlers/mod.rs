//! Stage handlers.
//!
//! Each handler does the work of one [`JobType`](vatom_models::JobType) for
//! one video and returns a small report. Handlers only touch the pipeline
//! records of their video; queue transitions belong to the dispatcher.

pub mod detect;
pub mod ingest;
pub mod render;
pub mod transcript;

use std::path::PathBuf;
use std::sync::Arc;

use vatom_db::{
    ClipAssetRepository, DbPool, HighlightRepository, TranscriptRepository, VideoRepository,
};
use vatom_llm::TextGenerator;
use vatom_media::Transcoder;
use vatom_storage::SourceResolver;

pub use detect::DetectReport;
pub use ingest::IngestReport;
pub use render::RenderReport;

/// Collaborators and repositories shared by all stage handlers.
#[derive(Clone)]
pub struct StageContext {
    pub videos: VideoRepository,
    pub transcripts: TranscriptRepository,
    pub highlights: HighlightRepository,
    pub clips: ClipAssetRepository,
    pub resolver: SourceResolver,
    pub generator: Arc<dyn TextGenerator>,
    pub transcoder: Arc<dyn Transcoder>,
    /// Root of `<output_dir>/<video_id>/<rank>_<orientation>.mp4`
    pub output_dir: PathBuf,
}

impl StageContext {
    pub fn new(
        pool: DbPool,
        resolver: SourceResolver,
        generator: Arc<dyn TextGenerator>,
        transcoder: Arc<dyn Transcoder>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            videos: VideoRepository::new(pool.clone()),
            transcripts: TranscriptRepository::new(pool.clone()),
            highlights: HighlightRepository::new(pool.clone()),
            clips: ClipAssetRepository::new(pool),
            resolver,
            generator,
            transcoder,
            output_dir: output_dir.into(),
        }
    }
}
