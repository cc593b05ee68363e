//! Repositories for pipeline records.

pub mod clip;
pub mod highlight;
pub mod transcript;
pub mod video;

pub use clip::ClipAssetRepository;
pub use highlight::HighlightRepository;
pub use transcript::TranscriptRepository;
pub use video::VideoRepository;
