//! Repository integration tests against a migrated in-memory database.

use vatom_db::{
    init_memory_pool, ClipAssetRepository, DbError, HighlightRepository, TranscriptRepository,
    VideoRepository,
};
use vatom_models::{HighlightCandidate, Orientation, TranscriptSegment, VideoId, PENDING_SOURCE};

fn candidates(spans: &[(i64, i64, &str)]) -> Vec<HighlightCandidate> {
    spans
        .iter()
        .map(|(start, end, title)| HighlightCandidate::new(*start, *end, *title))
        .collect()
}

#[tokio::test]
async fn test_video_lifecycle() {
    let pool = init_memory_pool().await.unwrap();
    let videos = VideoRepository::new(pool);

    let video = videos.create(PENDING_SOURCE, Some("talk.mp4")).await.unwrap();
    assert!(video.is_source_pending());
    assert!(videos.exists(&video.id).await.unwrap());

    videos.set_source_path(&video.id, "/media/talk.mp4").await.unwrap();
    let stored = videos.require(&video.id).await.unwrap();
    assert_eq!(stored.source_path, "/media/talk.mp4");
    assert_eq!(stored.original_filename.as_deref(), Some("talk.mp4"));

    let missing = VideoId::from_string("missing");
    assert!(videos.get(&missing).await.unwrap().is_none());
    assert!(matches!(
        videos.set_source_path(&missing, "/x.mp4").await,
        Err(DbError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_transcript_replace_is_total() {
    let pool = init_memory_pool().await.unwrap();
    let videos = VideoRepository::new(pool.clone());
    let transcripts = TranscriptRepository::new(pool);

    let video = videos.create("/media/a.mp4", None).await.unwrap();

    let first = vec![
        TranscriptSegment::new(0, 1_000, "hello"),
        TranscriptSegment::new(1_000, 2_000, "world"),
        TranscriptSegment::new(2_000, 3_000, "again"),
    ];
    assert_eq!(transcripts.replace(&video.id, &first).await.unwrap(), 3);

    let second = vec![TranscriptSegment::new(500, 900, "only")];
    assert_eq!(transcripts.replace(&video.id, &second).await.unwrap(), 1);

    let stored = transcripts.list(&video.id).await.unwrap();
    assert_eq!(stored, second);
    assert_eq!(transcripts.count(&video.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_transcript_requires_parent_video() {
    let pool = init_memory_pool().await.unwrap();
    let transcripts = TranscriptRepository::new(pool);

    let result = transcripts
        .replace(
            &VideoId::from_string("ghost"),
            &[TranscriptSegment::new(0, 10, "x")],
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_highlights_created_then_updated_positionally() {
    let pool = init_memory_pool().await.unwrap();
    let videos = VideoRepository::new(pool.clone());
    let highlights = HighlightRepository::new(pool);

    let video = videos.create("/media/a.mp4", None).await.unwrap();

    let written = highlights
        .save_detected(
            &video.id,
            &candidates(&[(0, 20_000, "a"), (30_000, 50_000, "b"), (60_000, 90_000, "c"), (100_000, 130_000, "d")]),
        )
        .await
        .unwrap();
    assert_eq!(written, 4);

    let before = highlights.list(&video.id).await.unwrap();
    assert_eq!(before.iter().map(|h| h.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

    let written = highlights
        .save_detected(
            &video.id,
            &candidates(&[(5_000, 25_000, "x"), (35_000, 55_000, "y"), (65_000, 95_000, "z")]),
        )
        .await
        .unwrap();
    assert_eq!(written, 3);

    let after = highlights.list(&video.id).await.unwrap();
    assert_eq!(after.len(), 4);
    for (old, new) in before.iter().zip(after.iter()) {
        assert_eq!(old.id, new.id);
    }
    assert_eq!(after[0].title, "x");
    assert_eq!(after[2].start_ms, 65_000);
    // Surplus existing highlight is left untouched
    assert_eq!(after[3].title, "d");
    assert_eq!(highlights.count(&video.id).await.unwrap(), 4);
}

#[tokio::test]
async fn test_clip_assets_insert_list_delete() {
    let pool = init_memory_pool().await.unwrap();
    let videos = VideoRepository::new(pool.clone());
    let highlights = HighlightRepository::new(pool.clone());
    let clips = ClipAssetRepository::new(pool);

    let video = videos.create("/media/a.mp4", None).await.unwrap();
    highlights
        .save_detected(&video.id, &candidates(&[(0, 20_000, "a"), (30_000, 50_000, "b"), (60_000, 90_000, "c")]))
        .await
        .unwrap();
    let first = highlights.list(&video.id).await.unwrap().remove(0);

    clips
        .insert(&first, Orientation::Horizontal, "outputs/v/1_horizontal.mp4")
        .await
        .unwrap();
    let vertical = clips
        .insert(&first, Orientation::Vertical, "outputs/v/1_vertical.mp4")
        .await
        .unwrap();
    assert_eq!(vertical.highlight_id, first.id);
    assert_eq!(vertical.start_ms, 0);
    assert_eq!(vertical.end_ms, 20_000);

    let listed = clips.list(&video.id).await.unwrap();
    assert_eq!(
        listed.iter().map(|c| c.orientation).collect::<Vec<_>>(),
        vec![Orientation::Horizontal, Orientation::Vertical]
    );

    assert_eq!(clips.delete_for_video(&video.id).await.unwrap(), 2);
    assert!(clips.list(&video.id).await.unwrap().is_empty());
}
