//! Worker behavior against an in-memory store with scripted collaborators.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;
use vatom_db::{init_memory_pool, ClipAssetRepository, DbPool, VideoRepository};
use vatom_llm::{LlmError, LlmResult, TextGenerator};
use vatom_media::{MediaError, MediaResult, Transcoder};
use vatom_models::{
    IngestPayload, JobSpec, JobStatus, JobType, Orientation, VideoId, PENDING_SOURCE,
};
use vatom_queue::{JobQueue, QueueConfig};
use vatom_storage::SourceResolver;
use vatom_worker::{
    submit_video, BatchStatus, JobExecutor, StageContext, StepOutcome, StepReport, WorkerConfig,
    WorkerError,
};

// ----------------------------------------------------------------------
// Fakes
// ----------------------------------------------------------------------

/// Replays canned responses and records every prompt it receives.
#[derive(Default)]
struct ScriptedGenerator {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate_json(&self, prompt: &str, _system: Option<&str>) -> LlmResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::request_failed("no scripted response left"))
    }
}

/// Writes placeholder files; optionally fails horizontal cuts at given starts.
#[derive(Default)]
struct FakeTranscoder {
    fail_extract_at: Vec<i64>,
    extracted: Mutex<Vec<PathBuf>>,
    verticals: Mutex<Vec<PathBuf>>,
}

impl FakeTranscoder {
    fn failing_at(starts: &[i64]) -> Self {
        Self {
            fail_extract_at: starts.to_vec(),
            ..Default::default()
        }
    }

    fn verticals(&self) -> Vec<PathBuf> {
        self.verticals.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn extract_clip(
        &self,
        _input: &Path,
        start_ms: i64,
        _end_ms: i64,
        output: &Path,
    ) -> MediaResult<()> {
        if self.fail_extract_at.contains(&start_ms) {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with status 1",
                Some("Invalid data found when processing input".to_string()),
                Some(1),
            ));
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, b"horizontal").await?;
        self.extracted.lock().unwrap().push(output.to_path_buf());
        Ok(())
    }

    async fn make_vertical(&self, input: &Path, output: &Path) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        tokio::fs::write(output, b"vertical").await?;
        self.verticals.lock().unwrap().push(output.to_path_buf());
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Harness
// ----------------------------------------------------------------------

struct Harness {
    executor: JobExecutor,
    pool: DbPool,
    generator: Arc<ScriptedGenerator>,
    transcoder: Arc<FakeTranscoder>,
    dir: TempDir,
}

impl Harness {
    async fn new(generator: ScriptedGenerator, transcoder: FakeTranscoder) -> Self {
        Self::with_config(generator, transcoder, |_| {}).await
    }

    async fn with_config(
        generator: ScriptedGenerator,
        transcoder: FakeTranscoder,
        tweak: impl FnOnce(&mut WorkerConfig),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_memory_pool().await.unwrap();
        let generator = Arc::new(generator);
        let transcoder = Arc::new(transcoder);

        let mut config = WorkerConfig {
            output_dir: dir.path().join("outputs"),
            ..WorkerConfig::default()
        };
        tweak(&mut config);

        let stages = StageContext::new(
            pool.clone(),
            SourceResolver::new().unwrap(),
            generator.clone(),
            transcoder.clone(),
            config.output_dir.clone(),
        );
        let queue = JobQueue::new(pool.clone(), QueueConfig::default());

        Self {
            executor: JobExecutor::new(config, queue, stages),
            pool,
            generator,
            transcoder,
            dir,
        }
    }

    fn queue(&self) -> &JobQueue {
        self.executor.queue()
    }

    /// Register a video with a real source file.
    async fn video(&self, id: &str) -> VideoId {
        let source = self.dir.path().join(format!("{}.mp4", id));
        std::fs::write(&source, b"source").unwrap();

        let video_id = VideoId::from(id);
        VideoRepository::new(self.pool.clone())
            .create_with_id(&video_id, source.to_str().unwrap(), Some("talk.mp4"))
            .await
            .unwrap();
        video_id
    }

    /// Write a transcript of `count` back-to-back 30s segments.
    fn transcript(&self, count: usize) -> String {
        let segments: Vec<_> = (0..count)
            .map(|i| {
                let start = i as i64 * 30_000;
                json!({"start_ms": start, "end_ms": start + 30_000, "text": format!("segment {}", i)})
            })
            .collect();
        let path = self.dir.path().join("transcript.json");
        std::fs::write(&path, serde_json::to_string(&segments).unwrap()).unwrap();
        path.to_string_lossy().into_owned()
    }

    /// Run ingest for a video so detection may proceed.
    async fn ingest(&self, video_id: &VideoId) {
        let locator = self.transcript(10);
        self.queue()
            .enqueue(video_id, &JobSpec::ingest(locator))
            .await
            .unwrap();
        let report = self.executor.run_once().await.unwrap().unwrap();
        assert_eq!(report.outcome, StepOutcome::Succeeded);
    }

    async fn clip_count(&self, video_id: &VideoId) -> usize {
        ClipAssetRepository::new(self.pool.clone())
            .list(video_id)
            .await
            .unwrap()
            .len()
    }
}

fn moments_json(starts: &[i64]) -> String {
    let moments: Vec<_> = starts
        .iter()
        .enumerate()
        .map(|(i, start)| {
            json!({"start_ms": start, "end_ms": start + 25_000, "title": format!("Highlight {}", i + 1)})
        })
        .collect();
    json!({ "moments": moments }).to_string()
}

fn valid_moments() -> String {
    moments_json(&[120_000, 0, 60_000])
}

fn millis_until(run_after: chrono::DateTime<Utc>) -> i64 {
    (run_after - Utc::now()).num_milliseconds()
}

fn outcomes(reports: &[StepReport]) -> Vec<(JobType, &'static str)> {
    reports
        .iter()
        .map(|r| (r.job_type, r.outcome.label()))
        .collect()
}

// ----------------------------------------------------------------------
// End to end
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_pipeline_runs_all_three_stages() {
    let h = Harness::new(
        ScriptedGenerator::new([valid_moments()]),
        FakeTranscoder::default(),
    )
    .await;
    let video = h.video("video-1").await;
    let locator = h.transcript(12);

    h.queue().enqueue_pipeline(&video, &locator).await.unwrap();
    let reports = h.executor.run_until_idle().await.unwrap();

    assert_eq!(
        outcomes(&reports),
        vec![
            (JobType::IngestTranscript, "succeeded"),
            (JobType::DetectMoments, "succeeded"),
            (JobType::RenderClips, "succeeded"),
        ]
    );

    let jobs = h.queue().jobs_for_video(&video).await.unwrap();
    assert!(jobs.iter().all(|j| j.status == JobStatus::Succeeded));
    assert!(jobs.iter().all(|j| j.locked_at.is_none() && j.last_error.is_none()));

    let stages = h.executor.stages();
    assert_eq!(stages.transcripts.count(&video).await.unwrap(), 12);

    let highlights = stages.highlights.list(&video).await.unwrap();
    assert_eq!(highlights.len(), 3);
    assert_eq!(
        highlights.iter().map(|m| (m.rank, m.start_ms)).collect::<Vec<_>>(),
        vec![(1, 0), (2, 60_000), (3, 120_000)]
    );

    let clips = stages.clips.list(&video).await.unwrap();
    assert_eq!(clips.len(), 6);
    let video_dir = h.dir.path().join("outputs").join("video-1");
    for rank in 1..=3 {
        assert!(video_dir.join(format!("{}_horizontal.mp4", rank)).exists());
        assert!(video_dir.join(format!("{}_vertical.mp4", rank)).exists());
    }
    assert_eq!(
        clips.iter().filter(|c| c.orientation == Orientation::Vertical).count(),
        3
    );

    let counts = h.queue().counts_by_status().await.unwrap();
    assert_eq!(counts.succeeded, 3);
    assert_eq!(counts.total(), 3);
}

#[tokio::test]
async fn test_poll_loop_drains_queue_and_stops_on_shutdown() {
    let h = Harness::with_config(
        ScriptedGenerator::new([valid_moments()]),
        FakeTranscoder::default(),
        |config| config.poll_interval = Duration::from_millis(10),
    )
    .await;
    let video = h.video("video-1").await;
    let locator = h.transcript(5);
    h.queue().enqueue_pipeline(&video, &locator).await.unwrap();

    let watcher = async {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let counts = h.queue().counts_by_status().await.unwrap();
            if counts.succeeded == 3 || tokio::time::Instant::now() > deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        h.executor.shutdown();
    };

    let (result, ()) = tokio::join!(h.executor.run(), watcher);
    result.unwrap();

    assert_eq!(h.queue().counts_by_status().await.unwrap().succeeded, 3);
}

// ----------------------------------------------------------------------
// Dependency gate
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_detect_before_ingest_is_deferred_without_penalty() {
    let h = Harness::new(
        ScriptedGenerator::new([valid_moments()]),
        FakeTranscoder::default(),
    )
    .await;
    let video = h.video("video-1").await;

    let detect = h
        .queue()
        .enqueue(&video, &JobSpec::DetectMoments)
        .await
        .unwrap();
    let locator = h.transcript(4);
    h.queue()
        .enqueue(&video, &JobSpec::ingest(locator))
        .await
        .unwrap();

    let reports = h.executor.run_until_idle().await.unwrap();
    assert_eq!(
        outcomes(&reports),
        vec![
            (JobType::DetectMoments, "deferred"),
            (JobType::IngestTranscript, "succeeded"),
        ]
    );

    let job = h.queue().get(&detect.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 0);
    assert!(job.locked_at.is_none());
    assert!(millis_until(job.run_after) > 10_000);
    assert!(h.generator.prompts().is_empty());
}

#[tokio::test]
async fn test_render_waits_for_detection() {
    let h = Harness::new(ScriptedGenerator::default(), FakeTranscoder::default()).await;
    let video = h.video("video-1").await;
    h.ingest(&video).await;

    let render = h.queue().enqueue(&video, &JobSpec::RenderClips).await.unwrap();
    let report = h.executor.run_once().await.unwrap().unwrap();

    match report.outcome {
        StepOutcome::Deferred { run_after } => assert!(millis_until(run_after) > 10_000),
        other => panic!("expected deferral, got {:?}", other),
    }
    let job = h.queue().get(&render.id).await.unwrap().unwrap();
    assert_eq!(job.attempts, 0);
    assert_eq!(h.clip_count(&video).await, 0);
}

#[tokio::test]
async fn test_redundant_detection_is_skipped() {
    let h = Harness::new(
        ScriptedGenerator::new([valid_moments()]),
        FakeTranscoder::default(),
    )
    .await;
    let video = h.video("video-1").await;
    let locator = h.transcript(6);
    h.queue().enqueue_pipeline(&video, &locator).await.unwrap();
    h.executor.run_until_idle().await.unwrap();
    assert_eq!(h.generator.prompts().len(), 1);

    let again = h
        .queue()
        .enqueue(&video, &JobSpec::DetectMoments)
        .await
        .unwrap();
    let report = h.executor.run_once().await.unwrap().unwrap();

    assert_eq!(report.job_id, again.id);
    assert_eq!(report.outcome, StepOutcome::Skipped);
    assert_eq!(h.generator.prompts().len(), 1);

    let job = h.queue().get(&again.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
}

// ----------------------------------------------------------------------
// Stage failures
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_detection_repairs_invalid_first_answer() {
    let h = Harness::new(
        ScriptedGenerator::new([
            moments_json(&[0, 60_000]),
            format!("```json\n{}\n```", moments_json(&[200_000, 0, 100_000, 50_000])),
        ]),
        FakeTranscoder::default(),
    )
    .await;
    let video = h.video("video-1").await;
    h.ingest(&video).await;

    h.queue().enqueue(&video, &JobSpec::DetectMoments).await.unwrap();
    let report = h.executor.run_once().await.unwrap().unwrap();
    assert_eq!(report.outcome, StepOutcome::Succeeded);

    let prompts = h.generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("[0-30000] segment 0"));
    assert!(prompts[1].starts_with("Fix the JSON to match this schema exactly:"));
    assert!(prompts[1].contains("Highlight 2"));

    let highlights = h.executor.stages().highlights.list(&video).await.unwrap();
    assert_eq!(
        highlights.iter().map(|m| m.start_ms).collect::<Vec<_>>(),
        vec![0, 50_000, 100_000, 200_000]
    );
}

#[tokio::test]
async fn test_detection_fails_when_repair_is_still_invalid() {
    let mut inverted: serde_json::Value =
        serde_json::from_str(&moments_json(&[0, 60_000, 120_000])).unwrap();
    inverted["moments"][1]["end_ms"] = json!(30_000);

    let h = Harness::new(
        ScriptedGenerator::new([
            moments_json(&[0, 1, 2, 3, 4, 5]),
            inverted.to_string(),
        ]),
        FakeTranscoder::default(),
    )
    .await;
    let video = h.video("video-1").await;
    h.ingest(&video).await;

    let detect = h.queue().enqueue(&video, &JobSpec::DetectMoments).await.unwrap();
    let report = h.executor.run_once().await.unwrap().unwrap();

    match &report.outcome {
        StepOutcome::Retrying { error, run_after } => {
            assert!(error.contains("moment 1 has invalid end_ms"), "{}", error);
            let wait = millis_until(*run_after);
            assert!(wait > 8_000 && wait <= 10_000, "{}", wait);
        }
        other => panic!("expected retry, got {:?}", other),
    }
    assert_eq!(h.generator.prompts().len(), 2);

    let job = h.queue().get(&detect.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.unwrap().starts_with("Invalid highlight response"));
    assert_eq!(h.executor.stages().highlights.count(&video).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_horizontal_clip_skips_vertical_and_retries_job() {
    let h = Harness::new(
        ScriptedGenerator::new([valid_moments()]),
        FakeTranscoder::failing_at(&[60_000]),
    )
    .await;
    let video = h.video("video-1").await;
    let locator = h.transcript(8);
    h.queue().enqueue_pipeline(&video, &locator).await.unwrap();

    let reports = h.executor.run_until_idle().await.unwrap();
    let render = reports
        .iter()
        .find(|r| r.job_type == JobType::RenderClips)
        .unwrap();

    match &render.outcome {
        StepOutcome::Retrying { error, .. } => {
            assert_eq!(error, "One or more clips failed to render (1 of 5 files)")
        }
        other => panic!("expected retry, got {:?}", other),
    }

    let stages = h.executor.stages();
    let failed = stages
        .highlights
        .list(&video)
        .await
        .unwrap()
        .into_iter()
        .find(|m| m.start_ms == 60_000)
        .unwrap();
    let clips = stages.clips.list(&video).await.unwrap();
    assert_eq!(clips.len(), 4);
    assert!(clips.iter().all(|c| c.highlight_id != failed.id));
    assert_eq!(h.transcoder.verticals().len(), 2);
    assert!(!h
        .dir
        .path()
        .join("outputs/video-1/2_vertical.mp4")
        .exists());
}

#[tokio::test]
async fn test_ingest_without_locator_fails_with_message() {
    let h = Harness::new(ScriptedGenerator::default(), FakeTranscoder::default()).await;
    let video = h.video("video-1").await;

    h.queue()
        .enqueue(&video, &JobSpec::IngestTranscript(IngestPayload::default()))
        .await
        .unwrap();
    let report = h.executor.run_once().await.unwrap().unwrap();

    match report.outcome {
        StepOutcome::Retrying { error, .. } => {
            assert!(error.contains("no transcriptUrl or transcriptPath"), "{}", error)
        }
        other => panic!("expected retry, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ingest_for_unknown_video_fails() {
    let h = Harness::new(ScriptedGenerator::default(), FakeTranscoder::default()).await;
    let locator = h.transcript(3);
    let ghost = VideoId::from("ghost");

    h.queue()
        .enqueue(&ghost, &JobSpec::ingest(locator))
        .await
        .unwrap();
    let report = h.executor.run_once().await.unwrap().unwrap();

    match report.outcome {
        StepOutcome::Retrying { error, .. } => assert!(error.contains("not found"), "{}", error),
        other => panic!("expected retry, got {:?}", other),
    }
}

#[tokio::test]
async fn test_render_refuses_pending_source() {
    let h = Harness::new(
        ScriptedGenerator::new([valid_moments()]),
        FakeTranscoder::default(),
    )
    .await;
    let video = VideoId::from("video-1");
    VideoRepository::new(h.pool.clone())
        .create_with_id(&video, PENDING_SOURCE, None)
        .await
        .unwrap();
    let locator = h.transcript(5);
    h.queue().enqueue_pipeline(&video, &locator).await.unwrap();

    let reports = h.executor.run_until_idle().await.unwrap();
    match &reports[2].outcome {
        StepOutcome::Retrying { error, .. } => {
            assert_eq!(error, "Video video-1 has no uploaded source yet")
        }
        other => panic!("expected retry, got {:?}", other),
    }
    assert_eq!(h.clip_count(&video).await, 0);
}

#[tokio::test]
async fn test_submit_refuses_video_without_uploaded_source() {
    let h = Harness::new(ScriptedGenerator::default(), FakeTranscoder::default()).await;
    let videos = VideoRepository::new(h.pool.clone());
    let video = VideoId::from("video-1");
    videos
        .create_with_id(&video, PENDING_SOURCE, None)
        .await
        .unwrap();
    let locator = h.transcript(5);

    let err = submit_video(&videos, h.queue(), &video, &locator)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::SourcePending(ref id) if *id == video));
    assert!(h.queue().jobs_for_video(&video).await.unwrap().is_empty());
    assert_eq!(h.queue().counts_by_status().await.unwrap().total(), 0);

    let source = h.dir.path().join("upload.mp4");
    std::fs::write(&source, b"source").unwrap();
    videos
        .set_source_path(&video, source.to_str().unwrap())
        .await
        .unwrap();

    let jobs = submit_video(&videos, h.queue(), &video, &locator)
        .await
        .unwrap();
    assert_eq!(
        jobs.iter().map(|j| j.job_type).collect::<Vec<_>>(),
        JobType::ALL.to_vec()
    );
}

#[tokio::test]
async fn test_submit_refuses_unknown_video() {
    let h = Harness::new(ScriptedGenerator::default(), FakeTranscoder::default()).await;
    let videos = VideoRepository::new(h.pool.clone());
    let video = VideoId::from("missing");
    let locator = h.transcript(5);

    let err = submit_video(&videos, h.queue(), &video, &locator)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::Db(_)));
    assert_eq!(h.queue().counts_by_status().await.unwrap().total(), 0);
}

#[tokio::test]
async fn test_reclaimed_job_reports_lost_ownership() {
    let h = Harness::new(ScriptedGenerator::default(), FakeTranscoder::default()).await;
    let video = h.video("video-1").await;
    let locator = h.transcript(3);
    h.queue()
        .enqueue(&video, &JobSpec::ingest(locator))
        .await
        .unwrap();

    let claimed = h.queue().claim_next().await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let reclaimed = h.queue().reclaim_expired(Duration::ZERO).await.unwrap();
    assert_eq!(reclaimed.len(), 1);

    let report = h.executor.process_claimed(claimed).await.unwrap();
    assert_eq!(report.outcome, StepOutcome::LostOwnership);

    let job = h.queue().get(&report.job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert!(job.last_error.unwrap().starts_with("lease expired"));
}

// ----------------------------------------------------------------------
// Batch runner
// ----------------------------------------------------------------------

#[tokio::test]
async fn test_batch_on_empty_queue_is_idle() {
    let h = Harness::new(ScriptedGenerator::default(), FakeTranscoder::default()).await;

    let report = h.executor.run_batch(3).await.unwrap();
    assert_eq!(report.status, BatchStatus::Idle);
    assert_eq!(serde_json::to_value(&report).unwrap(), json!({"status": "idle"}));
}

#[tokio::test]
async fn test_batch_runs_one_video_pipeline() {
    let h = Harness::new(
        ScriptedGenerator::new([valid_moments()]),
        FakeTranscoder::default(),
    )
    .await;
    let video = h.video("video-1").await;
    let locator = h.transcript(5);
    h.queue().enqueue_pipeline(&video, &locator).await.unwrap();

    let report = h.executor.run_batch(3).await.unwrap();
    assert_eq!(report.status, BatchStatus::Processed);
    assert_eq!(report.results.len(), 3);
    assert!(report.results.iter().all(|r| r.outcome.is_complete()));

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["results"][0]["status"], "succeeded");
    assert_eq!(value["results"][0]["job_type"], "INGEST_TRANSCRIPT");
}

#[tokio::test]
async fn test_batch_releases_job_of_another_video() {
    let h = Harness::new(ScriptedGenerator::default(), FakeTranscoder::default()).await;
    let first = h.video("video-1").await;
    let second = h.video("video-2").await;
    let locator = h.transcript(3);

    h.queue()
        .enqueue(&first, &JobSpec::ingest(locator.clone()))
        .await
        .unwrap();
    let other = h
        .queue()
        .enqueue(&second, &JobSpec::ingest(locator))
        .await
        .unwrap();

    let report = h.executor.run_batch(3).await.unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].video_id, first);

    let released = h.queue().get(&other.id).await.unwrap().unwrap();
    assert_eq!(released.status, JobStatus::Queued);
    assert_eq!(released.attempts, 0);
    assert!(released.locked_at.is_none());
    assert!(millis_until(released.run_after) <= 0);

    let next = h.executor.run_batch(3).await.unwrap();
    assert_eq!(next.results[0].video_id, second);
}

#[tokio::test]
async fn test_batch_stops_after_deferral() {
    let h = Harness::new(ScriptedGenerator::default(), FakeTranscoder::default()).await;
    let video = h.video("video-1").await;
    let locator = h.transcript(3);

    h.queue().enqueue(&video, &JobSpec::DetectMoments).await.unwrap();
    h.queue()
        .enqueue(&video, &JobSpec::ingest(locator))
        .await
        .unwrap();

    let report = h.executor.run_batch(3).await.unwrap();
    assert_eq!(report.status, BatchStatus::Processed);
    assert_eq!(outcomes(&report.results), vec![(JobType::DetectMoments, "deferred")]);

    let counts = h.queue().counts_by_status().await.unwrap();
    assert_eq!(counts.queued, 2);
    assert_eq!(counts.running, 0);
}

/// Closes the store while detection waits on the model.
struct StoreClosingGenerator {
    pool: DbPool,
}

#[async_trait]
impl TextGenerator for StoreClosingGenerator {
    async fn generate_json(&self, _prompt: &str, _system: Option<&str>) -> LlmResult<String> {
        self.pool.close().await;
        Err(LlmError::request_failed("model unavailable"))
    }
}

#[tokio::test]
async fn test_batch_keeps_results_when_store_fails_midway() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_memory_pool().await.unwrap();
    let config = WorkerConfig {
        output_dir: dir.path().join("outputs"),
        ..WorkerConfig::default()
    };
    let stages = StageContext::new(
        pool.clone(),
        SourceResolver::new().unwrap(),
        Arc::new(StoreClosingGenerator { pool: pool.clone() }),
        Arc::new(FakeTranscoder::default()),
        config.output_dir.clone(),
    );
    let queue = JobQueue::new(pool.clone(), QueueConfig::default());
    let executor = JobExecutor::new(config, queue, stages);

    let source = dir.path().join("video-1.mp4");
    std::fs::write(&source, b"source").unwrap();
    let video = VideoId::from("video-1");
    VideoRepository::new(pool.clone())
        .create_with_id(&video, source.to_str().unwrap(), None)
        .await
        .unwrap();
    let transcript = dir.path().join("transcript.json");
    std::fs::write(
        &transcript,
        r#"[{"start_ms":0,"end_ms":30000,"text":"hello"}]"#,
    )
    .unwrap();
    executor
        .queue()
        .enqueue_pipeline(&video, transcript.to_str().unwrap())
        .await
        .unwrap();

    let report = executor.run_batch(3).await.unwrap();
    assert_eq!(report.status, BatchStatus::Processed);
    assert_eq!(
        outcomes(&report.results),
        vec![(JobType::IngestTranscript, "succeeded")]
    );
    assert!(report.error.is_some());

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["status"], "processed");
    assert!(value["error"].is_string());
}
