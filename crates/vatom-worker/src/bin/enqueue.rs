//! Register a video (if needed) and enqueue its three pipeline stages.
//!
//! `--source` is required when the video is not registered yet.
//!
//! Usage: `vatom-enqueue <video_id> --transcript <path_or_url> [--source <path_or_url>]`

use anyhow::{bail, Context};
use vatom_db::VideoRepository;
use vatom_models::VideoId;
use vatom_queue::{JobQueue, QueueConfig};
use vatom_worker::bootstrap::connect;
use vatom_worker::logging::init_tracing;
use vatom_worker::{submit_video, DatabaseConfig};

const USAGE: &str =
    "Usage: vatom-enqueue <video_id> --transcript <path_or_url> [--source <path_or_url>]";

struct Args {
    video_id: String,
    transcript: String,
    source: Option<String>,
}

fn parse_args(args: &[String]) -> anyhow::Result<Args> {
    let mut video_id = None;
    let mut transcript = None;
    let mut source = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--transcript" => transcript = iter.next().cloned(),
            "--source" => source = iter.next().cloned(),
            other if other.starts_with("--") => bail!("unknown flag {}\n{}", other, USAGE),
            other if video_id.is_none() => video_id = Some(other.to_string()),
            other => bail!("unexpected argument {}\n{}", other, USAGE),
        }
    }

    match (video_id, transcript) {
        (Some(video_id), Some(transcript)) => Ok(Args {
            video_id,
            transcript,
            source,
        }),
        _ => bail!(USAGE),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&args)?;

    let pool = connect(&DatabaseConfig::from_env()).await?;
    let videos = VideoRepository::new(pool.clone());
    let video_id = VideoId::from(args.video_id.as_str());

    if videos.exists(&video_id).await? {
        if let Some(source) = &args.source {
            videos.set_source_path(&video_id, source).await?;
        }
    } else {
        let Some(source) = args.source.as_deref() else {
            bail!("video {} is not registered; pass --source\n{}", video_id, USAGE);
        };
        videos
            .create_with_id(&video_id, source, None)
            .await
            .with_context(|| format!("registering video {}", video_id))?;
    }

    let queue = JobQueue::new(pool, QueueConfig::from_env());
    for job in submit_video(&videos, &queue, &video_id, &args.transcript).await? {
        println!("{} {} {}", job.id, job.job_type, job.status);
    }
    Ok(())
}
