use std::{borrow::Cow, future::Future, time::Duration};

use color_eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use oaktis::{
    Client, ContractViolation, ImageGenerateParams, ImageJob, JobKind, JobMeta, JobStatus,
    PollError, PollEvent, Poller, StatusSource, VideoGenerateParams, VideoJob,
};

use crate::cli::{self, Command, JobRef};

pub async fn run(command: Command, client: &Client, poller: &Poller) -> Result<()> {
    match command {
        Command::Video(args) => video(args, client, poller).await,
        Command::Image(args) => image(args, client, poller).await,
        Command::Status(job) => status(job, client).await,
        Command::Get(job) => get(job, client).await,
    }
}

async fn video(args: cli::Video, client: &Client, poller: &Poller) -> Result<()> {
    let mut params = VideoGenerateParams::new(args.prompt).resolution(args.resolution);
    if let Some(seconds) = args.duration {
        params = params.duration(seconds);
    }

    let job = with_spinner(
        "Submitting video generation request...",
        "Job submitted successfully!",
        client.video().generate(&params),
    )
    .await?;
    println!("Job ID: {}", job.id());
    println!("Status: {}", job.meta.status);

    if args.no_wait {
        println!("\n{}", status_hint(job.id(), JobKind::Video));
        return Ok(());
    }

    println!();
    wait_with_spinner(poller, &client.video(), job.id()).await?;

    let done = client.video().job(job.id()).await?;
    check_contract(done.contract_violation());
    println!("\n{}", video_result(&done));
    Ok(())
}

async fn image(args: cli::Image, client: &Client, poller: &Poller) -> Result<()> {
    let params = ImageGenerateParams::new(args.prompt)
        .size(args.size)
        .count(args.number);

    let job = with_spinner(
        "Submitting image generation request...",
        "Job submitted successfully!",
        client.image().generate(&params),
    )
    .await?;
    println!("Job ID: {}", job.id());
    println!("Status: {}", job.meta.status);

    if args.no_wait {
        println!("\n{}", status_hint(job.id(), JobKind::Image));
        return Ok(());
    }

    println!();
    wait_with_spinner(poller, &client.image(), job.id()).await?;

    let done = client.image().job(job.id()).await?;
    check_contract(done.contract_violation());
    println!("\n{}", image_result(&done));
    Ok(())
}

async fn status(job: JobRef, client: &Client) -> Result<()> {
    let status = with_spinner(
        "Fetching job status...",
        "Status fetched successfully!",
        client.status(job.kind, &job.job_id),
    )
    .await?;
    println!("\n{}", status_report(&job.job_id, job.kind, &status));
    Ok(())
}

async fn get(job: JobRef, client: &Client) -> Result<()> {
    const FETCHING: &str = "Fetching job details...";
    const FETCHED: &str = "Job details fetched!";

    let report = match job.kind {
        JobKind::Video => {
            let details = with_spinner(FETCHING, FETCHED, client.video().job(&job.job_id)).await?;
            check_contract(details.contract_violation());
            let has_result = details.video_url.is_some() || details.thumbnail_url.is_some();
            job_report(&details.meta, has_result, &video_result(&details))
        }
        JobKind::Image => {
            let details = with_spinner(FETCHING, FETCHED, client.image().job(&job.job_id)).await?;
            check_contract(details.contract_violation());
            let has_result = !details.image_urls().is_empty();
            job_report(&details.meta, has_result, &image_result(&details))
        }
    };
    println!("\n{report}");
    Ok(())
}

fn spinner(message: impl Into<Cow<'static, str>>) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_style(ProgressStyle::default_spinner());
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Runs one request behind a spinner, leaving a success or error line behind.
async fn with_spinner<T, E>(
    message: &'static str,
    done: &'static str,
    fut: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let bar = spinner(message);
    match fut.await {
        Ok(v) => {
            bar.finish_with_message(format!("✓ {done}"));
            Ok(v)
        }
        Err(err) => {
            bar.abandon_with_message(format!("✗ Error: {err}"));
            Err(err.into())
        }
    }
}

async fn wait_with_spinner<S>(poller: &Poller, source: &S, job_id: &str) -> Result<JobStatus>
where
    S: StatusSource + Sync,
{
    let bar = spinner("Processing...");
    let result = poller
        .wait(source, job_id, |event| match event {
            PollEvent::Progress(p) => bar.set_message(format!("Processing... {p}%")),
            PollEvent::Completed => bar.finish_with_message("✓ Generation completed!"),
            PollEvent::Failed(msg) => bar.abandon_with_message(format!("✗ Generation failed: {msg}")),
        })
        .await;

    if let Err(PollError::Request(err)) = &result {
        bar.abandon_with_message(format!("✗ Error: {err}"));
    }
    Ok(result?)
}

fn check_contract(violation: Option<ContractViolation>) {
    if let Some(violation) = violation {
        warn!("Server response breaks the job contract: {violation}");
    }
}

fn status_hint(job_id: &str, kind: JobKind) -> String {
    format!("Use the following command to check status:\n  oaktis status {job_id} --type {kind}")
}

fn video_result(job: &VideoJob) -> String {
    let mut lines = vec![format!(
        "✓ Video URL: {}",
        job.video_url.as_deref().unwrap_or("N/A")
    )];
    if let Some(thumb) = &job.thumbnail_url {
        lines.push(format!("✓ Thumbnail: {thumb}"));
    }
    lines.join("\n")
}

fn image_result(job: &ImageJob) -> String {
    let urls = job.image_urls();
    if urls.is_empty() {
        return "No images available".into();
    }
    let mut lines = vec![format!("✓ Generated {} image(s):", urls.len())];
    lines.extend(
        urls.iter()
            .enumerate()
            .map(|(i, url)| format!("  {}. {url}", i + 1)),
    );
    lines.join("\n")
}

fn status_report(job_id: &str, kind: JobKind, status: &JobStatus) -> String {
    let mut lines = vec![
        format!("Job ID: {job_id}"),
        format!("Status: {}", status.status),
    ];
    if let Some(progress) = status.progress {
        lines.push(format!("Progress: {progress}%"));
    }
    if let Some(eta) = status.estimated_time {
        lines.push(format!("Estimated time: {eta}s"));
    }
    if let Some(err) = &status.error {
        lines.push(format!("Error: {err}"));
    }
    if status.status == oaktis::JobState::Completed {
        lines.push(String::new());
        lines.push("Use the following command to get the result:".into());
        lines.push(format!("  oaktis get {job_id} --type {kind}"));
    }
    lines.join("\n")
}

/// Results are printed whenever the job carries any, whatever its status. A
/// completed job always gets a result section.
fn job_report(meta: &JobMeta, has_result: bool, result: &str) -> String {
    let mut lines = vec![
        format!("Job ID: {}", meta.id),
        format!("Status: {}", meta.status),
        format!("Created: {}", meta.created_at),
        format!("Updated: {}", meta.updated_at),
    ];
    if has_result || meta.status == oaktis::JobState::Completed {
        lines.push(String::new());
        lines.push(result.to_string());
    }
    if let Some(err) = &meta.error {
        lines.push(format!("Error: {err}"));
    }
    lines.join("\n")
}
