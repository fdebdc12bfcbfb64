use oaktis::{ImageSize, JobKind, Resolution};

#[derive(Debug, clap::Parser)]
#[command(
    name = "oaktis",
    version,
    about = "Oaktis CLI - AI-powered image & video generation"
)]
pub struct Cli {
    /// Override the API endpoint
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Generate a video from a text prompt
    Video(Video),
    /// Generate an image from a text prompt
    Image(Image),
    /// Check the status of a generation job
    Status(JobRef),
    /// Get the result of a completed job
    Get(JobRef),
}

#[derive(Debug, clap::Args)]
pub struct Video {
    /// Text description of the video
    pub prompt: String,

    /// Video duration in seconds
    #[arg(short, long)]
    pub duration: Option<u32>,

    #[arg(short, long, default_value_t = Resolution::P1080)]
    pub resolution: Resolution,

    /// Do not wait for completion
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Debug, clap::Args)]
pub struct Image {
    /// Text description of the image
    pub prompt: String,

    #[arg(short, long, default_value_t = ImageSize::Square1024)]
    pub size: ImageSize,

    /// Number of images to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    pub number: u32,

    /// Do not wait for completion
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Debug, clap::Args)]
pub struct JobRef {
    /// Job ID
    pub job_id: String,

    /// Job type
    #[arg(short = 't', long = "type", default_value_t = JobKind::Video)]
    pub kind: JobKind,
}
