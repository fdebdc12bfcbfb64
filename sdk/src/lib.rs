//! Client for the Oaktis image and video generation API.
//!
//! Generation is asynchronous on the server: `generate` returns a pending job,
//! [`Poller`] waits for it to finish, and `job` fetches the result URLs.

pub mod client;
pub mod config;
pub mod error;
pub mod image;
pub mod poller;
pub mod types;
pub mod video;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError};
pub use image::{ImageGenerateParams, ImageJob, ImageSize, Images};
pub use poller::{PollError, PollEvent, PollPolicy, Poller, StatusSource};
pub use types::{ContractViolation, JobKind, JobMeta, JobState, JobStatus};
pub use video::{Resolution, VideoGenerateParams, VideoJob, Videos};
