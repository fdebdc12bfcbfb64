use std::{future::Future, pin::Pin};

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

use crate::{
    ApiError, Client, ContractViolation, JobKind, JobMeta, JobStatus, PollError, PollEvent, Poller,
    StatusSource,
    types::{insert_extra, validate_prompt},
};

#[derive(
    Debug, Clone, Copy, Display, clap::ValueEnum, Serialize, Deserialize, Hash, PartialEq, Eq, Default,
)]
pub enum Resolution {
    #[serde(rename = "720p")]
    #[strum(to_string = "720p")]
    #[value(name = "720p")]
    P720,
    #[default]
    #[serde(rename = "1080p")]
    #[strum(to_string = "1080p")]
    #[value(name = "1080p")]
    P1080,
    #[serde(rename = "4k")]
    #[strum(to_string = "4k")]
    #[value(name = "4k")]
    K4,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoGenerateParams {
    pub prompt: String,
    /// Length of the clip in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl VideoGenerateParams {
    const TYPED_FIELDS: &'static [&'static str] = &["prompt", "duration", "resolution"];

    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            duration: None,
            resolution: None,
            extra: Map::new(),
        }
    }

    pub fn duration(mut self, seconds: u32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Passes a field the typed parameters don't know about straight through
    /// to the API.
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        insert_extra(&mut self.extra, Self::TYPED_FIELDS, key.into(), value.into());
        self
    }

    pub fn extra_fields(&self) -> &Map<String, Value> {
        &self.extra
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoJob {
    #[serde(flatten)]
    pub meta: JobMeta,
    pub params: VideoGenerateParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl VideoJob {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Checks that the video URL is present exactly when the job completed.
    pub fn contract_violation(&self) -> Option<ContractViolation> {
        let has_result = self.video_url.as_deref().is_some_and(|url| !url.is_empty());
        self.meta.check_contract(has_result)
    }
}

/// Video endpoints, obtained through [`Client::video`].
#[derive(Debug, Clone, Copy)]
pub struct Videos<'a> {
    client: &'a Client,
}

impl<'a> Videos<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn generate(&self, params: &VideoGenerateParams) -> Result<VideoJob, ApiError> {
        validate_prompt(&params.prompt)?;
        self.client.generate(JobKind::Video, params).await
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        self.client.job_status(JobKind::Video, job_id).await
    }

    pub async fn job(&self, job_id: &str) -> Result<VideoJob, ApiError> {
        self.client.job_details(JobKind::Video, job_id).await
    }

    /// Submits a job, polls it to completion and returns the final details.
    pub async fn generate_and_wait(
        &self,
        params: &VideoGenerateParams,
        poller: &Poller,
        on_event: impl FnMut(PollEvent),
    ) -> Result<VideoJob, PollError> {
        let job = self.generate(params).await?;
        info!("Submitted video job {}", job.id());
        poller.wait(self, job.id(), on_event).await?;
        Ok(self.job(job.id()).await?)
    }
}

impl StatusSource for Videos<'_> {
    fn fetch_status<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatus, ApiError>> + Send + 'a>> {
        Box::pin(self.status(job_id))
    }
}
