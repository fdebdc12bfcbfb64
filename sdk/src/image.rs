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
pub enum ImageSize {
    #[serde(rename = "512x512")]
    #[strum(to_string = "512x512")]
    #[value(name = "512x512")]
    Square512,
    #[default]
    #[serde(rename = "1024x1024")]
    #[strum(to_string = "1024x1024")]
    #[value(name = "1024x1024")]
    Square1024,
    #[serde(rename = "1024x1792")]
    #[strum(to_string = "1024x1792")]
    #[value(name = "1024x1792")]
    Portrait,
    #[serde(rename = "1792x1024")]
    #[strum(to_string = "1792x1024")]
    #[value(name = "1792x1024")]
    Landscape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageGenerateParams {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<ImageSize>,
    /// Number of images to produce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ImageGenerateParams {
    const TYPED_FIELDS: &'static [&'static str] = &["prompt", "size", "n"];

    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            size: None,
            n: None,
            extra: Map::new(),
        }
    }

    pub fn size(mut self, size: ImageSize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn count(mut self, n: u32) -> Self {
        self.n = Some(n);
        self
    }

    /// See [`VideoGenerateParams::extra`](crate::VideoGenerateParams::extra).
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
pub struct ImageJob {
    #[serde(flatten)]
    pub meta: JobMeta,
    pub params: ImageGenerateParams,
    /// In generation order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
}

impl ImageJob {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn image_urls(&self) -> &[String] {
        self.image_urls.as_deref().unwrap_or_default()
    }

    /// Checks that image URLs are present exactly when the job completed.
    pub fn contract_violation(&self) -> Option<ContractViolation> {
        let urls = self.image_urls();
        let has_result = !urls.is_empty() && urls.iter().all(|url| !url.is_empty());
        self.meta.check_contract(has_result)
    }
}

/// Image endpoints, obtained through [`Client::image`].
#[derive(Debug, Clone, Copy)]
pub struct Images<'a> {
    client: &'a Client,
}

impl<'a> Images<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn generate(&self, params: &ImageGenerateParams) -> Result<ImageJob, ApiError> {
        validate_prompt(&params.prompt)?;
        self.client.generate(JobKind::Image, params).await
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        self.client.job_status(JobKind::Image, job_id).await
    }

    pub async fn job(&self, job_id: &str) -> Result<ImageJob, ApiError> {
        self.client.job_details(JobKind::Image, job_id).await
    }

    pub async fn generate_and_wait(
        &self,
        params: &ImageGenerateParams,
        poller: &Poller,
        on_event: impl FnMut(PollEvent),
    ) -> Result<ImageJob, PollError> {
        let job = self.generate(params).await?;
        info!("Submitted image job {}", job.id());
        poller.wait(self, job.id(), on_event).await?;
        Ok(self.job(job.id()).await?)
    }
}

impl StatusSource for Images<'_> {
    fn fetch_status<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatus, ApiError>> + Send + 'a>> {
        Box::pin(self.status(job_id))
    }
}
