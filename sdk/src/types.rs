use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use strum::Display;
use thiserror::Error;

use crate::ApiError;

/// Which resource family a job belongs to.
#[derive(
    Debug, Clone, Copy, Display, clap::ValueEnum, Serialize, Deserialize, Hash, PartialEq, Eq, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobKind {
    #[default]
    Video,
    Image,
}

impl JobKind {
    pub(crate) fn path_segment(self) -> &'static str {
        match self {
            JobKind::Video => "video",
            JobKind::Image => "image",
        }
    }
}

#[derive(Debug, Clone, Copy, Display, Serialize, Deserialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// Completed and failed jobs never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Fields shared by video and image jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMeta {
    pub id: String,
    pub status: JobState,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lightweight snapshot returned by the status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub id: String,
    pub status: JobState,
    /// Percentage in `0..=100`. Fractional values are rounded.
    #[serde(
        default,
        deserialize_with = "percentage",
        skip_serializing_if = "Option::is_none"
    )]
    pub progress: Option<u8>,
    /// Seconds remaining, as estimated by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Accepts any JSON number and clamps it into `0..=100`.
fn percentage<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.map(|p| p.round().clamp(0.0, 100.0) as u8))
}

/// A job snapshot that breaks the result/error presence rules of its status.
///
/// The client never rejects such responses itself; callers decide how strict
/// to be.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("Job {job_id} is completed but carries no result")]
    MissingResult { job_id: String },

    #[error("Job {job_id} is {status} but already carries a result")]
    UnexpectedResult { job_id: String, status: JobState },

    #[error("Job {job_id} is {status} but carries an error message")]
    UnexpectedError { job_id: String, status: JobState },
}

impl JobMeta {
    /// Shared part of the contract checks, `has_result` is decided by the
    /// concrete job type.
    pub(crate) fn check_contract(&self, has_result: bool) -> Option<ContractViolation> {
        let job_id = self.id.clone();
        let status = self.status;
        match status {
            JobState::Completed if !has_result => Some(ContractViolation::MissingResult { job_id }),
            JobState::Pending | JobState::Processing | JobState::Failed if has_result => {
                Some(ContractViolation::UnexpectedResult { job_id, status })
            }
            JobState::Pending | JobState::Processing | JobState::Completed
                if self.error.is_some() =>
            {
                Some(ContractViolation::UnexpectedError { job_id, status })
            }
            _ => None,
        }
    }
}

pub(crate) fn validate_prompt(prompt: &str) -> Result<(), ApiError> {
    if prompt.trim().is_empty() {
        return Err(ApiError::invalid_params("Prompt must not be empty"));
    }
    Ok(())
}

/// Adds an untyped request field. Keys owned by a typed field are refused so
/// the request body never carries the same key twice.
pub(crate) fn insert_extra(
    extra: &mut Map<String, Value>,
    typed_fields: &[&str],
    key: String,
    value: Value,
) {
    if typed_fields.contains(&key.as_str()) {
        warn!("Ignoring extra parameter '{key}', it is a typed field");
        return;
    }
    extra.insert(key, value);
}
