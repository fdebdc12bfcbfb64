use std::{fmt, time::Duration};

use log::{debug, warn};
use reqwest::{
    Method, RequestBuilder, Url,
    header::{CONTENT_TYPE, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    ApiError, ClientConfig, ConfigError, JobKind, JobStatus,
    image::Images,
    video::Videos,
};

#[cfg(test)]
pub(crate) mod test_server;

pub const CLIENT_REF_HEADER: &str = "x-oaktis-ref";
pub const CLIENT_REF: &str = "rust-sdk";

/// Authenticated client for the Oaktis generation API.
///
/// Cloning is cheap, clones share the same connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: String,
    base_url: Url,
    timeout: Duration,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let ClientConfig {
            api_key,
            base_url,
            timeout,
        } = config;

        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            url: base_url.clone(),
            reason,
        };
        let parsed = Url::parse(base_url.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(invalid("URL cannot carry a path".into()));
        }

        Ok(Self {
            http: http_client(),
            api_key,
            base_url: parsed,
            timeout,
        })
    }

    pub fn video(&self) -> Videos<'_> {
        Videos::new(self)
    }

    pub fn image(&self) -> Images<'_> {
        Images::new(self)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Status of a job of either family, for callers that only learn the kind
    /// at runtime.
    pub async fn status(&self, kind: JobKind, job_id: &str) -> Result<JobStatus, ApiError> {
        match kind {
            JobKind::Video => self.video().status(job_id).await,
            JobKind::Image => self.image().status(job_id).await,
        }
    }

    pub(crate) async fn generate<P, J>(&self, kind: JobKind, params: &P) -> Result<J, ApiError>
    where
        P: Serialize + ?Sized,
        J: DeserializeOwned,
    {
        let url = self.endpoint(&["v1", kind.path_segment(), "generate"]);
        self.send(Method::POST, url, |req| req.json(params)).await
    }

    pub(crate) async fn job_status(&self, kind: JobKind, job_id: &str) -> Result<JobStatus, ApiError> {
        let url = self.endpoint(&["v1", kind.path_segment(), "jobs", job_id]);
        self.send(Method::GET, url, |req| req).await
    }

    pub(crate) async fn job_details<J: DeserializeOwned>(
        &self,
        kind: JobKind,
        job_id: &str,
    ) -> Result<J, ApiError> {
        let url = self.endpoint(&["v1", kind.path_segment(), "jobs", job_id, "details"]);
        self.send(Method::GET, url, |req| req).await
    }

    /// Appends path segments to the base URL. Segments are percent-encoded,
    /// so a job id can never escape its own segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejects cannot-be-a-base URLs, so this always succeeds
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// The one request routine every operation goes through: auth and
    /// identification headers, the timeout guard and error normalization.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<T, ApiError> {
        debug!("{method} {url}");

        let request = body(
            self.http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.api_key)
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .header(CLIENT_REF_HEADER, HeaderValue::from_static(CLIENT_REF)),
        );

        // Dropping the inner future on expiry aborts the request and releases
        // the timer on every path.
        let exchange = async {
            let resp = request.send().await.map_err(ApiError::network)?;
            let status = resp.status();
            let text = resp.text().await.map_err(ApiError::network)?;
            Ok::<_, ApiError>((status, text))
        };
        let (status, text) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                warn!("{method} {url} timed out after {:?}", self.timeout);
                ApiError::timeout(self.timeout)
            })??;

        if !status.is_success() {
            debug!("{method} {url} failed with {status}: {text}");
            return Err(ApiError::from_response(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| ApiError::decode(status, e, &text))
    }
}

#[cfg(not(test))]
fn http_client() -> reqwest::Client {
    reqwest::Client::new()
}

// Test traffic goes to a local responder and must not pick up proxy settings
// from the environment.
#[cfg(test)]
fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
