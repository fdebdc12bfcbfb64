use std::{future::Future, pin::Pin, time::Duration};

use async_stream::try_stream;
use log::{debug, info};
use thiserror::Error;
use tokio::time::sleep;
use tokio_stream::Stream;

use crate::{ApiError, JobState, JobStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

const UNKNOWN_JOB_ERROR: &str = "Unknown error";

/// Anything that can report the status of a job by id.
pub trait StatusSource {
    fn fetch_status<'a>(
        &'a self,
        job_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatus, ApiError>> + Send + 'a>>;
}

/// Observations made while waiting for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Reported progress differs from the previous observation.
    Progress(u8),
    Completed,
    Failed(String),
}

#[derive(Debug, Error)]
pub enum PollError {
    /// A request failed before the job reached a terminal state.
    #[error(transparent)]
    Request(#[from] ApiError),

    /// The job itself reported failure.
    #[error("Generation failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Job {job_id} still not finished after {attempts} status checks")]
    AttemptsExhausted { job_id: String, attempts: u32 },
}

/// When to poll again.
///
/// The default polls every 2 s for as long as it takes. A multiplier above 1
/// grows the interval after every check, capped at `max_interval`.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_POLL_INTERVAL)
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            multiplier: 1.0,
            max_interval: interval,
            max_attempts: None,
        }
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.multiplier = multiplier;
        self.max_interval = max_interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Pause before the next check, after `attempt` checks (1-based) came
    /// back non-terminal.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.multiplier <= 1.0 || attempt <= 1 {
            return self.interval;
        }
        let cap = self.max_interval.max(self.interval);
        let exp = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let secs = self.interval.as_secs_f64() * self.multiplier.powi(exp);
        if !secs.is_finite() || secs >= cap.as_secs_f64() {
            cap
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// Turns single status checks into a wait for a terminal state.
///
/// Checks are strictly sequential; a new one starts only after the previous
/// one returned and the policy's pause elapsed.
#[derive(Debug, Clone, Default)]
pub struct Poller {
    policy: PollPolicy,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Every status snapshot of the job until the first terminal one.
    ///
    /// The stream ends after yielding a completed or failed snapshot, or after
    /// the first error.
    pub fn watch<'a, S>(
        &'a self,
        source: &'a S,
        job_id: &'a str,
    ) -> impl Stream<Item = Result<JobStatus, PollError>> + Send + 'a
    where
        S: StatusSource + Sync + ?Sized,
    {
        try_stream! {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                let status = source.fetch_status(job_id).await?;
                debug!("Job {job_id} check #{attempt}: {}", status.status);

                let terminal = status.status.is_terminal();
                yield status;
                if terminal {
                    break;
                }

                sleep(self.pause_after(job_id, attempt)?).await;
            }
        }
    }

    /// Polls until the job completes or fails.
    ///
    /// `on_event` sees progress changes (duplicates are suppressed) and the
    /// terminal transition. A failed job yields [`PollError::JobFailed`], a
    /// failed request [`PollError::Request`].
    pub async fn wait<S>(
        &self,
        source: &S,
        job_id: &str,
        mut on_event: impl FnMut(PollEvent),
    ) -> Result<JobStatus, PollError>
    where
        S: StatusSource + Sync + ?Sized,
    {
        let mut last_progress = 0;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let status = source.fetch_status(job_id).await?;
            debug!("Job {job_id} check #{attempt}: {}", status.status);

            if let Some(progress) = status.progress.filter(|p| *p != last_progress) {
                on_event(PollEvent::Progress(progress));
                last_progress = progress;
            }

            match status.status {
                JobState::Completed => {
                    info!("Job {job_id} completed");
                    on_event(PollEvent::Completed);
                    return Ok(status);
                }
                JobState::Failed => {
                    let message = status
                        .error
                        .unwrap_or_else(|| UNKNOWN_JOB_ERROR.to_string());
                    info!("Job {job_id} failed: {message}");
                    on_event(PollEvent::Failed(message.clone()));
                    return Err(PollError::JobFailed {
                        job_id: job_id.into(),
                        message,
                    });
                }
                JobState::Pending | JobState::Processing => {}
            }

            sleep(self.pause_after(job_id, attempt)?).await;
        }
    }

    /// Pause before the next check, or the error ending the wait once the
    /// attempt cap is reached.
    fn pause_after(&self, job_id: &str, attempt: u32) -> Result<Duration, PollError> {
        if self.policy.exhausted(attempt) {
            return Err(PollError::AttemptsExhausted {
                job_id: job_id.into(),
                attempts: attempt,
            });
        }
        Ok(self.policy.delay_after(attempt))
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use tokio::time::Instant;
    use tokio_stream::StreamExt;

    use super::*;

    /// Replays canned status responses and records when each was fetched.
    struct Scripted {
        responses: Mutex<VecDeque<Result<JobStatus, ApiError>>>,
        fetched_at: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<JobStatus, ApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                fetched_at: Mutex::new(Vec::new()),
            }
        }

        fn fetch_times(&self) -> Vec<Instant> {
            self.fetched_at.lock().unwrap().clone()
        }
    }

    impl StatusSource for Scripted {
        fn fetch_status<'a>(
            &'a self,
            _job_id: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<JobStatus, ApiError>> + Send + 'a>> {
            self.fetched_at.lock().unwrap().push(Instant::now());
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("poller fetched more often than scripted");
            Box::pin(async move { next })
        }
    }

    fn status(state: JobState, progress: Option<u8>) -> Result<JobStatus, ApiError> {
        Ok(JobStatus {
            id: "job_1".into(),
            status: state,
            progress,
            estimated_time: None,
            error: None,
        })
    }

    fn failed(error: Option<&str>) -> Result<JobStatus, ApiError> {
        Ok(JobStatus {
            id: "job_1".into(),
            status: JobState::Failed,
            progress: None,
            estimated_time: None,
            error: error.map(Into::into),
        })
    }

    fn gaps(times: &[Instant]) -> Vec<Duration> {
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_reported_once_per_change() {
        let source = Scripted::new(vec![
            status(JobState::Pending, None),
            status(JobState::Processing, Some(10)),
            status(JobState::Processing, Some(10)),
            status(JobState::Processing, Some(55)),
            status(JobState::Completed, None),
        ]);
        let poller = Poller::default();

        let started = Instant::now();
        let mut events = Vec::new();
        let done = poller
            .wait(&source, "job_1", |ev| events.push(ev))
            .await
            .unwrap();

        assert_eq!(done.status, JobState::Completed);
        assert_eq!(
            events,
            vec![
                PollEvent::Progress(10),
                PollEvent::Progress(55),
                PollEvent::Completed,
            ]
        );

        let times = source.fetch_times();
        assert_eq!(times.len(), 5);
        assert!(
            gaps(&times)
                .iter()
                .all(|gap| *gap == Duration::from_millis(2000))
        );
        assert_eq!(started.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_carries_server_message_and_stops() {
        let source = Scripted::new(vec![
            status(JobState::Processing, Some(30)),
            failed(Some("model overloaded")),
        ]);
        let poller = Poller::default();

        let mut events = Vec::new();
        let err = poller
            .wait(&source, "job_1", |ev| events.push(ev))
            .await
            .unwrap_err();

        match err {
            PollError::JobFailed { job_id, message } => {
                assert_eq!(job_id, "job_1");
                assert_eq!(message, "model overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            events,
            vec![
                PollEvent::Progress(30),
                PollEvent::Failed("model overloaded".into())
            ]
        );
        assert_eq!(source.fetch_times().len(), 2);
        assert!(source.responses.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_message_gets_placeholder() {
        let source = Scripted::new(vec![failed(None)]);
        let err = Poller::default()
            .wait(&source, "job_1", |_| {})
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Generation failed: Unknown error");
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_is_not_a_job_failure() {
        let source = Scripted::new(vec![
            status(JobState::Pending, None),
            Err(ApiError::timeout(Duration::from_secs(60))),
        ]);

        let mut events = Vec::new();
        let err = Poller::default()
            .wait(&source, "job_1", |ev| events.push(ev))
            .await
            .unwrap_err();

        match err {
            PollError::Request(api) => assert!(api.is_timeout()),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(events.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn watch_yields_every_snapshot() {
        let source = Scripted::new(vec![
            status(JobState::Pending, None),
            status(JobState::Processing, Some(50)),
            status(JobState::Completed, Some(100)),
        ]);
        let poller = Poller::new(PollPolicy::fixed(Duration::from_millis(500)));

        let states: Vec<JobState> = poller
            .watch(&source, "job_1")
            .map(|s| s.unwrap().status)
            .collect()
            .await;

        assert_eq!(
            states,
            vec![JobState::Pending, JobState::Processing, JobState::Completed]
        );
        assert!(
            gaps(&source.fetch_times())
                .iter()
                .all(|gap| *gap == Duration::from_millis(500))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_until_capped() {
        let source = Scripted::new(vec![
            status(JobState::Pending, None),
            status(JobState::Pending, None),
            status(JobState::Pending, None),
            status(JobState::Pending, None),
            status(JobState::Completed, None),
        ]);
        let policy = PollPolicy::fixed(Duration::from_secs(1)).with_backoff(2.0, Duration::from_secs(3));

        Poller::new(policy).wait(&source, "job_1", |_| {}).await.unwrap();

        assert_eq!(
            gaps(&source.fetch_times()),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
                Duration::from_secs(3),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_cap_stops_polling() {
        let source = Scripted::new(vec![
            status(JobState::Pending, None),
            status(JobState::Processing, Some(5)),
            status(JobState::Processing, Some(6)),
        ]);
        let policy = PollPolicy::default().with_max_attempts(3);

        let err = Poller::new(policy)
            .wait(&source, "job_1", |_| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PollError::AttemptsExhausted { attempts: 3, .. }
        ));
        assert_eq!(source.fetch_times().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_and_watch_check_alike() {
        let script = || {
            vec![
                status(JobState::Pending, None),
                status(JobState::Processing, Some(70)),
                status(JobState::Completed, Some(100)),
            ]
        };
        let poller = Poller::new(PollPolicy::fixed(Duration::from_millis(300)));

        let waited = Scripted::new(script());
        let done = poller.wait(&waited, "job_1", |_| {}).await.unwrap();
        assert_eq!(done.progress, Some(100));

        let watched = Scripted::new(script());
        let last = poller
            .watch(&watched, "job_1")
            .collect::<Vec<_>>()
            .await
            .pop()
            .unwrap()
            .unwrap();
        assert_eq!(last, done);

        assert_eq!(gaps(&waited.fetch_times()), gaps(&watched.fetch_times()));
        assert!(waited.responses.lock().unwrap().is_empty());
        assert!(watched.responses.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn watch_stops_at_attempt_cap() {
        let source = Scripted::new(vec![
            status(JobState::Pending, None),
            status(JobState::Pending, None),
        ]);
        let poller = Poller::new(PollPolicy::default().with_max_attempts(2));

        let results: Vec<_> = poller.watch(&source, "job_1").collect().await;

        assert_eq!(results.len(), 3);
        assert!(matches!(
            results.last(),
            Some(Err(PollError::AttemptsExhausted { attempts: 2, .. }))
        ));
    }

    #[test]
    fn default_policy_is_fixed_two_seconds() {
        let policy = PollPolicy::default();
        assert_eq!(policy.max_attempts, None);
        for attempt in [1, 2, 10, 1000] {
            assert_eq!(policy.delay_after(attempt), Duration::from_millis(2000));
        }
    }
}
