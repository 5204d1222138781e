//! Waiting for async embedding jobs.
//!
//! The poller queries job status until the job completes or fails. Between
//! polls it sleeps for the current delay, racing a cancellation listener; the
//! delay starts at `interval` and is multiplied by `multiplier` after each
//! sleep, capped at `max_interval`. An optional overall `timeout` and an
//! optional `max_polls` bound the wait.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use mmvec_core::config::PollSettings;
use mmvec_core::traits::EmbeddingModel;
use mmvec_core::types::{JobHandle, JobSnapshot, JobStatus};
use mmvec_core::{Error, ObjectLocation, Result};

use crate::cancel::CancellationListener;

#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub timeout: Option<Duration>,
    pub max_polls: Option<u32>,
}

impl PollPolicy {
    /// Constant delay, no bounds.
    pub fn fixed(interval: Duration) -> Self {
        Self { interval, multiplier: 1.0, max_interval: interval, timeout: None, max_polls: None }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    fn next_delay(&self, current: Duration) -> Duration {
        if self.multiplier <= 1.0 {
            return current;
        }
        let cap = self.max_interval.max(self.interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier).map_or(cap, |d| d.min(cap))
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollSettings::default())
    }
}

impl From<&PollSettings> for PollPolicy {
    fn from(s: &PollSettings) -> Self {
        Self {
            interval: s.interval(),
            multiplier: s.multiplier,
            max_interval: s.max_interval(),
            timeout: s.timeout(),
            max_polls: s.max_polls,
        }
    }
}

/// A job that reached `Completed`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedJob {
    pub handle: JobHandle,
    pub output: ObjectLocation,
    pub polls: u32,
    pub sleeps: u32,
}

pub type StatusObserver = Arc<dyn Fn(&JobSnapshot) + Send + Sync>;

pub struct JobPoller {
    policy: PollPolicy,
    cancel: CancellationListener,
    observer: Option<StatusObserver>,
}

impl JobPoller {
    pub fn new(policy: PollPolicy, cancel: CancellationListener) -> Self {
        Self { policy, cancel, observer: None }
    }

    /// Called with every status observation, e.g. to drive a progress spinner.
    pub fn with_observer(mut self, observer: StatusObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn wait(&self, model: &dyn EmbeddingModel, job: &JobHandle) -> Result<CompletedJob> {
        // A timeout too large to represent as an instant never fires.
        let deadline = self.policy.timeout.and_then(|t| Instant::now().checked_add(t));
        let mut delay = self.policy.interval;
        let mut polls = 0u32;
        let mut sleeps = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let snapshot = model.job_status(job).await?;
            polls += 1;
            tracing::info!(job = %job, status = %snapshot.status, polls, "polled async job");
            if let Some(observe) = &self.observer {
                observe(&snapshot);
            }

            match snapshot.status {
                JobStatus::Completed => {
                    let output = snapshot
                        .output
                        .ok_or_else(|| Error::parse("async job status", "completed job reported no output location"))?;
                    return Ok(CompletedJob { handle: job.clone(), output, polls, sleeps });
                }
                JobStatus::Failed => {
                    let message = snapshot.failure_message.unwrap_or_else(|| "no failure message".to_string());
                    tracing::warn!(job = %job, %message, "async job failed");
                    return Err(Error::JobFailed { handle: job.to_string(), message });
                }
                JobStatus::Submitted | JobStatus::InProgress => {}
            }

            if matches!(self.policy.max_polls, Some(max) if polls >= max) {
                return Err(Error::PollTimeout { handle: job.to_string(), polls });
            }
            let mut this_delay = delay;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(Error::PollTimeout { handle: job.to_string(), polls });
                }
                this_delay = this_delay.min(deadline - now);
            }

            tokio::select! {
                _ = tokio::time::sleep(this_delay) => {}
                _ = self.cancel.cancelled() => {
                    tracing::info!(job = %job, polls, "stopped waiting for async job");
                    return Err(Error::Cancelled);
                }
            }
            sleeps += 1;
            delay = self.policy.next_delay(delay);
        }
    }
}
