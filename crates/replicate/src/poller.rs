//! Budget-bounded, cancellable polling of a prediction until it finishes.
//!
//! [`wait_for_completion`] re-reads a prediction at a fixed interval until
//! it reaches a terminal status, the query budget is spent, or the
//! [`CancellationToken`] fires. Running out of budget is *not* an error:
//! the last snapshot is returned and the caller decides what a
//! non-terminal status means.

use std::time::Duration;

use async_trait::async_trait;
use imagerelay_core::prediction::PredictionJob;
use tokio_util::sync::CancellationToken;

use crate::api::ReplicateApiError;

/// Floor applied to the polling interval so a misconfigured zero interval
/// cannot turn into a busy loop.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Source of prediction snapshots.
///
/// Implemented by [`ReplicateApi`](crate::api::ReplicateApi); tests supply
/// scripted sources.
#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// Read the current state of the job behind `polling_url`.
    async fn fetch(&self, token: &str, polling_url: &str)
        -> Result<PredictionJob, ReplicateApiError>;
}

/// Timing parameters for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed delay between consecutive status queries.
    pub interval: Duration,
    /// Total wait budget.
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl PollConfig {
    /// Same interval, different budget.
    pub fn with_max_wait(self, max_wait: Duration) -> Self {
        Self { max_wait, ..self }
    }

    /// Number of status queries the budget allows: `floor(max_wait / interval)`.
    pub fn max_queries(&self) -> u32 {
        let interval = self.interval.max(MIN_POLL_INTERVAL);
        let queries = self.max_wait.as_nanos() / interval.as_nanos();
        u32::try_from(queries).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// A status query failed. Single queries are not retried.
    #[error(transparent)]
    Api(#[from] ReplicateApiError),

    /// The cancellation token fired before the job finished.
    #[error("Polling cancelled")]
    Cancelled,
}

/// Poll a prediction until it reaches a terminal status.
///
/// Starts from `initial`, the snapshot returned at creation time. Returns:
///
/// - the first terminal snapshot, without sleeping after it;
/// - `initial` unchanged if it is already terminal or has no polling URL;
/// - the last observed snapshot once `config.max_queries()` queries have
///   been made (possibly still `processing`);
/// - [`PollError::Cancelled`] if `cancel` fires during a query or a wait.
pub async fn wait_for_completion<S>(
    source: &S,
    token: &str,
    initial: PredictionJob,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<PredictionJob, PollError>
where
    S: PredictionSource + ?Sized,
{
    if initial.is_terminal() {
        return Ok(initial);
    }
    let Some(polling_url) = initial.polling_url().map(str::to_owned) else {
        tracing::warn!(prediction_id = %initial.id, "Prediction has no polling URL");
        return Ok(initial);
    };

    let interval = config.interval.max(MIN_POLL_INTERVAL);
    let max_queries = config.max_queries();
    let mut job = initial;

    for attempt in 1..=max_queries {
        job = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            result = source.fetch(token, &polling_url) => result?,
        };

        tracing::debug!(
            prediction_id = %job.id,
            status = %job.status,
            attempt,
            "Polled prediction",
        );

        if job.is_terminal() {
            return Ok(job);
        }

        if attempt < max_queries {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    tracing::warn!(
        prediction_id = %job.id,
        status = %job.status,
        max_wait_ms = config.max_wait.as_millis() as u64,
        "Poll budget exhausted before prediction finished",
    );
    Ok(job)
}
